// gdt-stack: umbrella crate re-exporting the GDT substrate.
//
// The workspace splits into the wire layer (`gdt-protocol`), the
// session/stream runtime (`gdt-runtime`) and the configuration engine
// with its GDT glue (`gdt-config`); this crate ties them together and
// hosts the cross-daemon integration suites under `tests/integration`.

pub use gdt_config as config;
pub use gdt_protocol as protocol;
pub use gdt_runtime as runtime;
