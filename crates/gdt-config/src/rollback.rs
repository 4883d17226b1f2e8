//! Commit-log revision files.
//!
//! Every commit first writes the pre-change configuration to
//! `<dir>/.rollback.<count>.pmcfg` with a `// @desc "<description>"`
//! first line. Rollback addresses revisions by a zero-based index into
//! the files sorted by modification time, newest first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::text;

const ROLLBACK_PREFIX: &str = ".rollback";
const ROLLBACK_SUFFIX: &str = ".pmcfg";

#[derive(Debug, Clone)]
pub struct Revision {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub desc: String,
}

/// One line of the revision auto-complete listing.
#[derive(Debug, Clone)]
pub struct RevisionEntry {
    pub label: String,
    pub desc: String,
}

fn file_index(name: &str) -> Option<u64> {
    name.strip_prefix(ROLLBACK_PREFIX)?
        .strip_prefix('.')?
        .strip_suffix(ROLLBACK_SUFFIX)?
        .parse()
        .ok()
}

/// Revisions sorted newest first; mtime ties break toward the higher
/// file index.
pub fn list_revisions(dir: &Path) -> Vec<Revision> {
    let mut out: Vec<(u64, Revision)> = Vec::new();
    let Ok(rd) = fs::read_dir(dir) else {
        return Vec::new();
    };
    for entry in rd.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(index) = file_index(name) else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let desc = fs::read_to_string(entry.path())
            .ok()
            .and_then(|s| text::revision_desc(&s))
            .unwrap_or_default();
        out.push((index, Revision { path: entry.path(), modified, desc }));
    }
    out.sort_by(|a, b| b.1.modified.cmp(&a.1.modified).then(b.0.cmp(&a.0)));
    out.into_iter().map(|(_, r)| r).collect()
}

/// Path for the next revision: `.rollback.<count>.pmcfg`.
pub fn next_revision_path(dir: &Path) -> PathBuf {
    let count = fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .filter(|e| {
                    e.file_name().to_str().map(|n| n.starts_with(ROLLBACK_PREFIX)).unwrap_or(false)
                })
                .count()
        })
        .unwrap_or(0);
    dir.join(format!("{}.{}{}", ROLLBACK_PREFIX, count, ROLLBACK_SUFFIX))
}

/// Write a revision snapshot; creates the commit-log directory as
/// needed and returns the written path.
pub fn save_revision(dir: &Path, rendered: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = next_revision_path(dir);
    fs::write(&path, rendered)?;
    Ok(path)
}

/// Contents of revision `index` (zero-based, newest first).
pub fn load_revision(dir: &Path, index: usize) -> io::Result<String> {
    let revisions = list_revisions(dir);
    let rev = revisions
        .get(index)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("revision {index}")))?;
    fs::read_to_string(&rev.path)
}

/// Auto-complete listing: "N - <mtime>" plus the revision description.
pub fn revision_listing(dir: &Path) -> Vec<RevisionEntry> {
    list_revisions(dir)
        .into_iter()
        .enumerate()
        .map(|(i, rev)| {
            let dt: DateTime<Local> = rev.modified.into();
            RevisionEntry {
                label: format!("{} - {}", i, dt.format("%Y-%m-%d %H:%M:%S")),
                desc: rev.desc,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_sort_newest_first_with_index_tiebreak() {
        let dir = tempfile::tempdir().unwrap();
        let p0 = save_revision(dir.path(), "// @desc \"first\"\n").unwrap();
        let p1 = save_revision(dir.path(), "// @desc \"second\"\n").unwrap();
        assert!(p0.ends_with(".rollback.0.pmcfg"));
        assert!(p1.ends_with(".rollback.1.pmcfg"));

        let revs = list_revisions(dir.path());
        assert_eq!(revs.len(), 2);
        // same-second mtimes fall back to the higher index being newer
        assert_eq!(revs[0].desc, "second");
        assert_eq!(revs[1].desc, "first");
    }

    #[test]
    fn load_revision_addresses_by_listing_index() {
        let dir = tempfile::tempdir().unwrap();
        save_revision(dir.path(), "// @desc \"a\"\nx \"1\"\n").unwrap();
        save_revision(dir.path(), "// @desc \"b\"\nx \"2\"\n").unwrap();

        let newest = load_revision(dir.path(), 0).unwrap();
        assert!(newest.contains("\"b\""));
        let older = load_revision(dir.path(), 1).unwrap();
        assert!(older.contains("\"a\""));
        assert!(load_revision(dir.path(), 2).is_err());
    }

    #[test]
    fn listing_carries_descriptions() {
        let dir = tempfile::tempdir().unwrap();
        save_revision(dir.path(), "// @desc \"baseline\"\n").unwrap();
        let listing = revision_listing(dir.path());
        assert_eq!(listing.len(), 1);
        assert!(listing[0].label.starts_with("0 - "));
        assert_eq!(listing[0].desc, "baseline");
    }
}
