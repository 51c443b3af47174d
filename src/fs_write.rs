//! Writes a rendered export tree to disk.
//!
//! The renderer itself is a pure function with no filesystem concerns (see
//! `daybook_export::render_export`'s module doc); this is the thin
//! filesystem wrapper the spec calls for. Grounded on the teacher's
//! `xchecker-utils::atomic_write::write_file_atomic`: write to a temp file
//! in the target directory, fsync, then atomically rename over the
//! destination, so a crash mid-export never leaves a half-written file
//! where a reader expects a complete one. The teacher's Windows
//! rename-retry loop has no counterpart here — this tool targets the same
//! POSIX deployment environment as the rest of the pipeline (a
//! Postgres-backed service), so that branch is dropped rather than ported.

use std::io::Write;

use anyhow::{Context, Result};
use camino::Utf8Path;

pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {parent}"))?;
    }
    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {dir}"))?;
    temp.write_all(content.as_bytes())
        .with_context(|| format!("writing {path}"))?;
    temp.as_file().sync_all().with_context(|| format!("fsyncing {path}"))?;
    temp.persist(path).with_context(|| format!("renaming temp file into place at {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn writes_file_and_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let target = root.join("topics").join("work.md");

        write_file_atomic(&target, "hello\n").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello\n");
    }

    #[test]
    fn overwrites_existing_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let target = root.join("manifest.json");

        write_file_atomic(&target, "{\"a\":1}").unwrap();
        write_file_atomic(&target, "{\"a\":2}").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"a\":2}");
    }
}
