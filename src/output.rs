//! Script persistence.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RebuildResult;

/// Write `script` to `path` atomically.
///
/// The text goes to a sibling temporary file first, which is then renamed over `path`. Readers
/// see either the previous file or the complete new script, and a failed write leaves no
/// temporary file behind.
pub fn write_script(path: impl AsRef<Path>, script: &str) -> RebuildResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, script).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::write_script;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("codebook_sql_output_{tag}_{nanos}"))
    }

    #[test]
    fn writes_and_replaces_whole_file() {
        let dir = scratch_dir("replace");
        let path = dir.join("nested").join("rebuild.sql");
        write_script(&path, "-- first\n").unwrap();
        write_script(&path, "-- second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "-- second\n");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = scratch_dir("fail");
        fs::create_dir_all(&dir).unwrap();
        // The target is an existing directory, so the rename fails.
        let target = dir.join("rebuild.sql");
        fs::create_dir_all(target.join("occupied")).unwrap();
        assert!(write_script(&target, "-- script\n").is_err());
        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rebuild.sql".to_string()]);
        let _ = fs::remove_dir_all(&dir);
    }
}
