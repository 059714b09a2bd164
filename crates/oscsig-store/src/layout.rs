//! Frame directory layout: a flat directory of `frame<N>.json` files,
//! numbered from 0 in capture order.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

pub const FRAME_PREFIX: &str = "frame";
pub const FRAME_EXTENSION: &str = "json";

/// File name of frame `index`.
pub fn frame_file_name(index: usize) -> String {
    format!("{FRAME_PREFIX}{index}.{FRAME_EXTENSION}")
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(frame_file_name(index))
}

/// Index encoded in a frame file name, or `None` for any other file.
pub fn parse_frame_index(file_name: &str) -> Option<usize> {
    let stem = file_name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXTENSION)?
        .strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Number of frame files in `dir`. Other files are ignored.
pub fn count_frames(dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut count = 0;
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file
            && let Some(name) = entry.file_name().to_str()
            && parse_frame_index(name).is_some()
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Remove `dir` with all its contents if it exists, then create it empty.
pub fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0), "frame0.json");
        assert_eq!(frame_file_name(1234), "frame1234.json");
    }

    #[test]
    fn test_parse_frame_index() {
        assert_eq!(parse_frame_index("frame0.json"), Some(0));
        assert_eq!(parse_frame_index("frame42.json"), Some(42));
        assert_eq!(parse_frame_index("frame.json"), None);
        assert_eq!(parse_frame_index("frame-1.json"), None);
        assert_eq!(parse_frame_index("frame1.txt"), None);
        assert_eq!(parse_frame_index("frame1json"), None);
        assert_eq!(parse_frame_index("notes.json"), None);
        assert_eq!(parse_frame_index(".DS_Store"), None);
    }

    #[test]
    fn test_count_frames_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            fs::write(frame_path(dir.path(), i), "{}").unwrap();
        }
        fs::write(dir.path().join("README.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("frame9.json")).unwrap();
        assert_eq!(count_frames(dir.path()).unwrap(), 3);
    }

    #[test]
    fn test_count_frames_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = count_frames(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_recreate_dir_destroys_contents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("rec");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("frame0.json"), "{}").unwrap();
        fs::create_dir(target.join("nested")).unwrap();

        recreate_dir(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }
}
