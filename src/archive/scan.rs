//! Synchronous directory scans.  Callers run these under `spawn_blocking`.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::warn;

use crate::config::SizeMode;

/// Observed attributes of one entry directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirStats {
    pub size_bytes: u64,
    /// Newest mtime among immediate children, or the directory's own mtime
    /// when it has none.
    pub last_modified: SystemTime,
    pub num_files: usize,
    pub num_subdirectories: usize,
}

/// Names of every immediate child of `root`, sorted.  Names are kept as
/// `OsString` so they join back onto `root` even when not valid UTF-8.
pub fn list_names(root: &Path) -> io::Result<Vec<OsString>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        names.push(entry?.file_name());
    }
    names.sort();
    Ok(names)
}

/// Count and size the immediate children of `dir`.
///
/// Symlinks are followed, so a link to a file counts as a file of the
/// target's size.  A dangling link is neither; only its own mtime is used.
pub fn scan_entry(dir: &Path, mode: SizeMode) -> io::Result<DirStats> {
    let mut top_level_bytes: u64 = 0;
    let mut newest: Option<SystemTime> = None;
    let mut num_files = 0;
    let mut num_subdirectories = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(e) => {
                // Dangling or looping symlink: fall back to the link itself.
                let link = entry.metadata()?;
                if !link.file_type().is_symlink() {
                    return Err(e);
                }
                link
            }
        };

        let modified = meta.modified()?;
        newest = Some(newest.map_or(modified, |n| n.max(modified)));

        if meta.is_file() {
            num_files += 1;
            top_level_bytes += meta.len();
        } else if meta.is_dir() {
            num_subdirectories += 1;
        }
    }

    let last_modified = match newest {
        Some(t) => t,
        None => fs::metadata(dir)?.modified()?,
    };

    let size_bytes = match mode {
        SizeMode::TopLevel => top_level_bytes,
        SizeMode::Recursive => tree_size(dir),
    };

    Ok(DirStats {
        size_bytes,
        last_modified,
        num_files,
        num_subdirectories,
    })
}

/// Total size of every regular file under `dir`.
///
/// Unreadable directories are logged and skipped.  Symlinks are not followed.
fn tree_size(dir: &Path) -> u64 {
    let mut total: u64 = 0;

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(e) => e,
            Err(err) => {
                warn!(
                    path = %current.display(),
                    error = %err,
                    "failed to read directory during size computation"
                );
                continue;
            }
        };

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Ok(meta) = entry.metadata() else { continue };

            if meta.is_dir() {
                stack.push(entry.path());
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        fs::write(tmp.path().join("a.txt"), "aaa").unwrap(); // 3
        fs::write(tmp.path().join("b.txt"), "bbbbbbb").unwrap(); // 7
        fs::write(sub.join("c.txt"), "ccccc").unwrap(); // 5
        tmp
    }

    #[test]
    fn list_names_is_sorted_and_unfiltered() {
        let tmp = fixture();
        let names: Vec<_> = list_names(tmp.path())
            .unwrap()
            .into_iter()
            .map(|n| n.into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "empty", "sub"]);
    }

    #[test]
    fn list_names_missing_root_errors() {
        assert!(list_names(Path::new("/nonexistent/repo-archive-root")).is_err());
    }

    #[test]
    fn top_level_scan_ignores_nested_files() {
        let tmp = fixture();
        let stats = scan_entry(tmp.path(), SizeMode::TopLevel).unwrap();
        assert_eq!(stats.size_bytes, 10);
        assert_eq!(stats.num_files, 2);
        assert_eq!(stats.num_subdirectories, 2);
    }

    #[test]
    fn recursive_scan_counts_nested_files() {
        let tmp = fixture();
        let stats = scan_entry(tmp.path(), SizeMode::Recursive).unwrap();
        assert_eq!(stats.size_bytes, 15);
        assert_eq!(stats.num_files, 2);
        assert_eq!(stats.num_subdirectories, 2);
    }

    #[test]
    fn last_modified_is_newest_child() {
        let tmp = fixture();
        let newest = fs::metadata(tmp.path().join("b.txt"))
            .unwrap()
            .modified()
            .unwrap()
            .max(fs::metadata(tmp.path().join("a.txt")).unwrap().modified().unwrap());
        let stats = scan_entry(tmp.path(), SizeMode::TopLevel).unwrap();
        assert!(stats.last_modified >= newest);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn list_names_keeps_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let raw = std::ffi::OsStr::from_bytes(b"caf\xe9");
        fs::create_dir(tmp.path().join(raw)).unwrap();

        let names = list_names(tmp.path()).unwrap();
        assert_eq!(names, vec![raw.to_os_string()]);
        assert!(tmp.path().join(&names[0]).is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_counts_as_target() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir(&docs).unwrap();
        fs::write(docs.join("README.md"), vec![b'r'; 100]).unwrap();
        std::os::unix::fs::symlink("docs/README.md", tmp.path().join("README.md")).unwrap();

        let stats = scan_entry(tmp.path(), SizeMode::TopLevel).unwrap();
        assert_eq!(stats.num_files, 1);
        assert_eq!(stats.num_subdirectories, 1);
        assert_eq!(stats.size_bytes, 100);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "aaa").unwrap();
        std::os::unix::fs::symlink("missing", tmp.path().join("broken")).unwrap();

        let stats = scan_entry(tmp.path(), SizeMode::TopLevel).unwrap();
        assert_eq!(stats.num_files, 1);
        assert_eq!(stats.num_subdirectories, 0);
        assert_eq!(stats.size_bytes, 3);
    }

    #[test]
    fn empty_directory_uses_own_mtime() {
        let tmp = tempfile::tempdir().unwrap();
        let own = fs::metadata(tmp.path()).unwrap().modified().unwrap();
        let stats = scan_entry(tmp.path(), SizeMode::TopLevel).unwrap();
        assert_eq!(stats.last_modified, own);
        assert_eq!(stats.size_bytes, 0);
        assert_eq!(stats.num_files, 0);
        assert_eq!(stats.num_subdirectories, 0);
    }
}
