//! Capability-based filesystem helpers built on `cap-std` and `camino`.
//!
//! Callers open a root directory once with [`open_root`] and perform every
//! further operation relative to that handle, so store keys can never escape
//! the root.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io::{self, Write};
use std::path::Component;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Read a whole file named by an ambient UTF-8 path.
pub fn read_utf8_file(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("path should include a file name"))?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read(file_name)
}

/// Create `path` (and any missing ancestors) if needed, then open it.
pub fn open_root(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(base);
    }
    base.create_dir_all(&relative)?;
    base.open_dir(&relative)
}

/// Open an existing directory at `path`. Nothing is created, so a missing
/// directory fails with [`io::ErrorKind::NotFound`].
pub fn open_existing(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    let (base, relative) = base_dir_and_relative(path)?;
    if relative.as_str().is_empty() {
        return Ok(base);
    }
    base.open_dir(&relative)
}

/// Write `body` to `relative` inside `dir` without ever replacing an existing
/// file.
///
/// The bytes go to a hidden temporary sibling first and are then hard-linked
/// into place, so readers see either no file or the complete file. Fails with
/// [`io::ErrorKind::AlreadyExists`] when `relative` is taken.
pub fn write_new_atomic(dir: &fs_utf8::Dir, relative: &Utf8Path, body: &[u8]) -> io::Result<()> {
    let file_name = relative
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?;
    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent)?;
    }
    let temp = relative.with_file_name(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let mut options = fs_utf8::OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(&temp, &options)?;
    let written = file.write_all(body).and_then(|()| file.sync_all());
    drop(file);

    let linked = written.and_then(|()| dir.hard_link(&temp, dir, relative));
    let removed = dir.remove_file(&temp);
    linked?;
    removed
}

/// Append `body` to `relative` inside `dir`, creating the file and its parent
/// directories when missing.
pub fn append(dir: &fs_utf8::Dir, relative: &Utf8Path, body: &[u8]) -> io::Result<()> {
    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent)?;
    }
    let mut options = fs_utf8::OpenOptions::new();
    options.append(true).create(true);
    let mut file = dir.open_with(relative, &options)?;
    file.write_all(body)?;
    file.sync_all()
}

/// List every regular file below `relative` inside `dir`, as paths relative
/// to `dir`. Hidden temporary files are skipped. A missing directory lists as
/// empty.
pub fn list_files(dir: &fs_utf8::Dir, relative: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![relative.to_path_buf()];
    while let Some(current) = pending.pop() {
        let readable = if current.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            current.as_path()
        };
        let entries = match dir.read_dir(readable) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name()?;
            if name.starts_with('.') {
                continue;
            }
            let path = current.join(&name);
            let kind = entry.file_type()?;
            if kind.is_dir() {
                pending.push(path);
            } else if kind.is_file() {
                found.push(path);
            }
        }
    }
    Ok(found)
}

/// Split an absolute or relative path into an ambient base directory and a
/// relative suffix that cap-std will accept.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn root() -> (TempDir, fs_utf8::Dir) {
        let temp = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("store")).expect("utf-8 temp path");
        let dir = open_root(&path).expect("open root");
        (temp, dir)
    }

    #[rstest]
    fn write_new_refuses_to_overwrite(root: (TempDir, fs_utf8::Dir)) {
        let (_temp, dir) = root;
        let key = Utf8Path::new("exports/a.geojson");
        write_new_atomic(&dir, key, b"first").expect("first write");
        let err = write_new_atomic(&dir, key, b"second").expect_err("second write must fail");
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(dir.read(key).expect("read back"), b"first");
    }

    #[rstest]
    fn write_new_leaves_no_temporary_files(root: (TempDir, fs_utf8::Dir)) {
        let (_temp, dir) = root;
        write_new_atomic(&dir, Utf8Path::new("exports/a.geojson"), b"{}").expect("write");
        let listed = list_files(&dir, Utf8Path::new("exports")).expect("list");
        assert_eq!(listed, vec![Utf8PathBuf::from("exports/a.geojson")]);
        let hidden = dir
            .read_dir("exports")
            .expect("read dir")
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().ok())
            .filter(|name| name.starts_with('.'))
            .count();
        assert_eq!(hidden, 0);
    }

    #[rstest]
    fn append_accumulates(root: (TempDir, fs_utf8::Dir)) {
        let (_temp, dir) = root;
        let table = Utf8Path::new("places/pois.ndjson");
        append(&dir, table, b"one\n").expect("first append");
        append(&dir, table, b"two\n").expect("second append");
        assert_eq!(dir.read_to_string(table).expect("read"), "one\ntwo\n");
    }

    #[rstest]
    fn listing_a_missing_directory_is_empty(root: (TempDir, fs_utf8::Dir)) {
        let (_temp, dir) = root;
        assert!(list_files(&dir, Utf8Path::new("nothing")).expect("list").is_empty());
    }

    #[rstest]
    fn open_existing_does_not_create_missing_directories() {
        let temp = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("absent/store"))
            .expect("utf-8 temp path");
        let err = open_existing(&path).expect_err("missing directory");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!temp.path().join("absent").exists());
    }

    #[rstest]
    fn open_existing_sees_what_open_root_made() {
        let temp = TempDir::new().expect("create temp dir");
        let path =
            Utf8PathBuf::from_path_buf(temp.path().join("store")).expect("utf-8 temp path");
        let made = open_root(&path).expect("open root");
        made.write("a.txt", b"x").expect("write");
        let reopened = open_existing(&path).expect("existing directory");
        assert_eq!(reopened.read("a.txt").expect("read"), b"x");
    }

    #[rstest]
    fn reads_files_by_ambient_path() {
        let temp = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("boundary.geojson"))
            .expect("utf-8 temp path");
        std::fs::write(&path, b"{}").expect("write fixture");
        assert_eq!(read_utf8_file(&path).expect("read"), b"{}");
    }
}
