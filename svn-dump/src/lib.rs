//! A writer for the [SVN repository dump
//! format](https://svn.apache.org/repos/asf/subversion/trunk/notes/dump-load-format.txt),
//! version 2.
//!
//! Unlike `git fast-import`, the dump format has no notion of directories
//! being created implicitly: every parent directory a file lives under has
//! to have its own `Node-path ... Node-kind: dir` record the first time
//! something is added under it, and has to be torn down again once the last
//! thing under it is removed. [`Dumper`] tracks that bookkeeping so callers
//! only have to think in terms of files.

use std::{
    collections::HashMap,
    io::Write,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{TimeZone, Utc};
use md5::{Digest, Md5};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A marker basename that is never a real file, inserted into the root
/// directory's known-children set so it is never considered empty and
/// torn down by [`Dumper::rmdir`].
const ROOT_SENTINEL: &str = "\u{0}dontdelete";

/// Writes an SVN dump stream, tracking which directories and files are
/// already known so it can emit `add`/`change`/`delete` node actions and
/// the implied parent-directory records correctly.
#[derive(Debug)]
pub struct Dumper<W: Write> {
    writer: W,
    /// The dump-tree-relative root every node path is nested under (the
    /// `svnpath` argument in incremental mode); empty if paths are rooted
    /// at the top of the dump.
    root: String,
    dirs: HashMap<String, HashMap<String, ()>>,
}

impl<W: Write> Dumper<W> {
    /// Constructs a new dumper, writing the dump format header immediately.
    pub fn new(mut writer: W, root: &str) -> Result<Self, Error> {
        writeln!(writer, "SVN-fs-dump-format-version: 2")?;
        writeln!(writer)?;

        let root = root.trim_end_matches('/').to_string();
        let mut dirs = HashMap::new();
        let mut sentinel = HashMap::new();
        sentinel.insert(ROOT_SENTINEL.to_string(), ());
        dirs.insert(root.clone(), sentinel);

        Ok(Self { writer, root, dirs })
    }

    /// Prefixes a CVS-root-relative path with the dump tree's root.
    pub fn node_path(&self, munged: &str) -> String {
        if self.root.is_empty() {
            munged.to_string()
        } else {
            format!("{}/{}", self.root, munged)
        }
    }

    /// Whether `path` (already dump-tree-rooted, as returned by
    /// [`Dumper::node_path`]) is already known to exist.
    pub fn exists(&self, path: &str) -> bool {
        self.dirs
            .get(dirname(path))
            .map(|names| names.contains_key(basename(path)))
            .unwrap_or(false)
    }

    /// Seeds the dumper's directory bookkeeping with a path known to
    /// already exist in the target repository, without writing any node
    /// records. Used when resuming an incremental import against an
    /// existing SVN tree.
    pub fn seed_known(&mut self, path: &str) {
        let d = dirname(path).to_string();
        self.dirs.entry(d).or_default().insert(basename(path).to_string(), ());
    }

    /// Begins a new revision, writing its `svn:author`/`svn:date`/`svn:log`
    /// revision properties.
    pub fn begin_revision(
        &mut self,
        number: u64,
        author: &str,
        time: SystemTime,
        log: &[u8],
    ) -> Result<(), Error> {
        let mut props = String::new();
        props.push_str(&str_prop("svn:author", author));
        props.push_str(&str_prop("svn:date", &svn_time(time)));
        props.push_str(&str_prop("svn:log", &String::from_utf8_lossy(log)));
        props.push_str("PROPS-END\n");

        writeln!(self.writer, "Revision-number: {}", number)?;
        writeln!(self.writer, "Prop-content-length: {}", props.len())?;
        writeln!(self.writer, "Content-length: {}", props.len())?;
        writeln!(self.writer)?;
        write!(self.writer, "{}", props)?;
        writeln!(self.writer)?;

        Ok(())
    }

    /// Deletes a file node. Returns `false` without writing anything if the
    /// path wasn't known to exist (mirroring the original importer's
    /// defensive warning-and-skip behaviour).
    pub fn delete_file(&mut self, path: &str) -> Result<bool, Error> {
        if !self.exists(path) {
            return Ok(false);
        }

        writeln!(self.writer, "Node-path: {}", path)?;
        writeln!(self.writer, "Node-kind: file")?;
        writeln!(self.writer, "Node-action: delete")?;
        writeln!(self.writer)?;

        self.remove(path)?;
        Ok(true)
    }

    /// Adds or changes a file node, computing its `svn:executable`
    /// property and `Text-content-md5` checksum.
    pub fn write_file(&mut self, path: &str, content: &[u8], executable: bool) -> Result<(), Error> {
        let is_new = !self.exists(path);
        if is_new {
            self.add(path)?;
        }

        let mut props = String::new();
        if executable {
            props.push_str(&str_prop("svn:executable", "*"));
        }
        props.push_str("PROPS-END\n");

        let mut hasher = Md5::new();
        hasher.update(content);
        let digest = hasher.finalize();

        writeln!(self.writer, "Node-path: {}", path)?;
        writeln!(self.writer, "Node-kind: file")?;
        writeln!(
            self.writer,
            "Node-action: {}",
            if is_new { "add" } else { "change" }
        )?;
        writeln!(self.writer, "Prop-content-length: {}", props.len())?;
        writeln!(self.writer, "Text-content-length: {}", content.len())?;
        write!(self.writer, "Text-content-md5: ")?;
        for byte in digest {
            write!(self.writer, "{:02x}", byte)?;
        }
        writeln!(self.writer)?;
        writeln!(self.writer, "Content-length: {}", props.len() + content.len())?;
        writeln!(self.writer)?;
        write!(self.writer, "{}", props)?;
        self.writer.write_all(content)?;
        writeln!(self.writer)?;
        writeln!(self.writer)?;

        Ok(())
    }

    fn add(&mut self, path: &str) -> Result<(), Error> {
        let d = dirname(path).to_string();
        if !self.dirs.contains_key(&d) {
            self.mkdir(&d)?;
        }
        self.dirs.entry(d).or_default().insert(basename(path).to_string(), ());
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), Error> {
        let d = dirname(path).to_string();
        if d == path {
            return Ok(());
        }
        if let Some(names) = self.dirs.get_mut(&d) {
            names.remove(basename(path));
        }
        self.rmdir(&d)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), Error> {
        match self.dirs.get(path) {
            Some(names) if names.is_empty() => {}
            _ => return Ok(()),
        }

        let prefix = format!("{}/", path);
        if self.dirs.keys().any(|other| other != path && other.starts_with(&prefix)) {
            return Ok(());
        }

        writeln!(self.writer, "Node-path: {}", path)?;
        writeln!(self.writer, "Node-kind: dir")?;
        writeln!(self.writer, "Node-action: delete")?;
        writeln!(self.writer)?;

        self.dirs.remove(path);

        let d = dirname(path).to_string();
        if d == path || !self.dirs.contains_key(&d) {
            return Ok(());
        }
        self.rmdir(&d)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), Error> {
        if self.dirs.contains_key(path) {
            return Ok(());
        }
        let d = dirname(path).to_string();
        if d == path {
            return Ok(());
        }
        self.mkdir(&d)?;

        writeln!(self.writer, "Node-path: {}", path)?;
        writeln!(self.writer, "Node-kind: dir")?;
        writeln!(self.writer, "Node-action: add")?;
        writeln!(self.writer)?;
        writeln!(self.writer)?;

        self.dirs.insert(path.to_string(), HashMap::new());
        Ok(())
    }
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

fn str_prop(key: &str, value: &str) -> String {
    format!("K {}\n{}\nV {}\n{}\n", key.len(), key, value.len(), value)
}

fn svn_time(time: SystemTime) -> String {
    let secs = time.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
    Utc.timestamp(secs, 0).format("%Y-%m-%dT%H:%M:%S.000000Z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_prop_format() {
        assert_eq!(str_prop("svn:author", "alice"), "K 10\nsvn:author\nV 5\nalice\n");
    }

    #[test]
    fn test_svn_time_format() {
        assert_eq!(svn_time(UNIX_EPOCH), "1970-01-01T00:00:00.000000Z");
    }

    #[test]
    fn test_add_then_exists() {
        let mut buf = Vec::new();
        let mut dumper = Dumper::new(&mut buf, "").unwrap();
        assert!(!dumper.exists("dir1/file1"));
        dumper.write_file("dir1/file1", b"hello", false).unwrap();
        assert!(dumper.exists("dir1/file1"));

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Node-path: dir1\nNode-kind: dir\nNode-action: add"));
        assert!(text.contains("Node-path: dir1/file1\nNode-kind: file\nNode-action: add"));
    }

    #[test]
    fn test_delete_removes_now_empty_parent_dir() {
        let mut buf = Vec::new();
        let mut dumper = Dumper::new(&mut buf, "").unwrap();
        dumper.write_file("dir1/file1", b"hello", false).unwrap();
        assert!(dumper.delete_file("dir1/file1").unwrap());

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Node-path: dir1\nNode-kind: dir\nNode-action: delete"));
    }

    #[test]
    fn test_delete_missing_file_is_noop() {
        let mut buf = Vec::new();
        let mut dumper = Dumper::new(&mut buf, "").unwrap();
        assert!(!dumper.delete_file("never/seen").unwrap());
    }

    #[test]
    fn test_node_path_uses_root_prefix() {
        let buf = Vec::new();
        let dumper = Dumper::new(buf, "vendor/openbsd/head/src").unwrap();
        assert_eq!(dumper.node_path("foo/bar.c"), "vendor/openbsd/head/src/foo/bar.c");
    }

    #[test]
    fn test_shared_directory_survives_sibling_delete() {
        let mut buf = Vec::new();
        let mut dumper = Dumper::new(&mut buf, "").unwrap();
        dumper.write_file("dir1/a", b"1", false).unwrap();
        dumper.write_file("dir1/b", b"2", false).unwrap();
        assert!(dumper.delete_file("dir1/a").unwrap());

        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Node-action: delete"));
    }
}
