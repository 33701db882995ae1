//! Filesystem entries
//!
//! An [`Entry`] is one filesystem object discovered by the walker: a
//! stat snapshot plus everything derivable from it without extra I/O.
//! The attributes of the built-in `file` plugin are answered directly
//! from here; [`Entry::attribute`] returns `None` for attributes the
//! entry does not have (e.g. `link` on a regular file), which the
//! evaluator treats as a non-match rather than an error.

use std::fs::Metadata;
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ignore::IgnoreStack;
use crate::types::{FileKind, Value, MODE_ALL};

/// One search root given on the command line. Entries keep a handle
/// to their start point for `relpath`, `depth` and `samedev`.
#[derive(Debug)]
pub struct StartPoint {
    /// The directory as given by the user, e.g. `.` or `src`.
    pub root: String,
    /// Its absolute form.
    pub absroot: PathBuf,
    /// Device id, for the one-file-system policy.
    pub device: u64,
}

impl StartPoint {
    pub fn new(root: &str, follow_symlinks: bool) -> io::Result<StartPoint> {
        let metadata = if follow_symlinks {
            std::fs::metadata(root)?
        } else {
            std::fs::symlink_metadata(root)?
        };
        let absroot = std::path::absolute(root)?;
        Ok(StartPoint {
            root: root.to_string(),
            absroot,
            device: metadata.dev(),
        })
    }
}

fn join(base: &str, rest: &str) -> String {
    if base.is_empty() || rest.is_empty() {
        return format!("{base}{rest}");
    }
    if base.ends_with('/') {
        format!("{base}{rest}")
    } else {
        format!("{base}/{rest}")
    }
}

fn classify(metadata: &Metadata) -> FileKind {
    let ft = metadata.file_type();
    if ft.is_dir() {
        FileKind::Directory
    } else if ft.is_file() {
        FileKind::File
    } else if ft.is_symlink() {
        FileKind::Symlink
    } else if ft.is_socket() {
        FileKind::Socket
    } else if ft.is_fifo() {
        FileKind::Fifo
    } else if ft.is_char_device() {
        FileKind::CharDevice
    } else if ft.is_block_device() {
        FileKind::BlockDevice
    } else {
        FileKind::Other
    }
}

/// One filesystem object under consideration.
#[derive(Debug)]
pub struct Entry {
    start: Arc<StartPoint>,
    /// Path relative to the start directory.
    pub relpath: String,
    /// Display path: the start directory joined with `relpath`.
    pub path: String,
    /// Absolute path, the identity of the entry.
    pub abspath: PathBuf,
    /// Dirname portion of `path` (may be empty).
    pub dir: String,
    /// Basename portion of `path`.
    pub name: String,
    metadata: Metadata,
    kind: FileKind,
    link: Option<String>,
    target: Option<PathBuf>,
    broken: bool,
    /// The ignore rule sets in effect for this entry.
    pub ignores: IgnoreStack,
}

impl Entry {
    pub fn new(
        start: Arc<StartPoint>,
        relpath: String,
        metadata: Metadata,
        ignores: IgnoreStack,
    ) -> Entry {
        let path = if start.root == "." {
            relpath.clone()
        } else {
            join(&start.root, &relpath)
        };
        let abspath = start.absroot.join(&relpath);

        let (dir, name) = match path.rfind('/') {
            Some(pos) => (path[..pos].to_string(), path[pos + 1..].to_string()),
            None => (String::new(), path.clone()),
        };

        let kind = classify(&metadata);

        // Resolve symlink information early so that later attribute
        // lookups cannot fail with I/O errors.
        let (link, target, broken) = if kind == FileKind::Symlink {
            match std::fs::read_link(&abspath) {
                Ok(dest) => {
                    let raw = if dest.is_absolute() {
                        dest.clone()
                    } else {
                        abspath.parent().unwrap_or(Path::new("/")).join(&dest)
                    };
                    let broken = !raw.exists();
                    let target = raw.canonicalize().unwrap_or(raw);
                    (Some(dest.to_string_lossy().into_owned()), Some(target), broken)
                }
                Err(_) => (None, None, true),
            }
        } else {
            (None, None, false)
        };

        Entry {
            start,
            relpath,
            path,
            abspath,
            dir,
            name,
            metadata,
            kind,
            link,
            target,
            broken,
            ignores,
        }
    }

    /// Create an Entry for a file given as a `{ref}` reference.
    pub fn reference(path: &str, follow_symlinks: bool) -> io::Result<Entry> {
        let trimmed = path.trim_end_matches('/');
        let (dir, name) = match trimmed.rfind('/') {
            Some(pos) => (&trimmed[..pos.max(1)], trimmed[pos + 1..].to_string()),
            None => (".", trimmed.to_string()),
        };
        let start = Arc::new(StartPoint::new(dir, follow_symlinks)?);
        let metadata = if follow_symlinks {
            std::fs::metadata(path)?
        } else {
            std::fs::symlink_metadata(path)?
        };
        Ok(Entry::new(start, name, metadata, IgnoreStack::new()))
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Size in bytes; every type except regular files reports 0.
    pub fn size(&self) -> u64 {
        if self.is_file() {
            self.metadata.len()
        } else {
            0
        }
    }

    pub fn mtime(&self) -> i64 {
        self.metadata.mtime()
    }

    /// Modification time in nanoseconds, the cache invalidation key.
    pub fn mtime_ns(&self) -> i64 {
        self.metadata.mtime() * 1_000_000_000 + self.metadata.mtime_nsec()
    }

    pub fn depth(&self) -> u32 {
        self.relpath.matches('/').count() as u32
    }

    fn ext(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 => &self.name[pos + 1..],
            _ => "",
        }
    }

    fn pathx(&self) -> String {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 => {
                let cut = self.name.len() - pos;
                self.path[..self.path.len() - cut].to_string()
            }
            _ => self.path.clone(),
        }
    }

    fn hidden(&self) -> bool {
        self.path.split('/').any(|part| part.starts_with('.'))
    }

    fn empty(&self) -> bool {
        if self.is_dir() {
            match std::fs::read_dir(&self.abspath) {
                Ok(mut entries) => entries.next().is_none(),
                Err(_) => false,
            }
        } else if self.is_file() {
            self.size() == 0
        } else {
            false
        }
    }

    fn executable(&self) -> bool {
        if self.is_dir() || self.is_symlink() {
            return false;
        }
        self.metadata.permissions().mode() & 0o111 != 0
    }

    /// Whether the file starts with text rather than binary data.
    fn text(&self) -> bool {
        if !self.is_file() {
            return false;
        }
        let Ok(bytes) = read_prefix(&self.abspath, 4096) else {
            return false;
        };
        if bytes.contains(&0) {
            return false;
        }
        match std::str::from_utf8(&bytes) {
            Ok(_) => true,
            // A multi-byte character may be cut off at the end of the
            // prefix we read.
            Err(err) => err.valid_up_to() + 4 > bytes.len(),
        }
    }

    fn mountpoint(&self) -> bool {
        if !self.is_dir() {
            return false;
        }
        match self.abspath.parent() {
            None => true,
            Some(parent) => match std::fs::symlink_metadata(parent) {
                Ok(meta) => meta.dev() != self.metadata.dev(),
                Err(_) => false,
            },
        }
    }

    /// Look up an attribute of the built-in `file` plugin. Returns
    /// `None` if this entry does not provide it.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "path" => Value::Path(self.path.clone()),
            "root" => Value::Path(self.start.root.clone()),
            "relpath" => Value::Path(self.relpath.clone()),
            "dir" => Value::Path(self.dir.clone()),
            "name" => Value::Path(self.name.clone()),
            "ext" => Value::Text(self.ext().to_string()),
            "pathx" => Value::Path(self.pathx()),
            "namex" => {
                let pathx = self.pathx();
                let namex = pathx.rsplit('/').next().unwrap_or(&pathx);
                Value::Path(namex.to_string())
            }
            "mode" => Value::Mode(self.metadata.mode()),
            "perm" => Value::Mode(self.metadata.mode() & MODE_ALL),
            "type" => Value::FileType(self.kind),
            "device" => Value::Number(self.metadata.dev()),
            "inode" => Value::Number(self.metadata.ino()),
            "samedev" => Value::Boolean(self.metadata.dev() == self.start.device),
            "depth" => Value::Number(self.depth() as u64),
            "exec" => Value::Boolean(self.executable()),
            "size" => Value::Size(self.size()),
            "time" | "mtime" => Value::Time(self.metadata.mtime()),
            "ctime" => Value::Time(self.metadata.ctime()),
            "atime" => Value::Time(self.metadata.atime()),
            "links" => Value::Number(self.metadata.nlink()),
            "uid" => Value::Number(self.metadata.uid() as u64),
            "gid" => Value::Number(self.metadata.gid() as u64),
            "hide" => Value::Boolean(self.name.starts_with('.')),
            "hidden" => Value::Boolean(self.hidden()),
            "empty" => Value::Boolean(self.empty()),
            "link" => Value::Path(self.link.clone()?),
            "target" => Value::Path(self.target.as_ref()?.to_string_lossy().into_owned()),
            "broken" => Value::Boolean(self.broken),
            "text" => Value::Boolean(self.text()),
            "mount" => Value::Boolean(self.mountpoint()),
            _ => return None,
        };
        Some(value)
    }
}

fn read_prefix(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    use std::io::Read;
    let mut buf = vec![0u8; limit];
    let mut file = std::fs::File::open(path)?;
    let mut filled = 0;
    loop {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == limit {
            break;
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry_for(dir: &Path, relpath: &str) -> Entry {
        let start = Arc::new(StartPoint::new(dir.to_str().unwrap(), false).unwrap());
        let metadata = std::fs::symlink_metadata(dir.join(relpath)).unwrap();
        Entry::new(start, relpath.to_string(), metadata, IgnoreStack::new())
    }

    #[test]
    fn test_basic_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("note.txt")).unwrap();
        f.write_all(b"hello").unwrap();
        drop(f);

        let entry = entry_for(dir.path(), "note.txt");
        assert_eq!(entry.attribute("name"), Some(Value::Path("note.txt".into())));
        assert_eq!(entry.attribute("ext"), Some(Value::Text("txt".into())));
        assert_eq!(entry.attribute("size"), Some(Value::Size(5)));
        assert_eq!(entry.attribute("type"), Some(Value::FileType(FileKind::File)));
        assert_eq!(entry.attribute("depth"), Some(Value::Number(0)));
        assert_eq!(entry.attribute("hide"), Some(Value::Boolean(false)));
        assert_eq!(entry.attribute("empty"), Some(Value::Boolean(false)));
        assert_eq!(entry.attribute("text"), Some(Value::Boolean(true)));
        assert_eq!(entry.attribute("link"), None);
        assert_eq!(entry.attribute("bogus"), None);
    }

    #[test]
    fn test_directory_size_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::File::create(dir.path().join("sub/file")).unwrap();

        let entry = entry_for(dir.path(), "sub");
        assert_eq!(entry.attribute("size"), Some(Value::Size(0)));
        assert_eq!(entry.attribute("empty"), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_hidden_components() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".config/app")).unwrap();
        std::fs::File::create(dir.path().join(".config/app/settings")).unwrap();

        let entry = entry_for(dir.path(), ".config/app/settings");
        assert_eq!(entry.attribute("hide"), Some(Value::Boolean(false)));
        assert_eq!(entry.attribute("hidden"), Some(Value::Boolean(true)));
        assert_eq!(entry.attribute("depth"), Some(Value::Number(2)));
    }

    #[test]
    fn test_symlink_attributes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real", dir.path().join("alias")).unwrap();
        std::os::unix::fs::symlink("gone", dir.path().join("dangling")).unwrap();

        let entry = entry_for(dir.path(), "alias");
        assert!(entry.is_symlink());
        assert_eq!(entry.attribute("link"), Some(Value::Path("real".into())));
        assert_eq!(entry.attribute("broken"), Some(Value::Boolean(false)));
        assert_eq!(entry.attribute("size"), Some(Value::Size(0)));

        let entry = entry_for(dir.path(), "dangling");
        assert_eq!(entry.attribute("broken"), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_pathx_and_namex() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::File::create(dir.path().join("sub/archive.tar")).unwrap();

        let entry = entry_for(dir.path(), "sub/archive.tar");
        let path = entry.path.clone();
        assert!(path.ends_with("sub/archive.tar"));
        assert_eq!(
            entry.attribute("pathx"),
            Some(Value::Path(path.trim_end_matches(".tar").to_string()))
        );
        assert_eq!(entry.attribute("namex"), Some(Value::Path("archive".into())));
    }
}
