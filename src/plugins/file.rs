//! The `file` provider
//!
//! Declares the essential per-entry attributes. This is mostly a
//! catalog: the context answers `file.*` lookups straight from the
//! [`Entry`](crate::entry::Entry) object, so `process` has nothing
//! left to do.

use crate::entry::Entry;
use crate::registry::{AttrInfo, Provider, ProviderOutput};
use crate::types::ValueKind;

pub struct FileProvider;

const ATTRIBUTES: &[AttrInfo] = &[
    AttrInfo {
        name: "path",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The full pathname, relative to the current working directory \
               unless -a/--absolute-path is given.",
    },
    AttrInfo {
        name: "root",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The start directory the entry was found in.",
    },
    AttrInfo {
        name: "relpath",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The pathname relative to the start directory.",
    },
    AttrInfo {
        name: "dir",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The dirname portion of the path.",
    },
    AttrInfo {
        name: "name",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The basename portion of the path.",
    },
    AttrInfo {
        name: "ext",
        kind: ValueKind::Text,
        cost: 1,
        cacheable: false,
        help: "The file extension without the leading dot, or the empty string.",
    },
    AttrInfo {
        name: "pathx",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The path without the extension.",
    },
    AttrInfo {
        name: "namex",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The basename without the extension.",
    },
    AttrInfo {
        name: "mode",
        kind: ValueKind::Mode,
        cost: 1,
        cacheable: false,
        help: "The raw mode bits including the file type.",
    },
    AttrInfo {
        name: "perm",
        kind: ValueKind::Mode,
        cost: 1,
        cacheable: false,
        help: "The permission bits without the file type.",
    },
    AttrInfo {
        name: "type",
        kind: ValueKind::FileType,
        cost: 1,
        cacheable: false,
        help: "The file type: one of d/directory, f/file, l/symlink, s/socket, \
               p/pipe/fifo, char, block or other.",
    },
    AttrInfo {
        name: "device",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The id of the device the entry is located on.",
    },
    AttrInfo {
        name: "inode",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The inode number.",
    },
    AttrInfo {
        name: "samedev",
        kind: ValueKind::Boolean,
        cost: 1,
        cacheable: false,
        help: "Whether the entry is on the same device as the start directory.",
    },
    AttrInfo {
        name: "depth",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The depth below the start directory.",
    },
    AttrInfo {
        name: "exec",
        kind: ValueKind::Boolean,
        cost: 1,
        cacheable: false,
        help: "Whether the file is executable.",
    },
    AttrInfo {
        name: "size",
        kind: ValueKind::Size,
        cost: 1,
        cacheable: false,
        help: "The size in bytes. All types except regular files have size 0.",
    },
    AttrInfo {
        name: "time",
        kind: ValueKind::Time,
        cost: 1,
        cacheable: false,
        help: "An alias for mtime.",
    },
    AttrInfo {
        name: "mtime",
        kind: ValueKind::Time,
        cost: 1,
        cacheable: false,
        help: "The modification time in seconds since the epoch.",
    },
    AttrInfo {
        name: "ctime",
        kind: ValueKind::Time,
        cost: 1,
        cacheable: false,
        help: "The inode change time in seconds since the epoch.",
    },
    AttrInfo {
        name: "atime",
        kind: ValueKind::Time,
        cost: 1,
        cacheable: false,
        help: "The access time in seconds since the epoch.",
    },
    AttrInfo {
        name: "links",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The number of links to the inode.",
    },
    AttrInfo {
        name: "uid",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The user id of the owner.",
    },
    AttrInfo {
        name: "gid",
        kind: ValueKind::Number,
        cost: 1,
        cacheable: false,
        help: "The group id of the owner.",
    },
    AttrInfo {
        name: "hide",
        kind: ValueKind::Boolean,
        cost: 1,
        cacheable: false,
        help: "Whether the name starts with a dot.",
    },
    AttrInfo {
        name: "hidden",
        kind: ValueKind::Boolean,
        cost: 1,
        cacheable: false,
        help: "Whether any path component starts with a dot.",
    },
    AttrInfo {
        name: "empty",
        kind: ValueKind::Boolean,
        cost: 2,
        cacheable: false,
        help: "Whether the file or directory is empty.",
    },
    AttrInfo {
        name: "link",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The target of a symbolic link relative to its parent directory.",
    },
    AttrInfo {
        name: "target",
        kind: ValueKind::Path,
        cost: 1,
        cacheable: false,
        help: "The resolved target path of a symbolic link.",
    },
    AttrInfo {
        name: "broken",
        kind: ValueKind::Boolean,
        cost: 1,
        cacheable: false,
        help: "Whether a symbolic link points to a file that does not exist.",
    },
    AttrInfo {
        name: "text",
        kind: ValueKind::Boolean,
        cost: 3,
        cacheable: true,
        help: "Whether the file starts with text rather than binary data.",
    },
    AttrInfo {
        name: "mount",
        kind: ValueKind::Boolean,
        cost: 2,
        cacheable: false,
        help: "Whether the directory is a mountpoint.",
    },
];

impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn description(&self) -> &'static str {
        "All essential file attributes."
    }

    fn attributes(&self) -> &'static [AttrInfo] {
        ATTRIBUTES
    }

    fn process(&self, _entry: &Entry, _out: &mut ProviderOutput) -> Result<(), String> {
        // file.* lookups bypass process(), see EntryContext::get.
        Ok(())
    }
}
