//! The `ignore` provider
//!
//! Answers whether an entry matches patterns from the ignore files
//! collected during the walk, and which ignore file held the winning
//! pattern. Not cacheable: the result depends on the surrounding
//! ignore files, not on the entry itself.

use crate::entry::Entry;
use crate::registry::{AttrInfo, Provider, ProviderOutput};
use crate::types::{Value, ValueKind};

pub struct IgnoreProvider;

const ATTRIBUTES: &[AttrInfo] = &[
    AttrInfo {
        name: "ignored",
        kind: ValueKind::Boolean,
        cost: 2,
        cacheable: false,
        help: "Whether the entry matches patterns in a .(git|fd|ff)ignore file.",
    },
    AttrInfo {
        name: "path",
        kind: ValueKind::Path,
        cost: 2,
        cacheable: false,
        help: "The ignore file containing the pattern that matched the entry.",
    },
];

impl Provider for IgnoreProvider {
    fn name(&self) -> &'static str {
        "ignore"
    }

    fn description(&self) -> &'static str {
        "Match entries against gitignore-style files."
    }

    fn attributes(&self) -> &'static [AttrInfo] {
        ATTRIBUTES
    }

    fn process(&self, entry: &Entry, out: &mut ProviderOutput) -> Result<(), String> {
        let (ignored, winner) = entry
            .ignores
            .matches(&entry.abspath, &entry.name, entry.is_dir());
        out.insert("ignored", Value::Boolean(ignored));
        if let Some(path) = winner {
            out.insert("path", Value::Path(path.to_string_lossy().into_owned()));
        }
        Ok(())
    }
}
