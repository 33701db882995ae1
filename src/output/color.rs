//! dircolors-style path colorization
//!
//! Parses `LS_COLORS` into the handful of rules we use: the type
//! styles (`di`, `ln`, `or`, `ex`, `pi`, `so`, `bd`, `cd`, `fi`) and
//! `*.ext` suffix styles. Falls back to a conservative built-in
//! palette when the variable is unset.

use std::collections::HashMap;

use crate::entry::Entry;
use crate::types::FileKind;

const DEFAULT_LS_COLORS: &str =
    "di=01;34:ln=01;36:pi=40;33:so=01;35:bd=40;33;01:cd=40;33;01:or=40;31;01:ex=01;32";

#[derive(Debug)]
pub struct LsColors {
    styles: HashMap<String, String>,
    extensions: HashMap<String, String>,
}

impl LsColors {
    pub fn from_env() -> LsColors {
        let spec = std::env::var("LS_COLORS").unwrap_or_default();
        if spec.trim().is_empty() {
            LsColors::parse(DEFAULT_LS_COLORS)
        } else {
            LsColors::parse(&spec)
        }
    }

    pub fn parse(spec: &str) -> LsColors {
        let mut styles = HashMap::new();
        let mut extensions = HashMap::new();

        for rule in spec.split(':') {
            let Some((key, style)) = rule.split_once('=') else {
                continue;
            };
            if style.is_empty() {
                continue;
            }
            if let Some(ext) = key.strip_prefix("*.") {
                extensions.insert(ext.to_lowercase(), style.to_string());
            } else {
                styles.insert(key.to_string(), style.to_string());
            }
        }

        LsColors { styles, extensions }
    }

    fn wrap(style: Option<&String>, text: &str) -> String {
        match style {
            Some(style) if !text.is_empty() => format!("\x1b[{style}m{text}\x1b[0m"),
            _ => text.to_string(),
        }
    }

    fn style_for(&self, entry: &Entry) -> Option<&String> {
        let key = match entry.kind() {
            FileKind::Directory => "di",
            FileKind::Symlink => {
                if entry.attribute("broken") == Some(crate::types::Value::Boolean(true)) {
                    "or"
                } else {
                    "ln"
                }
            }
            FileKind::Fifo => "pi",
            FileKind::Socket => "so",
            FileKind::BlockDevice => "bd",
            FileKind::CharDevice => "cd",
            FileKind::File | FileKind::Other => {
                if entry.attribute("exec") == Some(crate::types::Value::Boolean(true)) {
                    "ex"
                } else if let Some(ext) = entry.name.rsplit_once('.').map(|(_, e)| e) {
                    return self
                        .extensions
                        .get(&ext.to_lowercase())
                        .or_else(|| self.styles.get("fi"));
                } else {
                    "fi"
                }
            }
        };
        self.styles.get(key)
    }

    /// Colorize a whole path: the dirname in the directory style, the
    /// basename in the entry's own style.
    pub fn paint_path(&self, path: &str, entry: &Entry) -> String {
        match path.rfind('/') {
            Some(pos) => {
                let (dir, name) = path.split_at(pos + 1);
                format!(
                    "{}{}",
                    Self::wrap(self.styles.get("di"), dir),
                    Self::wrap(self.style_for(entry), name)
                )
            }
            None => Self::wrap(self.style_for(entry), path),
        }
    }

    pub fn paint_name(&self, name: &str, entry: &Entry) -> String {
        Self::wrap(self.style_for(entry), name)
    }

    pub fn paint_dir(&self, dir: &str) -> String {
        Self::wrap(self.styles.get("di"), dir)
    }
}
