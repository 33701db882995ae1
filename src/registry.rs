//! The attribute provider registry
//!
//! The registry owns every [`Provider`] for the lifetime of the
//! process and resolves attribute names against their declarations.
//! Resolution order for unqualified names:
//!
//! 1. `plugin.attr` is an exact match.
//! 2. A plain `attr` declared by the `file` provider always resolves
//!    to `file.attr`; the essential attributes cannot be shadowed.
//! 3. Otherwise the name must be declared by exactly one provider,
//!    anything else is an ambiguity error.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::types::{Value, ValueKind};

/// A fully qualified attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub plugin: String,
    pub name: String,
}

impl Attribute {
    pub fn new(plugin: &str, name: &str) -> Attribute {
        Attribute {
            plugin: plugin.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plugin, self.name)
    }
}

/// Declaration of one attribute by a provider.
#[derive(Debug, Clone, Copy)]
pub struct AttrInfo {
    pub name: &'static str,
    pub kind: ValueKind,
    /// Relative computation cost; the evaluator runs cheap tests
    /// first. 1 = already stat'ed, 2 = extra syscalls, 3 = reads file
    /// contents.
    pub cost: u32,
    /// Whether values survive in the persistent cache. Only sensible
    /// for attributes derived purely from the file's own contents.
    pub cacheable: bool,
    pub help: &'static str,
}

/// The values a provider computed for one entry.
pub type ProviderOutput = HashMap<&'static str, Value>;

/// A bundle that declares and computes a set of attributes.
///
/// Built-in providers are linked directly; embedders can register
/// additional ones before the search starts.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }

    /// Names of providers that must be initialized before this one.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    fn attributes(&self) -> &'static [AttrInfo];

    /// Compute attribute values for one entry. A provider may set any
    /// subset of its declared attributes; the rest count as missing.
    /// An `Err` marks every declared attribute as missing and is
    /// reported once at debug level.
    fn process(&self, entry: &Entry, out: &mut ProviderOutput) -> std::result::Result<(), String>;
}

/// Metadata the registry keeps per attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttrMeta {
    pub kind: ValueKind,
    pub cost: u32,
    pub cacheable: bool,
    provider: usize,
}

/// The catalog of providers and their attributes.
pub struct Registry {
    providers: Vec<Arc<dyn Provider>>,
    by_name: HashMap<&'static str, usize>,
    attributes: HashMap<Attribute, AttrMeta>,
}

impl Registry {
    /// An empty registry; use [`Registry::with_builtins`] for the
    /// normal setup.
    pub fn new() -> Registry {
        Registry {
            providers: Vec::new(),
            by_name: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    /// A registry with the built-in providers loaded and validated.
    pub fn with_builtins() -> Result<Registry> {
        let mut registry = Registry::new();
        for provider in crate::plugins::builtins() {
            registry.register(provider)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Register a provider. Rejects duplicate provider names and
    /// duplicate fully-qualified attribute names.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        let name = provider.name();
        if self.by_name.contains_key(name) {
            return Err(Error::Plugin {
                name: name.to_string(),
                reason: "a plugin with this name is already registered".to_string(),
            });
        }

        let index = self.providers.len();
        for info in provider.attributes() {
            let attribute = Attribute::new(name, info.name);
            if self.attributes.contains_key(&attribute) {
                return Err(Error::Plugin {
                    name: name.to_string(),
                    reason: format!("attribute {attribute} is declared twice"),
                });
            }
            self.attributes.insert(
                attribute,
                AttrMeta {
                    kind: info.kind,
                    cost: info.cost,
                    cacheable: info.cacheable,
                    provider: index,
                },
            );
        }

        self.by_name.insert(name, index);
        self.providers.push(provider);
        Ok(())
    }

    /// Check provider dependencies: all must exist and the relation
    /// must be acyclic.
    pub fn validate(&self) -> Result<()> {
        // Depth-first topological check over the depends-on relation.
        let mut done: HashSet<&str> = HashSet::new();
        let mut in_progress: HashSet<&str> = HashSet::new();

        fn visit<'a>(
            registry: &'a Registry,
            name: &'a str,
            done: &mut HashSet<&'a str>,
            in_progress: &mut HashSet<&'a str>,
        ) -> Result<()> {
            if done.contains(name) {
                return Ok(());
            }
            if !in_progress.insert(name) {
                return Err(Error::Plugin {
                    name: name.to_string(),
                    reason: "cyclic plugin dependency".to_string(),
                });
            }
            let index = *registry.by_name.get(name).ok_or_else(|| Error::Plugin {
                name: name.to_string(),
                reason: "unknown plugin in dependency declaration".to_string(),
            })?;
            for &dep in registry.providers[index].depends_on() {
                visit(registry, dep, done, in_progress)?;
            }
            in_progress.remove(name);
            done.insert(name);
            Ok(())
        }

        for provider in &self.providers {
            visit(self, provider.name(), &mut done, &mut in_progress)?;
        }
        Ok(())
    }

    /// Resolve a possibly unqualified attribute name.
    pub fn resolve(&self, name: &str) -> Result<Attribute> {
        if let Some((plugin, attr)) = name.split_once('.') {
            let attribute = Attribute::new(plugin, attr);
            if !self.by_name.contains_key(plugin) {
                return Err(Error::Attribute(format!("no such plugin {plugin:?}")));
            }
            if !self.attributes.contains_key(&attribute) {
                return Err(Error::Attribute(format!(
                    "plugin {plugin:?} has no attribute {attr:?}"
                )));
            }
            return Ok(attribute);
        }

        let file_attribute = Attribute::new("file", name);
        if self.attributes.contains_key(&file_attribute) {
            return Ok(file_attribute);
        }

        let mut candidates: Vec<&str> = self
            .attributes
            .keys()
            .filter(|a| a.name == name)
            .map(|a| a.plugin.as_str())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        match candidates.len() {
            0 => Err(Error::Attribute(format!(
                "no plugin found for attribute {name:?}"
            ))),
            1 => Ok(Attribute::new(candidates[0], name)),
            _ => Err(Error::Attribute(format!(
                "attribute {name:?} is ambiguous (choose between {})",
                candidates
                    .iter()
                    .map(|p| format!("{p}.{name}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    pub fn info(&self, attribute: &Attribute) -> Option<AttrMeta> {
        self.attributes.get(attribute).copied()
    }

    pub fn provider_of(&self, attribute: &Attribute) -> Option<&Arc<dyn Provider>> {
        let meta = self.attributes.get(attribute)?;
        self.providers.get(meta.provider)
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.by_name.get(name).map(|&i| &self.providers[i])
    }

    /// All providers, the `file` provider first.
    pub fn providers(&self) -> Vec<&Arc<dyn Provider>> {
        let mut list: Vec<_> = self.providers.iter().collect();
        list.sort_by_key(|p| if p.name() == "file" { "" } else { p.name() });
        list
    }

    /// All attributes sorted with the `file` provider first, for the
    /// help listings.
    pub fn iter_attributes(&self) -> Vec<(Attribute, AttrMeta)> {
        let mut list: Vec<_> = self
            .attributes
            .iter()
            .map(|(a, m)| (a.clone(), *m))
            .collect();
        list.sort_by(|(a, _), (b, _)| {
            let ka = if a.plugin == "file" { "" } else { a.plugin.as_str() };
            let kb = if b.plugin == "file" { "" } else { b.plugin.as_str() };
            (ka, a.name.as_str()).cmp(&(kb, b.name.as_str()))
        });
        list
    }

    /// The attribute names of the `file` provider, for `-o file`.
    pub fn file_attributes(&self) -> Vec<String> {
        self.iter_attributes()
            .into_iter()
            .filter(|(a, _)| a.plugin == "file")
            .map(|(a, _)| a.name)
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        name: &'static str,
        deps: &'static [&'static str],
        attrs: &'static [AttrInfo],
    }

    impl Provider for Dummy {
        fn name(&self) -> &'static str {
            self.name
        }
        fn depends_on(&self) -> &'static [&'static str] {
            self.deps
        }
        fn attributes(&self) -> &'static [AttrInfo] {
            self.attrs
        }
        fn process(&self, _: &Entry, _: &mut ProviderOutput) -> std::result::Result<(), String> {
            Ok(())
        }
    }

    const WIDTH: &[AttrInfo] = &[AttrInfo {
        name: "width",
        kind: ValueKind::Number,
        cost: 3,
        cacheable: true,
        help: "image width",
    }];

    #[test]
    fn test_resolution_order() {
        let registry = Registry::with_builtins().unwrap();

        // Qualified names resolve exactly.
        let attr = registry.resolve("file.size").unwrap();
        assert_eq!(attr, Attribute::new("file", "size"));

        // Unqualified file attributes resolve to the file plugin.
        let attr = registry.resolve("size").unwrap();
        assert_eq!(attr.plugin, "file");

        // `ignored` is only declared by the ignore plugin.
        let attr = registry.resolve("ignored").unwrap();
        assert_eq!(attr, Attribute::new("ignore", "ignored"));

        assert!(registry.resolve("no_such_thing").is_err());
        assert!(registry.resolve("noplugin.size").is_err());
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut registry = Registry::with_builtins().unwrap();
        let dup = Arc::new(Dummy { name: "file", deps: &[], attrs: &[] });
        assert!(registry.register(dup).is_err());
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Dummy { name: "a", deps: &["b"], attrs: &[] }))
            .unwrap();
        registry
            .register(Arc::new(Dummy { name: "b", deps: &["a"], attrs: WIDTH }))
            .unwrap();
        let err = registry.validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EX_BAD_PLUGIN);
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let mut registry = Registry::new();
        registry
            .register(Arc::new(Dummy { name: "a", deps: &["missing"], attrs: &[] }))
            .unwrap();
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_file_shadows_other_providers() {
        let mut registry = Registry::with_builtins().unwrap();
        registry
            .register(Arc::new(Dummy {
                name: "media",
                deps: &[],
                attrs: &[AttrInfo {
                    name: "size",
                    kind: ValueKind::Number,
                    cost: 3,
                    cacheable: true,
                    help: "frame size",
                }],
            }))
            .unwrap();
        // Unqualified `size` still resolves to the file plugin.
        assert_eq!(registry.resolve("size").unwrap().plugin, "file");
        assert_eq!(registry.resolve("media.size").unwrap().plugin, "media");
    }
}
