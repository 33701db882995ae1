//! Per-entry attribute memoization
//!
//! An [`EntryContext`] owns one [`Entry`] plus a memo table of every
//! attribute value computed for it. Each value is computed at most
//! once per entry; provider errors are memoized as missing so that a
//! failing provider is not invoked again. The context is also what
//! the output stages and `{attribute}` exec placeholders consult.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CachedResult, MetaCache};
use crate::entry::Entry;
use crate::registry::{Attribute, ProviderOutput, Registry};
use crate::types::Value;

pub struct EntryContext {
    pub entry: Entry,
    registry: Arc<Registry>,
    cache: Option<Arc<MetaCache>>,
    memo: HashMap<Attribute, Option<Value>>,
    /// Providers whose process() already ran for this entry.
    processed: HashSet<String>,
}

impl EntryContext {
    pub fn new(entry: Entry, registry: Arc<Registry>, cache: Option<Arc<MetaCache>>) -> EntryContext {
        EntryContext {
            entry,
            registry,
            cache,
            memo: HashMap::new(),
            processed: HashSet::new(),
        }
    }

    /// Get the value of an attribute for this entry, computing and
    /// memoizing it on first access. `None` means the entry has no
    /// value for the attribute; tests against it evaluate false.
    pub fn get(&mut self, attribute: &Attribute) -> Option<Value> {
        if let Some(value) = self.memo.get(attribute) {
            return value.clone();
        }

        let Some(meta) = self.registry.info(attribute) else {
            return None;
        };

        if meta.cacheable {
            if let Some(cache) = self.cache.clone() {
                let key = self.entry.abspath.to_string_lossy().into_owned();
                let name = attribute.to_string();
                if let Some(result) =
                    cache.get(&key, &name, self.entry.mtime_ns(), self.entry.size())
                {
                    let value = match result {
                        CachedResult::Value(value) => Some(value),
                        CachedResult::Missing => None,
                    };
                    self.memo.insert(attribute.clone(), value.clone());
                    return value;
                }
            }
        }

        if attribute.plugin == "file" {
            // Shortcut: file attributes come straight from the Entry.
            let value = self.entry.attribute(&attribute.name);
            self.memo.insert(attribute.clone(), value.clone());
            self.write_through(attribute, &value);
            return value;
        }

        self.run_provider(&attribute.plugin);
        self.memo.get(attribute).cloned().flatten()
    }

    /// Run a provider once and memoize everything it produced. One
    /// call may amortize expensive work across several attributes.
    fn run_provider(&mut self, plugin: &str) {
        if !self.processed.insert(plugin.to_string()) {
            return;
        }

        let Some(provider) = self.registry.provider(plugin).cloned() else {
            return;
        };

        let mut out = ProviderOutput::new();
        if let Err(err) = provider.process(&self.entry, &mut out) {
            debug!("plugin {plugin:?} failed for {:?}: {err}", self.entry.path);
            out.clear();
        }

        for info in provider.attributes() {
            let attribute = Attribute::new(plugin, info.name);
            let value = out.remove(info.name);
            self.memo.insert(attribute.clone(), value.clone());
            if info.cacheable {
                self.write_through(&attribute, &value);
            }
        }
    }

    fn write_through(&self, attribute: &Attribute, value: &Option<Value>) {
        let Some(meta) = self.registry.info(attribute) else {
            return;
        };
        if !meta.cacheable {
            return;
        }
        if let Some(cache) = &self.cache {
            let result = match value {
                Some(value) => CachedResult::Value(value.clone()),
                None => CachedResult::Missing,
            };
            cache.put(
                &self.entry.abspath.to_string_lossy(),
                &attribute.to_string(),
                self.entry.mtime_ns(),
                self.entry.size(),
                &result,
            );
        }
    }
}
