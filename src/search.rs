//! Search assembly
//!
//! Wires the configuration, registry, cache, evaluators and walker
//! together. This is also the programmatic entry point: library users
//! build a [`Config`], call [`Search::start`] and iterate the
//! matching entry contexts.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::cache::MetaCache;
use crate::config::Config;
use crate::context::EntryContext;
use crate::error::{Error, Result};
use crate::eval::{Binder, Excluder, Matcher};
use crate::expr;
use crate::registry::Registry;
use crate::types::Operator;
use crate::walk::{Counters, Walker};

pub struct Search {
    pub config: Config,
    pub registry: Arc<Registry>,
    pub cache: Option<Arc<MetaCache>>,
    pub counters: Arc<Counters>,
    rx: Receiver<EntryContext>,
    handles: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search").finish_non_exhaustive()
    }
}

impl Search {
    /// Parse and bind the expressions, open the cache and launch the
    /// walker. Fails fast on any expression or setup error.
    pub fn start(config: Config, registry: Arc<Registry>) -> Result<Search> {
        let cache = match &config.cache_path {
            Some(path) => Some(Arc::new(MetaCache::open(path)?)),
            None => None,
        };

        let binder = Binder::new(
            registry.clone(),
            cache.clone(),
            config.case,
            config.si,
            config.follow_symlinks,
        );

        // A bare token is a regex on the basename.
        let tree = expr::parse(&config.tokens, Some(("name", Operator::Matches)))
            .map_err(Error::TestSyntax)?;
        let matcher = Arc::new(Matcher::new(&binder, &tree)?);
        let excluder = Arc::new(Excluder::new(&binder, &config.exclude_tokens)?);

        let counters = Arc::new(Counters::default());
        let walker = Walker::new(
            config.clone(),
            registry.clone(),
            cache.clone(),
            matcher,
            excluder,
            counters.clone(),
        );
        let (rx, handles) = walker.start()?;

        Ok(Search {
            config,
            registry,
            cache,
            counters,
            rx,
            handles,
        })
    }

    /// Hand the raw stream and worker handles to a sink.
    pub fn into_parts(self) -> (Receiver<EntryContext>, Vec<JoinHandle<()>>) {
        (self.rx, self.handles)
    }

    /// Iterate over matching entries, joining the workers when the
    /// stream is exhausted.
    pub fn results(self) -> Results {
        Results {
            rx: self.rx,
            handles: self.handles,
            cache: self.cache,
        }
    }
}

pub struct Results {
    rx: Receiver<EntryContext>,
    handles: Vec<JoinHandle<()>>,
    cache: Option<Arc<MetaCache>>,
}

impl Iterator for Results {
    type Item = EntryContext;

    fn next(&mut self) -> Option<EntryContext> {
        match self.rx.recv() {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                for handle in self.handles.drain(..) {
                    let _ = handle.join();
                }
                if let Some(cache) = &self.cache {
                    let (hits, misses) = cache.stats();
                    if hits + misses > 0 {
                        debug!("cache stats: {hits} hits, {misses} misses");
                    }
                }
                None
            }
        }
    }
}
