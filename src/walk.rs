//! Parallel directory walker
//!
//! A pool of worker threads shares directory work through a
//! work-stealing deque: each worker drains its own queue depth-first
//! and steals from the injector or from siblings when it runs dry.
//! This keeps traversal breadth-first across the pool but local
//! within a worker, which gives good locality and a bounded queue.
//!
//! ```text
//! Directory queue (crossbeam deque, work stealing)
//! │
//! ├── Worker 0: pop dir → readdir/stat → exclude → match → push subdirs
//! ├── Worker 1: pop dir → readdir/stat → exclude → match → push subdirs
//! └── Worker N: ...
//! │
//! └── Sink (main thread): recv matching contexts → format/collect/exec
//! ```
//!
//! Per-entry read errors are logged at debug level and skipped; they
//! never terminate the walk.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use crossbeam_deque::{Injector, Steal, Stealer, Worker as DequeWorker};
use tracing::{debug, warn};

use crate::cache::MetaCache;
use crate::config::Config;
use crate::context::EntryContext;
use crate::entry::{Entry, StartPoint};
use crate::error::{Error, Result};
use crate::eval::{Excluder, Matcher};
use crate::ignore::{parent_ignore_files, IgnoreFile, IgnoreStack};
use crate::registry::Registry;

/// Shared run state, updated by the walker, the sink and the exec
/// pool.
#[derive(Debug, Default)]
pub struct Counters {
    pub matched: AtomicU64,
    pub errors: AtomicU64,
    pub subprocess_failed: AtomicBool,
    pub internal_error: AtomicBool,
    /// Cooperative stop flag: interrupt, halt policy or an early
    /// result limit.
    pub shutdown: AtomicBool,
}

impl Counters {
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// One directory to expand.
struct DirWork {
    start: Arc<StartPoint>,
    relpath: String,
    ignores: IgnoreStack,
}

struct Shared {
    config: Config,
    registry: Arc<Registry>,
    cache: Option<Arc<MetaCache>>,
    matcher: Arc<Matcher>,
    excluder: Arc<Excluder>,
    counters: Arc<Counters>,
    injector: Injector<DirWork>,
    stealers: Vec<Stealer<DirWork>>,
    pending_work: AtomicU64,
    active_workers: AtomicUsize,
    /// Whether ignore files are read during the walk at all.
    load_ignores: bool,
}

pub struct Walker {
    shared: Arc<Shared>,
    locals: Vec<DequeWorker<DirWork>>,
}

impl Walker {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        cache: Option<Arc<MetaCache>>,
        matcher: Arc<Matcher>,
        excluder: Arc<Excluder>,
        counters: Arc<Counters>,
    ) -> Walker {
        // Reading ignore files costs I/O per directory; only do it
        // when some test actually consults the ignore plugin.
        let load_ignores = matcher
            .plugins()
            .iter()
            .chain(excluder.plugins().iter())
            .any(|p| p == "ignore");

        let mut locals = Vec::new();
        let mut stealers = Vec::new();
        for _ in 0..config.jobs {
            let local = DequeWorker::new_fifo();
            stealers.push(local.stealer());
            locals.push(local);
        }

        Walker {
            shared: Arc::new(Shared {
                config,
                registry,
                cache,
                matcher,
                excluder,
                counters,
                injector: Injector::new(),
                stealers,
                pending_work: AtomicU64::new(0),
                active_workers: AtomicUsize::new(0),
                load_ignores,
            }),
            locals,
        }
    }

    /// Seed the queue with the start directories and launch the
    /// worker pool. Returns the stream of matching entry contexts.
    pub fn start(mut self) -> Result<(Receiver<EntryContext>, Vec<JoinHandle<()>>)> {
        let shared = Arc::clone(&self.shared);

        for directory in &shared.config.directories {
            let root = if shared.config.absolute {
                std::path::absolute(directory)?.to_string_lossy().into_owned()
            } else {
                directory.clone()
            };
            let start = StartPoint::new(&root, shared.config.follow_symlinks)
                .map_err(|e| Error::Usage(format!("cannot access {root:?}: {e}")))?;

            let mut ignores = IgnoreStack::new();
            if shared.load_ignores && !shared.config.no_parent_ignore {
                if let Some(parent) = start.absroot.parent() {
                    for (dirname, name) in
                        parent_ignore_files(parent, &shared.config.ignore_file_names)
                    {
                        match IgnoreFile::load(&dirname, &name) {
                            Ok(file) => ignores = ignores.push(Arc::new(file)),
                            Err(err) => warn!("{}: {err}", dirname.join(&name).display()),
                        }
                    }
                }
            }

            shared.pending_work.fetch_add(1, Ordering::SeqCst);
            shared.injector.push(DirWork {
                start: Arc::new(start),
                relpath: String::new(),
                ignores,
            });
        }

        let (tx, rx) = bounded::<EntryContext>(4096);
        let mut handles = Vec::new();
        for (id, local) in self.locals.drain(..).enumerate() {
            let shared = Arc::clone(&self.shared);
            let tx = tx.clone();
            let handle = thread::Builder::new()
                .name(format!("walker-{id}"))
                .spawn(move || worker_loop(id, local, shared, tx))
                .map_err(|e| Error::Walk(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }

        Ok((rx, handles))
    }
}

const MAX_IDLE_SPINS: u32 = 1000;

fn worker_loop(id: usize, local: DequeWorker<DirWork>, shared: Arc<Shared>, tx: Sender<EntryContext>) {
    debug!("worker {id} started");
    let mut idle_spins = 0u32;

    loop {
        if shared.counters.is_stopping() {
            break;
        }

        let work = local.pop().or_else(|| steal(&shared, id));

        let Some(work) = work else {
            idle_spins += 1;
            if shared.pending_work.load(Ordering::SeqCst) == 0
                && shared.active_workers.load(Ordering::SeqCst) == 0
            {
                break;
            }
            if idle_spins > MAX_IDLE_SPINS {
                thread::sleep(Duration::from_micros(100));
                idle_spins = 0;
            }
            continue;
        };

        idle_spins = 0;
        shared.active_workers.fetch_add(1, Ordering::SeqCst);
        process_directory(&shared, &local, &tx, &work);
        shared.pending_work.fetch_sub(1, Ordering::SeqCst);
        shared.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("worker {id} finished");
}

fn steal(shared: &Shared, id: usize) -> Option<DirWork> {
    loop {
        match shared.injector.steal() {
            Steal::Success(work) => return Some(work),
            Steal::Empty => break,
            Steal::Retry => continue,
        }
    }
    for (i, stealer) in shared.stealers.iter().enumerate() {
        if i == id {
            continue;
        }
        loop {
            match stealer.steal() {
                Steal::Success(work) => return Some(work),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }
    }
    None
}

fn join_rel(relpath: &str, name: &str) -> String {
    if relpath.is_empty() {
        name.to_string()
    } else {
        format!("{relpath}/{name}")
    }
}

fn process_directory(
    shared: &Shared,
    local: &DequeWorker<DirWork>,
    tx: &Sender<EntryContext>,
    work: &DirWork,
) {
    let dir_abs = work.start.absroot.join(&work.relpath);

    let read_dir = match std::fs::read_dir(&dir_abs) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            // Vanished or unreadable directories are skipped quietly.
            shared.counters.errors.fetch_add(1, Ordering::Relaxed);
            debug!("cannot read {}: {err}", dir_abs.display());
            return;
        }
    };

    let mut children: Vec<(String, std::fs::Metadata)> = Vec::new();
    for dirent in read_dir {
        let dirent = match dirent {
            Ok(dirent) => dirent,
            Err(err) => {
                shared.counters.errors.fetch_add(1, Ordering::Relaxed);
                debug!("readdir error in {}: {err}", dir_abs.display());
                continue;
            }
        };
        let name = dirent.file_name().to_string_lossy().into_owned();
        let metadata = if shared.config.follow_symlinks {
            // Fall back to the link itself when the target is gone.
            std::fs::metadata(dirent.path()).or_else(|_| dirent.metadata())
        } else {
            dirent.metadata()
        };
        match metadata {
            Ok(metadata) => children.push((name, metadata)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // The entry vanished between readdir and stat.
            }
            Err(err) => {
                shared.counters.errors.fetch_add(1, Ordering::Relaxed);
                debug!("cannot stat {}: {err}", dirent.path().display());
            }
        }
    }

    // Ignore files found here apply to every sibling and to the
    // subtrees below.
    let mut ignores = work.ignores.clone();
    if shared.load_ignores {
        for (name, _) in &children {
            if shared.config.ignore_file_names.iter().any(|n| n == name) {
                match IgnoreFile::load(&dir_abs, name) {
                    Ok(file) => {
                        debug!("found ignore file {}", file.path().display());
                        ignores = ignores.push(Arc::new(file));
                    }
                    Err(err) => warn!("{}: {err}", dir_abs.join(name).display()),
                }
            }
        }
    }

    for (name, metadata) in children {
        if shared.counters.is_stopping() {
            return;
        }

        let relpath = join_rel(&work.relpath, &name);
        let entry = Entry::new(
            Arc::clone(&work.start),
            relpath.clone(),
            metadata,
            ignores.clone(),
        );
        let is_dir = entry.is_dir();

        let mut ctx = EntryContext::new(entry, shared.registry.clone(), shared.cache.clone());

        // The exclusion prefilter prunes whole subtrees.
        if shared.excluder.matches(&mut ctx) {
            continue;
        }

        if is_dir {
            shared.pending_work.fetch_add(1, Ordering::SeqCst);
            local.push(DirWork {
                start: Arc::clone(&work.start),
                relpath,
                ignores: ignores.clone(),
            });
        }

        if shared.matcher.matches(&mut ctx) {
            shared.counters.matched.fetch_add(1, Ordering::Relaxed);
            if tx.send(ctx).is_err() {
                // The sink is gone; stop producing.
                shared.counters.stop();
                return;
            }
        }
    }
}
