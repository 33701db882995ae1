//! ff - a parallel filesystem search engine
//!
//! Walks one or more directory trees with a pool of worker threads,
//! evaluates a typed boolean expression over per-entry attributes and
//! emits matching entries as plain records, JSON, statistics or as
//! arguments to external commands.
//!
//! # Architecture
//!
//! ```text
//!   tests / directories            ┌───────────────┐
//!        │                         │   Registry    │
//!        ▼                         │ file, ignore, │
//!   ┌──────────┐   bind against    │ user plugins  │
//!   │  Parser  │──────────────────►└───────┬───────┘
//!   └────┬─────┘                           │
//!        ▼                                 ▼
//!   ┌──────────┐    entries     ┌─────────────────────┐
//!   │  Walker  │───────────────►│ Evaluator + Context │◄──► Cache (sqlite)
//!   │ (N workers, work stealing)└──────────┬──────────┘
//!   └──────────┘                           │ matches
//!                                          ▼
//!                               ┌─────────────────────┐
//!                               │        Sink         │
//!                               │ records, json,      │
//!                               │ count, exec         │
//!                               └─────────────────────┘
//! ```
//!
//! The expression language is a list of tests like `size+=100M` or
//! `name%*.rs`, combined with `and`, `or`, `not` and parentheses.
//! Attributes are provided by plugins, resolved at bind time, and
//! computed lazily per entry with memoization; expensive values are
//! additionally cached across runs keyed by (path, mtime, size).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clap::Parser;
//!
//! let args = ff::CliArgs::parse_from(["ff", "type=f", "size+=1M"]);
//! let config = ff::Config::from_args(args).unwrap();
//! let registry = Arc::new(ff::Registry::with_builtins().unwrap());
//! for ctx in ff::Search::start(config, registry).unwrap().results() {
//!     println!("{}", ctx.entry.path);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod eval;
pub mod expr;
pub mod help;
pub mod ignore;
pub mod output;
pub mod plugins;
pub mod registry;
pub mod search;
pub mod types;
pub mod walk;

pub use cache::MetaCache;
pub use config::{CliArgs, Config};
pub use context::EntryContext;
pub use entry::Entry;
pub use error::{Error, Result};
pub use registry::{AttrInfo, Attribute, Provider, Registry};
pub use search::Search;
pub use types::{Value, ValueKind};
pub use walk::Counters;
