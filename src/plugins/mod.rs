//! Built-in attribute providers
//!
//! - `file`: all essential stat-derived attributes
//! - `ignore`: whether an entry matches gitignore-style patterns

pub mod file;
pub mod ignore;

use std::sync::Arc;

use crate::registry::Provider;

/// The providers that are always available.
pub fn builtins() -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(file::FileProvider),
        Arc::new(ignore::IgnoreProvider),
    ]
}
