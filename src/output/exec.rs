//! External command execution
//!
//! `-x cmd tpl...` runs the command once per result, fanned out over
//! the same number of threads as the walker. `-X cmd tpl...` runs a
//! single process with all results at once. Placeholders:
//!
//! | placeholder | expands to      |
//! |-------------|-----------------|
//! | `{}`        | `file.path`     |
//! | `{/}`       | `file.name`     |
//! | `{//}`      | `file.dir`      |
//! | `{.}`       | `file.pathx`    |
//! | `{/.}`      | `file.namex`    |
//! | `{..}`      | `file.ext`      |
//! | `{attr}`    | any attribute   |
//!
//! `{{` and `}}` are literal braces. A template without any
//! placeholder gets the full path appended as its last argument.
//!
//! A failing subprocess records exit code 3 and drives the `--halt`
//! policy; with `--halt now` in-flight children are killed.

use std::process::Command;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::HaltMode;
use crate::context::EntryContext;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::Modifier;
use crate::walk::Counters;

use super::{parse_field, Field};

#[derive(Debug, Clone)]
enum Seg {
    Lit(String),
    Field(Field),
}

/// A parsed command template.
pub struct ExecTemplate {
    args: Vec<Vec<Seg>>,
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{\{|\}\}|\{[^}]*\}").unwrap())
}

impl ExecTemplate {
    pub fn parse(registry: &Registry, argv: &[String], batch: bool) -> Result<ExecTemplate> {
        let mut args = Vec::new();
        for arg in argv {
            args.push(parse_arg(registry, arg)?);
        }

        // Without placeholders the path becomes the sole positional
        // argument.
        let has_placeholder = args
            .iter()
            .skip(1)
            .flatten()
            .any(|seg| matches!(seg, Seg::Field(_)));
        if !has_placeholder {
            args.push(vec![Seg::Field(parse_field(registry, "file.path")?)]);
        }

        if batch {
            let first_templated = args
                .first()
                .map(|arg| arg.iter().any(|seg| matches!(seg, Seg::Field(_))))
                .unwrap_or(false);
            if first_templated {
                return Err(Error::Usage(
                    "the command itself must not contain placeholders".to_string(),
                ));
            }
        }

        Ok(ExecTemplate { args })
    }

    /// Render the argument vector for one entry. `None` if a value is
    /// missing and neither `--all` nor the `n` modifier covers it;
    /// the command is skipped for that entry then.
    pub fn render(&self, ctx: &mut EntryContext, all: bool, si: bool) -> Option<Vec<String>> {
        let mut argv = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            argv.push(render_arg(arg, ctx, all, si)?);
        }
        Some(argv)
    }

    /// Render one batched argument vector over all entries: each
    /// templated argument repeats per entry, literal arguments stay
    /// single. Entries with missing values drop out of templated
    /// arguments silently.
    pub fn render_batch(&self, contexts: Vec<EntryContext>, all: bool, si: bool) -> Vec<String> {
        let mut contexts = contexts;
        let mut argv = Vec::new();

        for arg in &self.args {
            if arg.iter().any(|seg| matches!(seg, Seg::Field(_))) {
                for ctx in contexts.iter_mut() {
                    if let Some(rendered) = render_arg(arg, ctx, all, si) {
                        argv.push(rendered);
                    }
                }
            } else {
                argv.push(render_arg_literal(arg));
            }
        }
        argv
    }
}

fn parse_arg(registry: &Registry, arg: &str) -> Result<Vec<Seg>> {
    let mut segs = Vec::new();
    let mut last = 0;

    for m in placeholder_regex().find_iter(arg) {
        if m.start() > last {
            segs.push(Seg::Lit(arg[last..m.start()].to_string()));
        }
        let seg = match m.as_str() {
            "{{" => Seg::Lit("{".to_string()),
            "}}" => Seg::Lit("}".to_string()),
            "{}" => Seg::Field(parse_field(registry, "file.path")?),
            "{/}" => Seg::Field(parse_field(registry, "file.name")?),
            "{//}" => Seg::Field(parse_field(registry, "file.dir")?),
            "{.}" => Seg::Field(parse_field(registry, "file.pathx")?),
            "{/.}" => Seg::Field(parse_field(registry, "file.namex")?),
            "{..}" => Seg::Field(parse_field(registry, "file.ext")?),
            other => Seg::Field(parse_field(registry, &other[1..other.len() - 1])?),
        };
        segs.push(seg);
        last = m.end();
    }
    if last < arg.len() {
        segs.push(Seg::Lit(arg[last..].to_string()));
    }
    if segs.is_empty() {
        segs.push(Seg::Lit(String::new()));
    }
    Ok(segs)
}

fn render_arg(arg: &[Seg], ctx: &mut EntryContext, all: bool, si: bool) -> Option<String> {
    let mut out = String::new();
    for seg in arg {
        match seg {
            Seg::Lit(lit) => out.push_str(lit),
            Seg::Field(field) => match ctx.get(&field.attribute) {
                Some(value) => out.push_str(&field.kind.format(&value, field.modifier, si)),
                None if all || field.modifier == Some(Modifier::NullOk) => {}
                None => return None,
            },
        }
    }
    Some(out)
}

fn render_arg_literal(arg: &[Seg]) -> String {
    arg.iter()
        .map(|seg| match seg {
            Seg::Lit(lit) => lit.as_str(),
            Seg::Field(_) => "",
        })
        .collect()
}

/// A pool of threads each running one subprocess at a time.
pub struct ExecPool {
    tx: Option<Sender<Vec<String>>>,
    handles: Vec<JoinHandle<()>>,
}

impl ExecPool {
    pub fn new(jobs: usize, counters: Arc<Counters>, halt: HaltMode) -> ExecPool {
        let (tx, rx) = unbounded::<Vec<String>>();

        let mut handles = Vec::new();
        for id in 0..jobs {
            let rx = rx.clone();
            let counters = Arc::clone(&counters);
            let handle = std::thread::Builder::new()
                .name(format!("exec-{id}"))
                .spawn(move || {
                    while let Ok(argv) = rx.recv() {
                        if halt != HaltMode::Never && counters.is_stopping() {
                            // Halted: drain the queue without running.
                            continue;
                        }
                        run_child(&argv, &counters, halt);
                    }
                })
                .expect("failed to spawn exec thread");
            handles.push(handle);
        }

        ExecPool {
            tx: Some(tx),
            handles,
        }
    }

    pub fn dispatch(&self, argv: Vec<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(argv);
        }
    }

    /// Close the queue and wait for in-flight jobs.
    pub fn close(mut self) {
        self.tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_child(argv: &[String], counters: &Arc<Counters>, halt: HaltMode) {
    debug!("exec: {argv:?}");

    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);

    let failed = match halt {
        HaltMode::Now => {
            // Poll the child so it can be killed on shutdown.
            match command.spawn() {
                Ok(mut child) => loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break !status.success(),
                        Ok(None) => {
                            if counters.is_stopping() {
                                let _ = child.kill();
                                let _ = child.wait();
                                break true;
                            }
                            std::thread::sleep(Duration::from_millis(20));
                        }
                        Err(err) => {
                            warn!("wait for {:?} failed: {err}", argv[0]);
                            break true;
                        }
                    }
                },
                Err(err) => {
                    warn!("cannot run {:?}: {err}", argv[0]);
                    true
                }
            }
        }
        _ => match command.status() {
            Ok(status) => !status.success(),
            Err(err) => {
                warn!("cannot run {:?}: {err}", argv[0]);
                true
            }
        },
    };

    if failed {
        counters.subprocess_failed.store(true, Ordering::SeqCst);
        if halt != HaltMode::Never {
            counters.stop();
        }
    }
}

/// Run one command synchronously (for `-X`).
pub fn run_single(argv: &[String], counters: &Arc<Counters>) {
    if argv.is_empty() {
        return;
    }
    run_child(argv, counters, HaltMode::Never);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, StartPoint};
    use crate::ignore::IgnoreStack;

    fn context(dir: &std::path::Path, relpath: &str, registry: &Arc<Registry>) -> EntryContext {
        let start = Arc::new(StartPoint::new(dir.to_str().unwrap(), false).unwrap());
        let metadata = std::fs::symlink_metadata(dir.join(relpath)).unwrap();
        let entry = Entry::new(start.clone(), relpath.to_string(), metadata, IgnoreStack::new());
        EntryContext::new(entry, registry.clone(), None)
    }

    fn template(registry: &Registry, argv: &[&str], batch: bool) -> ExecTemplate {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        ExecTemplate::parse(registry, &argv, batch).unwrap()
    }

    #[test]
    fn test_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::File::create(dir.path().join("sub/pic.jpg")).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let mut ctx = context(dir.path(), "sub/pic.jpg", &registry);
        let path = ctx.entry.path.clone();
        let dirname = ctx.entry.dir.clone();

        let tpl = template(&registry, &["convert", "{}", "new-{/.}.png"], false);
        let argv = tpl.render(&mut ctx, false, false).unwrap();
        assert_eq!(argv, vec!["convert".to_string(), path, "new-pic.png".into()]);

        let tpl = template(&registry, &["echo", "{//}"], false);
        let argv = tpl.render(&mut ctx, false, false).unwrap();
        assert_eq!(argv, vec!["echo".to_string(), dirname]);
    }

    #[test]
    fn test_literal_braces() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("x")).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let mut ctx = context(dir.path(), "x", &registry);

        let tpl = template(&registry, &["echo", "{{}}-{/}"], false);
        let argv = tpl.render(&mut ctx, false, false).unwrap();
        assert_eq!(argv[1], "{}-x");
    }

    #[test]
    fn test_no_placeholder_appends_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("x")).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let mut ctx = context(dir.path(), "x", &registry);
        let path = ctx.entry.path.clone();

        let tpl = template(&registry, &["echo"], false);
        let argv = tpl.render(&mut ctx, false, false).unwrap();
        assert_eq!(argv, vec!["echo".to_string(), path]);
    }

    #[test]
    fn test_missing_value_skips_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("x")).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let mut ctx = context(dir.path(), "x", &registry);

        // `link` has no value on regular files.
        let tpl = template(&registry, &["echo", "{link}"], false);
        assert_eq!(tpl.render(&mut ctx, false, false), None);
        // With --all the argument renders empty instead.
        let argv = tpl.render(&mut ctx, true, false).unwrap();
        assert_eq!(argv[1], "");
    }

    #[test]
    fn test_batch_rejects_templated_command() {
        let registry = Registry::with_builtins().unwrap();
        let argv: Vec<String> = vec!["{}".into(), "-l".into()];
        assert!(ExecTemplate::parse(&registry, &argv, true).is_err());
    }

    #[test]
    fn test_batch_render_repeats_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("a")).unwrap();
        std::fs::File::create(dir.path().join("b")).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let ctxs = vec![
            context(dir.path(), "a", &registry),
            context(dir.path(), "b", &registry),
        ];

        let tpl = template(&registry, &["stat", "{/}"], true);
        let argv = tpl.render_batch(ctxs, false, false);
        assert_eq!(argv, vec!["stat".to_string(), "a".into(), "b".into()]);
    }
}
