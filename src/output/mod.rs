//! Output stage
//!
//! Exactly one sink runs per invocation: plain records, JSON (array
//! or line-delimited), `--count` statistics, or external commands.
//! Sinks either stream entries as the workers produce them or, when
//! `--sort`, `--limit`, `--exec-batch` or `--json` require the
//! complete result set, collect to the end first.

pub mod color;
pub mod count;
pub mod exec;
pub mod records;

use std::io::Write;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use regex::Regex;

use crate::config::{Config, JsonMode};
use crate::context::EntryContext;
use crate::error::{Error, Result};
use crate::registry::{Attribute, Registry};
use crate::types::{Modifier, SortKey, ValueKind};
use crate::walk::Counters;

/// One attribute in an output, sort, count or exec template list,
/// e.g. `size:h`. The raw spelling (without the modifier) is the
/// record key in JSON output.
#[derive(Debug, Clone)]
pub struct Field {
    pub raw: String,
    pub attribute: Attribute,
    pub kind: ValueKind,
    pub modifier: Option<Modifier>,
}

fn field_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^((?:\w+\.)?\w+)(?::(-?\d+)?([hoxnv])?)?$").unwrap())
}

/// Parse and resolve one field specification.
pub fn parse_field(registry: &Registry, input: &str) -> Result<Field> {
    let caps = field_regex()
        .captures(input.trim())
        .ok_or_else(|| Error::Usage(format!("invalid attribute {input:?}")))?;

    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
    let modifier = caps
        .get(3)
        .and_then(|m| m.as_str().chars().next())
        .and_then(Modifier::parse);

    let attribute = registry.resolve(&raw)?;
    let kind = registry
        .info(&attribute)
        .expect("resolved attribute must have metadata")
        .kind;

    Ok(Field {
        raw,
        attribute,
        kind,
        modifier,
    })
}

/// Resolve an `-o`/`-S` style list; the special name `file` expands
/// to all attributes of the file plugin.
pub fn parse_fields(registry: &Registry, names: &[String]) -> Result<Vec<Field>> {
    let mut fields = Vec::new();
    for name in names {
        if name == "file" {
            for attr in registry.file_attributes() {
                fields.push(parse_field(registry, &attr)?);
            }
        } else {
            fields.push(parse_field(registry, name)?);
        }
    }
    Ok(fields)
}

/// Render a field for one entry. `None` means the value is missing.
pub fn render_field(ctx: &mut EntryContext, field: &Field, si: bool) -> Option<String> {
    let value = ctx.get(&field.attribute)?;
    Some(field.kind.format(&value, field.modifier, si))
}

/// Consume the walker output and produce the configured output form.
pub fn run(
    config: &Config,
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    rx: Receiver<EntryContext>,
    handles: Vec<JoinHandle<()>>,
) -> Result<()> {
    let result = dispatch(config, &registry, &counters, rx);

    for handle in handles {
        if handle.join().is_err() {
            counters.internal_error.store(true, Ordering::SeqCst);
        }
    }

    result
}

fn dispatch(
    config: &Config,
    registry: &Arc<Registry>,
    counters: &Arc<Counters>,
    rx: Receiver<EntryContext>,
) -> Result<()> {
    if let Some(count_attrs) = &config.count {
        let mut sink = count::CountSink::new(registry, count_attrs, config)?;
        for mut ctx in rx.iter() {
            if counters.is_stopping() {
                break;
            }
            sink.add(&mut ctx);
        }
        return sink.finish();
    }

    if config.exec.is_some() || config.exec_batch.is_some() {
        return run_exec(config, registry, counters, rx);
    }

    let fields = parse_fields(registry, &config.output)?;
    let collective =
        config.sort.is_some() || config.limit.is_some() || config.json == JsonMode::Json;

    if !collective {
        return stream(config, counters, rx, &fields);
    }

    let mut contexts = collect(config, counters, rx);
    if let Some(sort_attrs) = &config.sort {
        contexts = sort_contexts(registry, contexts, sort_attrs, config.reverse)?;
    }
    contexts = apply_limit(config, contexts);

    match config.json {
        JsonMode::Json => {
            let mut out = std::io::stdout().lock();
            let mut first = true;
            if write_or_stop(counters, &mut out, b"[").is_err() {
                return Ok(());
            }
            for mut ctx in contexts {
                let record = json_record(&mut ctx, &fields);
                let mut line = Vec::new();
                if !first {
                    line.push(b',');
                }
                first = false;
                line.extend_from_slice(record.to_string().as_bytes());
                if write_or_stop(counters, &mut out, &line).is_err() {
                    return Ok(());
                }
            }
            let _ = write_or_stop(counters, &mut out, b"]\n");
            Ok(())
        }
        JsonMode::Jsonl => {
            let mut out = std::io::stdout().lock();
            for mut ctx in contexts {
                let record = json_record(&mut ctx, &fields);
                let line = format!("{record}\n");
                if write_or_stop(counters, &mut out, line.as_bytes()).is_err() {
                    return Ok(());
                }
            }
            Ok(())
        }
        JsonMode::Off => {
            let writer = records::RecordWriter::new(config, fields);
            let mut out = std::io::stdout().lock();
            for mut ctx in contexts {
                if writer.write(&mut ctx, &mut out, counters).is_err() {
                    return Ok(());
                }
            }
            Ok(())
        }
    }
}

/// Stream entries as they arrive, in nondeterministic order.
fn stream(
    config: &Config,
    counters: &Arc<Counters>,
    rx: Receiver<EntryContext>,
    fields: &[Field],
) -> Result<()> {
    let mut out = std::io::stdout().lock();

    match config.json {
        JsonMode::Jsonl => {
            for mut ctx in rx.iter() {
                if counters.is_stopping() {
                    break;
                }
                let record = json_record(&mut ctx, fields);
                let line = format!("{record}\n");
                if write_or_stop(counters, &mut out, line.as_bytes()).is_err() {
                    break;
                }
                let _ = out.flush();
            }
        }
        _ => {
            let writer = records::RecordWriter::new(config, fields.to_vec());
            for mut ctx in rx.iter() {
                if counters.is_stopping() {
                    break;
                }
                if writer.write(&mut ctx, &mut out, counters).is_err() {
                    break;
                }
            }
        }
    }
    let _ = out.flush();
    Ok(())
}

fn run_exec(
    config: &Config,
    registry: &Arc<Registry>,
    counters: &Arc<Counters>,
    rx: Receiver<EntryContext>,
) -> Result<()> {
    if let Some(argv) = &config.exec {
        let template = exec::ExecTemplate::parse(registry, argv, false)?;
        let collective = config.sort.is_some() || config.limit.is_some();

        let pool = exec::ExecPool::new(config.jobs, counters.clone(), config.halt);
        if !collective {
            for mut ctx in rx.iter() {
                if counters.is_stopping() && config.halt != crate::config::HaltMode::Never {
                    break;
                }
                if let Some(argv) = template.render(&mut ctx, config.all, config.si) {
                    pool.dispatch(argv);
                }
            }
        } else {
            let mut contexts = collect(config, counters, rx);
            if let Some(sort_attrs) = &config.sort {
                contexts = sort_contexts(registry, contexts, sort_attrs, config.reverse)?;
            }
            // Stream to the pool as soon as the sort is complete.
            for mut ctx in apply_limit(config, contexts) {
                if counters.is_stopping() && config.halt != crate::config::HaltMode::Never {
                    break;
                }
                if let Some(argv) = template.render(&mut ctx, config.all, config.si) {
                    pool.dispatch(argv);
                }
            }
        }
        pool.close();
        return Ok(());
    }

    // --exec-batch: one final process over the whole result set.
    let argv = config.exec_batch.as_ref().expect("checked by caller");
    let template = exec::ExecTemplate::parse(registry, argv, true)?;

    let mut contexts = collect(config, counters, rx);
    if let Some(sort_attrs) = &config.sort {
        contexts = sort_contexts(registry, contexts, sort_attrs, config.reverse)?;
    }
    let contexts = apply_limit(config, contexts);
    if contexts.is_empty() {
        return Ok(());
    }
    let argv = template.render_batch(contexts, config.all, config.si);
    exec::run_single(&argv, counters);
    Ok(())
}

/// Collect the stream, stopping early when an unsorted limit is
/// already satisfied.
fn collect(config: &Config, counters: &Arc<Counters>, rx: Receiver<EntryContext>) -> Vec<EntryContext> {
    let bound = if config.sort.is_none() {
        config.limit.and_then(|slice| slice.upper_bound())
    } else {
        None
    };

    let mut contexts = Vec::new();
    for ctx in rx.iter() {
        if counters.is_stopping() {
            break;
        }
        contexts.push(ctx);
        if let Some(bound) = bound {
            if contexts.len() >= bound {
                counters.stop();
                break;
            }
        }
    }
    contexts
}

/// Order collected contexts by the sort-key lists of the given
/// attributes. Stable; `reverse` flips the result.
pub fn sort_contexts(
    registry: &Arc<Registry>,
    contexts: Vec<EntryContext>,
    sort_attrs: &[String],
    reverse: bool,
) -> Result<Vec<EntryContext>> {
    let fields = parse_fields(registry, sort_attrs)?;

    let mut keyed: Vec<(Vec<SortKey>, EntryContext)> = contexts
        .into_iter()
        .map(|mut ctx| {
            let key = fields
                .iter()
                .map(|field| match ctx.get(&field.attribute) {
                    Some(value) => field
                        .kind
                        .sort_key(&value, field.modifier == Some(Modifier::Version)),
                    None => field.kind.sort_missing(),
                })
                .collect();
            (key, ctx)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    if reverse {
        keyed.reverse();
    }
    Ok(keyed.into_iter().map(|(_, ctx)| ctx).collect())
}

/// Apply the `-l` slice to the collected result list.
pub fn apply_limit(config: &Config, mut contexts: Vec<EntryContext>) -> Vec<EntryContext> {
    let Some(slice) = config.limit else {
        return contexts;
    };
    let (start, stop) = slice.resolve(contexts.len());
    contexts.truncate(stop);
    contexts.drain(..start.min(contexts.len()));
    contexts
}

/// One JSON object for an entry: keys are the field spellings,
/// missing attributes become null.
pub fn json_record(ctx: &mut EntryContext, fields: &[Field]) -> serde_json::Value {
    let mut record = serde_json::Map::new();
    for field in fields {
        let value = match ctx.get(&field.attribute) {
            Some(value) => field.kind.to_json(&value),
            None => serde_json::Value::Null,
        };
        record.insert(field.raw.clone(), value);
    }
    serde_json::Value::Object(record)
}

/// Write bytes; a broken pipe sets the stop flag and reports `Err`
/// without being an error.
fn write_or_stop(
    counters: &Arc<Counters>,
    out: &mut impl Write,
    bytes: &[u8],
) -> std::result::Result<(), ()> {
    match out.write_all(bytes) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                tracing::warn!("write error: {err}");
            }
            counters.stop();
            Err(())
        }
    }
}
