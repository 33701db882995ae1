//! `--count` statistics
//!
//! Accumulates per-attribute statistics instead of printing records:
//! summable kinds (size, duration) add up to a total, everything else
//! tallies the occurrences of each distinct value. `_total` is always
//! the number of matches. Attributes of uncountable kinds (path,
//! time, string lists) are rejected up front.

use std::collections::BTreeMap;

use crate::config::{Config, JsonMode};
use crate::context::EntryContext;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::CountPolicy;

use super::{parse_fields, Field};

#[derive(Debug)]
enum Accumulator {
    Sum(u64),
    Tally(BTreeMap<String, u64>),
}

#[derive(Debug)]
pub struct CountSink {
    fields: Vec<(Field, Accumulator)>,
    total: u64,
    json: bool,
    si: bool,
}

impl CountSink {
    pub fn new(registry: &Registry, attrs: &[String], config: &Config) -> Result<CountSink> {
        let mut fields = Vec::new();
        for field in parse_fields(registry, attrs)? {
            let accumulator = match field.kind.count_policy() {
                CountPolicy::Sum => Accumulator::Sum(0),
                CountPolicy::Tally => Accumulator::Tally(BTreeMap::new()),
                CountPolicy::Uncountable => {
                    return Err(Error::Usage(format!(
                        "attribute {} is not suited for --count",
                        field.attribute
                    )))
                }
            };
            fields.push((field, accumulator));
        }
        Ok(CountSink {
            fields,
            total: 0,
            json: config.json != JsonMode::Off,
            si: config.si,
        })
    }

    pub fn add(&mut self, ctx: &mut EntryContext) {
        self.total += 1;

        for (field, accumulator) in &mut self.fields {
            let Some(value) = ctx.get(&field.attribute) else {
                continue;
            };
            match accumulator {
                Accumulator::Sum(sum) => {
                    if let Some(n) = match &value {
                        crate::types::Value::Size(n) | crate::types::Value::Duration(n) => Some(*n),
                        _ => None,
                    } {
                        *sum = sum.saturating_add(n);
                    }
                }
                Accumulator::Tally(tally) => {
                    let key = field.kind.format(&value, None, self.si);
                    *tally.entry(key).or_insert(0) += 1;
                }
            }
        }
    }

    pub fn finish(self) -> Result<()> {
        if self.json {
            self.print_json()
        } else {
            self.print_plain()
        }
    }

    fn print_plain(&self) -> Result<()> {
        use std::io::Write;
        let mut out = std::io::stdout().lock();

        for (field, accumulator) in &self.fields {
            match accumulator {
                Accumulator::Sum(sum) => {
                    let text = match field.modifier {
                        Some(_) => {
                            let value = match field.kind {
                                crate::types::ValueKind::Duration => {
                                    crate::types::Value::Duration(*sum)
                                }
                                _ => crate::types::Value::Size(*sum),
                            };
                            field.kind.format(&value, field.modifier, self.si)
                        }
                        None => sum.to_string(),
                    };
                    writeln!(out, "{}={}", field.raw, text)?;
                }
                Accumulator::Tally(tally) => {
                    for (key, count) in sorted_tally(tally) {
                        writeln!(out, "{}[{}]={}", field.raw, key, count)?;
                    }
                }
            }
        }
        writeln!(out, "_total={}", self.total)?;
        Ok(())
    }

    fn print_json(&self) -> Result<()> {
        use std::io::Write;

        let mut record = serde_json::Map::new();
        record.insert("_total".to_string(), self.total.into());
        for (field, accumulator) in &self.fields {
            let value = match accumulator {
                Accumulator::Sum(sum) => serde_json::Value::from(*sum),
                Accumulator::Tally(tally) => serde_json::Value::Object(
                    tally
                        .iter()
                        .map(|(key, count)| (key.clone(), serde_json::Value::from(*count)))
                        .collect(),
                ),
            };
            record.insert(field.raw.clone(), value);
        }

        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", serde_json::Value::Object(record))?;
        Ok(())
    }
}

/// Tally keys sort numerically when they look like numbers.
fn sorted_tally(tally: &BTreeMap<String, u64>) -> Vec<(&String, &u64)> {
    let mut items: Vec<_> = tally.iter().collect();
    items.sort_by(|(a, _), (b, _)| {
        match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        }
    });
    items
}
