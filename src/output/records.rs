//! Plain record output
//!
//! One record per entry: every `-o` field formatted by its type,
//! joined with the separator. A missing value suppresses the whole
//! record unless `--all` is given or the field carries the `n`
//! modifier. Path fields are colorized dircolors-style when enabled.

use std::io::Write;
use std::sync::Arc;

use crate::config::{ColorMode, Config};
use crate::context::EntryContext;
use crate::walk::Counters;

use super::color::LsColors;
use super::{write_or_stop, Field};

pub struct RecordWriter {
    fields: Vec<Field>,
    separator: String,
    terminator: char,
    all: bool,
    si: bool,
    colors: Option<LsColors>,
}

impl RecordWriter {
    pub fn new(config: &Config, fields: Vec<Field>) -> RecordWriter {
        let colorize = match config.color {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                use std::io::IsTerminal;
                std::io::stdout().is_terminal()
            }
        };

        RecordWriter {
            fields,
            separator: config.separator.clone(),
            terminator: config.terminator,
            all: config.all,
            si: config.si,
            colors: colorize.then(LsColors::from_env),
        }
    }

    /// Write one record. `Err` means output is gone (broken pipe) and
    /// the caller should stop.
    pub fn write(
        &self,
        ctx: &mut EntryContext,
        out: &mut impl Write,
        counters: &Arc<Counters>,
    ) -> std::result::Result<(), ()> {
        let mut parts = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            match ctx.get(&field.attribute) {
                Some(value) => {
                    let text = field.kind.format(&value, field.modifier, self.si);
                    parts.push(self.paint(ctx, field, text));
                }
                None => {
                    if self.all || field.modifier == Some(crate::types::Modifier::NullOk) {
                        parts.push(String::new());
                    } else {
                        // Null value: drop the record.
                        return Ok(());
                    }
                }
            }
        }

        let mut line = parts.join(&self.separator);
        line.push(self.terminator);
        write_or_stop(counters, out, line.as_bytes())
    }

    fn paint(&self, ctx: &EntryContext, field: &Field, text: String) -> String {
        let Some(colors) = &self.colors else {
            return text;
        };
        if field.attribute.plugin != "file" {
            return text;
        }
        match field.attribute.name.as_str() {
            "path" | "relpath" => colors.paint_path(&text, &ctx.entry),
            "name" | "namex" => colors.paint_name(&text, &ctx.entry),
            "dir" => colors.paint_dir(&text),
            _ => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliArgs, Config};
    use crate::entry::{Entry, StartPoint};
    use crate::ignore::IgnoreStack;
    use crate::output::parse_fields;
    use crate::registry::Registry;
    use clap::Parser;

    fn record_for(args: &[&str], dir: &std::path::Path, relpath: &str) -> Option<String> {
        let mut argv = vec!["ff"];
        argv.extend(args);
        let config = Config::from_args(CliArgs::parse_from(argv)).unwrap();

        let registry = Arc::new(Registry::with_builtins().unwrap());
        let fields = parse_fields(&registry, &config.output).unwrap();
        let writer = RecordWriter::new(&config, fields);

        let start = Arc::new(StartPoint::new(dir.to_str().unwrap(), false).unwrap());
        let metadata = std::fs::symlink_metadata(dir.join(relpath)).unwrap();
        let entry = Entry::new(start, relpath.to_string(), metadata, IgnoreStack::new());
        let mut ctx = EntryContext::new(entry, registry, None);

        let counters = Arc::new(Counters::default());
        let mut buf = Vec::new();
        writer.write(&mut ctx, &mut buf, &counters).unwrap();
        if buf.is_empty() {
            None
        } else {
            Some(String::from_utf8(buf).unwrap())
        }
    }

    #[test]
    fn test_multi_field_record() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("hello.rs")).unwrap();
        f.write_all(b"fn main() {}").unwrap();
        drop(f);

        let line = record_for(&["-o", "name,size,type"], dir.path(), "hello.rs").unwrap();
        assert_eq!(line, "hello.rs 12 file\n");
    }

    #[test]
    fn test_missing_value_suppresses_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("plain")).unwrap();

        // `link` is missing on a regular file.
        assert_eq!(record_for(&["-o", "name,link"], dir.path(), "plain"), None);
        // ...unless --all or the `n` modifier allows it.
        assert_eq!(
            record_for(&["-o", "name,link", "--all"], dir.path(), "plain").unwrap(),
            "plain \n"
        );
        assert_eq!(
            record_for(&["-o", "name,link:n"], dir.path(), "plain").unwrap(),
            "plain \n"
        );
    }

    #[test]
    fn test_custom_separator_and_terminator() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("x")).unwrap();

        let line = record_for(&["-o", "name,size", "--sep", "|", "-0"], dir.path(), "x").unwrap();
        assert_eq!(line, "x|0\0");
    }
}
