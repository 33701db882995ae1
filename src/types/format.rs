//! Output formatters for attribute values

use chrono::{Local, TimeZone};

use super::{Modifier, Value, ValueKind};

/// Render a value for the screen, honoring the field modifier.
pub fn format_value(kind: ValueKind, value: &Value, modifier: Option<Modifier>, si: bool) -> String {
    match (value, modifier) {
        (Value::Size(n), Some(Modifier::Human)) => {
            format_size(*n, if si { 1000 } else { 1024 })
        }
        (Value::Time(t), Some(Modifier::Human)) => format_time(*t),
        (Value::Duration(d), Some(Modifier::Human)) => format_duration(*d),
        (Value::Mode(m), Some(Modifier::Human)) => filemode(*m),
        (Value::Mode(m), Some(Modifier::Octal)) => format!("{m:o}"),
        (Value::Mode(m), Some(Modifier::Hex)) => format!("{m:x}"),
        (Value::Number(n), Some(Modifier::Octal))
        | (Value::Size(n), Some(Modifier::Octal))
        | (Value::Duration(n), Some(Modifier::Octal)) => format!("{n:o}"),
        (Value::Number(n), Some(Modifier::Hex))
        | (Value::Size(n), Some(Modifier::Hex))
        | (Value::Duration(n), Some(Modifier::Hex)) => format!("{n:x}"),
        _ => plain(kind, value),
    }
}

fn plain(_kind: ValueKind, value: &Value) -> String {
    match value {
        Value::Text(s) | Value::Path(s) => s.clone(),
        Value::Number(n) | Value::Size(n) | Value::Duration(n) => n.to_string(),
        Value::Time(t) => t.to_string(),
        Value::Mode(m) => m.to_string(),
        Value::FileType(k) => k.as_str().to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::List(items) => items.join(","),
    }
}

/// Human readable file size, e.g. `4.0K` or `12M`. With base 1000 the
/// unit gets a `B` suffix (`4.0KB`).
pub fn format_size(number: u64, base: u64) -> String {
    if number < base {
        return number.to_string();
    }

    let mut value = number as f64;
    let mut unit = "";
    for u in ["K", "M", "G", "T", "P", "E", "Z", "Y"] {
        if value < base as f64 {
            break;
        }
        value /= base as f64;
        value = (value * 10.0).round() / 10.0;
        unit = u;
    }

    let suffix = if base == 1000 {
        format!("{unit}B")
    } else {
        unit.to_string()
    };
    if value < 10.0 {
        format!("{value:.1}{suffix}")
    } else {
        format!("{}{suffix}", value as u64)
    }
}

/// Format a duration in seconds as `1h30m0s` or `5m10s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else {
        format!("{minutes}m{seconds}s")
    }
}

/// Format an epoch timestamp as a local date and time.
pub fn format_time(seconds: i64) -> String {
    match Local.timestamp_opt(seconds, 0).earliest() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => seconds.to_string(),
    }
}

const S_IFMT: u32 = 0o170000;

/// Render a mode like `ls -l`, e.g. `-rw-r--r--` or `drwxr-x---`.
pub fn filemode(mode: u32) -> String {
    let kind = match mode & S_IFMT {
        0o040000 => 'd',
        0o100000 => '-',
        0o120000 => 'l',
        0o140000 => 's',
        0o010000 => 'p',
        0o020000 => 'c',
        0o060000 => 'b',
        0 => '-',
        _ => '?',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for (shift, setid) in [(6, mode & 0o4000 != 0), (3, mode & 0o2000 != 0)] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(match (bits & 0o1 != 0, setid) {
            (true, true) => 's',
            (false, true) => 'S',
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    let bits = mode & 0o7;
    let sticky = mode & 0o1000 != 0;
    out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
    out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
    out.push(match (bits & 0o1 != 0, sticky) {
        (true, true) => 't',
        (false, true) => 'T',
        (true, false) => 'x',
        (false, false) => '-',
    });
    out
}
