//! The closed type system for attribute values
//!
//! Every attribute declares one of the [`ValueKind`] variants at
//! registration time, so unknown types cannot occur at runtime. A kind
//! bundles everything the rest of the system needs to know about its
//! values: the supported operators, how to parse a value from user
//! input, how to format it for output, how it takes part in `--count`
//! statistics and how to derive a sort key from it.

pub mod format;
pub mod parse;

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ignore::Glob;

/// Permission and special bits of a file mode.
pub const MODE_ALL: u32 = 0o7777;

/// The type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Directory,
    File,
    Symlink,
    Socket,
    Fifo,
    CharDevice,
    BlockDevice,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Directory => "directory",
            FileKind::File => "file",
            FileKind::Symlink => "symlink",
            FileKind::Socket => "socket",
            FileKind::Fifo => "fifo",
            FileKind::CharDevice => "char",
            FileKind::BlockDevice => "block",
            FileKind::Other => "other",
        }
    }

    /// Parse a user-supplied file type, accepting the single-letter
    /// aliases of find(1) and fd(1).
    pub fn parse(value: &str) -> Result<FileKind, String> {
        match value.to_lowercase().as_str() {
            "d" | "directory" => Ok(FileKind::Directory),
            "f" | "file" => Ok(FileKind::File),
            "l" | "symlink" => Ok(FileKind::Symlink),
            "s" | "socket" => Ok(FileKind::Socket),
            "p" | "pipe" | "fifo" => Ok(FileKind::Fifo),
            "char" => Ok(FileKind::CharDevice),
            "block" => Ok(FileKind::BlockDevice),
            "other" => Ok(FileKind::Other),
            other => Err(format!(
                "invalid file type {other:?}, allowed values are: \
                 block, char, d, directory, f, file, fifo, l, other, p, pipe, s, socket, symlink"
            )),
        }
    }
}

/// A single attribute value.
///
/// Each variant carries one concrete representation: time is integer
/// seconds since the epoch, size is bytes, mode is the raw st_mode
/// bits, duration is seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Path(String),
    Number(u64),
    Size(u64),
    Time(i64),
    Duration(u64),
    Mode(u32),
    FileType(FileKind),
    Boolean(bool),
    List(Vec<String>),
}

impl Value {
    /// The numeric magnitude for the ordered kinds.
    fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Number(n) | Value::Size(n) | Value::Duration(n) => Some(*n as i128),
            Value::Time(t) => Some(*t as i128),
            Value::Mode(m) => Some(*m as i128),
            Value::Boolean(b) => Some(*b as i128),
            _ => None,
        }
    }
}

/// The comparison operators of the expression language.
///
/// `>`, `<`, `>=` and `<=` are accepted as synonyms on the command
/// line and normalized to `+`, `-`, `+=` and `-=` by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=` equality
    Eq,
    /// `:` substring / subset
    Contains,
    /// `~` regular expression / any-of bits
    Matches,
    /// `%` glob match
    Glob,
    /// `+` greater than
    Gt,
    /// `-` less than
    Lt,
    /// `+=` greater or equal
    Ge,
    /// `-=` less or equal
    Le,
}

impl Operator {
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Contains => ":",
            Operator::Matches => "~",
            Operator::Glob => "%",
            Operator::Gt => "+",
            Operator::Lt => "-",
            Operator::Ge => "+=",
            Operator::Le => "-=",
        }
    }
}

/// Output and sort-key modifiers, e.g. `size:h` or `name:v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// `h` human readable
    Human,
    /// `o` octal
    Octal,
    /// `x` hexadecimal
    Hex,
    /// `n` treat a missing value as empty instead of dropping the record
    NullOk,
    /// `v` natural/version sort
    Version,
}

impl Modifier {
    pub fn parse(c: char) -> Option<Modifier> {
        match c {
            'h' => Some(Modifier::Human),
            'o' => Some(Modifier::Octal),
            'x' => Some(Modifier::Hex),
            'n' => Some(Modifier::NullOk),
            'v' => Some(Modifier::Version),
            _ => None,
        }
    }
}

/// How values of a kind are aggregated by `--count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Sum the values up to a total (size, duration).
    Sum,
    /// Count the occurrences of each distinct value.
    Tally,
    /// Reject the attribute for `--count`.
    Uncountable,
}

/// The metadata side of the type system, one variant per [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Text,
    Path,
    Number,
    Size,
    Time,
    Duration,
    Mode,
    FileType,
    Boolean,
    List,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Text => "string",
            ValueKind::Path => "path",
            ValueKind::Number => "number",
            ValueKind::Size => "size",
            ValueKind::Time => "time",
            ValueKind::Duration => "duration",
            ValueKind::Mode => "mode",
            ValueKind::FileType => "filetype",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "string[]",
        }
    }

    /// The operators this kind supports.
    pub fn operators(&self) -> &'static [Operator] {
        use Operator::*;
        match self {
            ValueKind::Text | ValueKind::Path | ValueKind::List => &[Eq, Contains, Matches, Glob],
            ValueKind::Number | ValueKind::Size | ValueKind::Time | ValueKind::Duration => {
                &[Eq, Gt, Lt, Ge, Le]
            }
            ValueKind::Mode => &[Eq, Contains, Matches],
            ValueKind::FileType | ValueKind::Boolean => &[Eq],
        }
    }

    pub fn supports(&self, op: Operator) -> bool {
        self.operators().contains(&op)
    }

    /// Whether values of this kind are compared as text, which makes
    /// them subject to case handling and regex/glob compilation.
    pub fn is_text(&self) -> bool {
        matches!(self, ValueKind::Text | ValueKind::Path | ValueKind::List)
    }

    pub fn count_policy(&self) -> CountPolicy {
        match self {
            ValueKind::Size | ValueKind::Duration => CountPolicy::Sum,
            ValueKind::Path | ValueKind::Time | ValueKind::List => CountPolicy::Uncountable,
            _ => CountPolicy::Tally,
        }
    }

    /// Two attributes can be compared through a file reference if they
    /// belong to the same family.
    pub fn comparable_with(&self, other: ValueKind) -> bool {
        if *self == other {
            return true;
        }
        let text = |k: ValueKind| matches!(k, ValueKind::Text | ValueKind::Path);
        let numeric = |k: ValueKind| {
            matches!(
                k,
                ValueKind::Number | ValueKind::Size | ValueKind::Time | ValueKind::Duration
            )
        };
        (text(*self) && text(other)) || (numeric(*self) && numeric(other))
    }

    /// Parse a user-supplied string into a value of this kind.
    pub fn parse(&self, input: &str, si: bool) -> Result<Value, String> {
        match self {
            ValueKind::Text => Ok(Value::Text(input.to_string())),
            ValueKind::Path => Ok(Value::Path(input.to_string())),
            // Test values for list attributes are single strings that
            // are matched against each element.
            ValueKind::List => Ok(Value::Text(input.to_string())),
            ValueKind::Number => input
                .parse::<u64>()
                .map(Value::Number)
                .map_err(|_| format!("unable to parse number {input:?}")),
            ValueKind::Size => parse::parse_size(input, si).map(Value::Size),
            ValueKind::Time => parse::parse_time(input).map(Value::Time),
            ValueKind::Duration => parse::parse_duration(input).map(Value::Duration),
            ValueKind::Mode => parse::parse_mode(input).map(Value::Mode),
            ValueKind::FileType => FileKind::parse(input).map(Value::FileType),
            ValueKind::Boolean => parse::parse_bool(input).map(Value::Boolean),
        }
    }

    /// Format a value for output. Only `h`, `o` and `x` have an effect
    /// here; `n` and `v` are handled by the sink and the sorter.
    pub fn format(&self, value: &Value, modifier: Option<Modifier>, si: bool) -> String {
        format::format_value(*self, value, modifier, si)
    }

    /// The JSON-native encoding of a value of this kind.
    pub fn to_json(&self, value: &Value) -> serde_json::Value {
        match value {
            Value::Text(s) | Value::Path(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) | Value::Size(n) | Value::Duration(n) => (*n).into(),
            Value::Time(t) => (*t).into(),
            Value::Mode(m) => (*m).into(),
            Value::FileType(k) => serde_json::Value::String(k.as_str().to_string()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().cloned().map(Into::into).collect())
            }
        }
    }

    /// Derive a sort key from a value.
    pub fn sort_key(&self, value: &Value, version: bool) -> SortKey {
        match value {
            Value::Text(s) => {
                let s = s.to_lowercase();
                if version {
                    natural_sort_key(&s)
                } else {
                    SortKey::Text(s)
                }
            }
            Value::Path(s) => {
                let s = s.to_lowercase();
                if version {
                    natural_sort_key(&s)
                } else {
                    // Ignore leading dots so hidden files sort next to
                    // their visible neighbors.
                    SortKey::Text(
                        s.split('/')
                            .map(|c| c.trim_start_matches('.'))
                            .collect::<Vec<_>>()
                            .join("/"),
                    )
                }
            }
            Value::FileType(k) => SortKey::Text(k.as_str().to_string()),
            Value::List(items) => SortKey::Text(items.join(",").to_lowercase()),
            other => SortKey::Number(other.as_i128().unwrap_or(0)),
        }
    }

    /// The fallback sort key when an entry is missing the attribute.
    pub fn sort_missing(&self) -> SortKey {
        match self {
            ValueKind::Text | ValueKind::Path | ValueKind::FileType | ValueKind::List => {
                SortKey::Text(String::new())
            }
            _ => SortKey::Number(0),
        }
    }
}

/// A comparison key derived from an attribute value.
///
/// Keys of different shapes have a stable relative order so that a
/// mixed column (e.g. from a `v` modifier) still sorts deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Number(i128),
    Text(String),
    List(Vec<SortKey>),
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use SortKey::*;
        match (self, other) {
            (Number(a), Number(b)) => a.cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Number(_), _) => Ordering::Less,
            (_, Number(_)) => Ordering::Greater,
            (Text(_), List(_)) => Ordering::Less,
            (List(_), Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split a path into a natural/version sort key: every component is
/// broken into alternating text and number tokens so that `foo2`
/// sorts before `foo10`.
pub fn natural_sort_key(path: &str) -> SortKey {
    let mut key = Vec::new();
    for component in path.split('/') {
        let mut tokens = Vec::new();
        let mut text = String::new();
        let mut digits = String::new();
        for c in component.chars() {
            if c.is_ascii_digit() {
                if !text.is_empty() || tokens.is_empty() {
                    tokens.push(SortKey::Text(std::mem::take(&mut text)));
                }
                digits.push(c);
            } else {
                if !digits.is_empty() {
                    tokens.push(SortKey::Number(digits.parse::<i128>().unwrap_or(0)));
                    digits.clear();
                }
                text.push(c);
            }
        }
        if !digits.is_empty() {
            if tokens.is_empty() {
                tokens.push(SortKey::Text(String::new()));
            }
            tokens.push(SortKey::Number(digits.parse::<i128>().unwrap_or(0)));
        }
        if !text.is_empty() || tokens.is_empty() {
            tokens.push(SortKey::Text(text));
        }
        key.push(SortKey::List(tokens));
    }
    SortKey::List(key)
}

/// The right-hand side of a bound test.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(Value),
    Regex(Regex),
    Glob(Glob),
}

/// Apply the operator semantics of `kind` to an attribute value.
///
/// `basename` and `is_dir` are needed for glob matches on path
/// attributes, where a pattern with a `/` is anchored against the
/// whole value while a plain pattern matches the basename.
pub fn matches(
    kind: ValueKind,
    op: Operator,
    pattern: &Pattern,
    value: &Value,
    basename: &str,
    is_dir: bool,
    ignore_case: bool,
) -> bool {
    match (kind, value) {
        (ValueKind::Text, Value::Text(s)) => {
            text_matches(op, pattern, s, s, false, ignore_case)
        }
        (ValueKind::Path, Value::Path(s)) | (ValueKind::Path, Value::Text(s)) => {
            text_matches(op, pattern, s, basename, is_dir, ignore_case)
        }
        (ValueKind::List, Value::List(items)) => items
            .iter()
            .any(|s| text_matches(op, pattern, s, s, false, ignore_case)),
        (ValueKind::FileType, Value::FileType(k)) => {
            matches!(pattern, Pattern::Literal(Value::FileType(t)) if op == Operator::Eq && k == t)
        }
        (ValueKind::Boolean, Value::Boolean(b)) => {
            matches!(pattern, Pattern::Literal(Value::Boolean(t)) if op == Operator::Eq && b == t)
        }
        (ValueKind::Mode, Value::Mode(m)) => {
            let t = match pattern {
                Pattern::Literal(Value::Mode(t)) => *t & MODE_ALL,
                _ => return false,
            };
            let m = *m & MODE_ALL;
            match op {
                Operator::Eq => m == t,
                Operator::Contains => m & t == t,
                Operator::Matches => m & t != 0,
                _ => false,
            }
        }
        (ValueKind::Number, _)
        | (ValueKind::Size, _)
        | (ValueKind::Time, _)
        | (ValueKind::Duration, _) => {
            let (Some(v), Pattern::Literal(lit)) = (value.as_i128(), pattern) else {
                return false;
            };
            let Some(t) = lit.as_i128() else {
                return false;
            };
            match op {
                Operator::Eq => v == t,
                Operator::Gt => v > t,
                Operator::Lt => v < t,
                Operator::Ge => v >= t,
                Operator::Le => v <= t,
                _ => false,
            }
        }
        _ => false,
    }
}

fn text_matches(
    op: Operator,
    pattern: &Pattern,
    value: &str,
    basename: &str,
    is_dir: bool,
    ignore_case: bool,
) -> bool {
    let lowered;
    let value = if ignore_case {
        lowered = value.to_lowercase();
        lowered.as_str()
    } else {
        value
    };

    match (op, pattern) {
        (Operator::Eq, Pattern::Literal(Value::Text(t)))
        | (Operator::Eq, Pattern::Literal(Value::Path(t))) => value == t.as_str(),
        (Operator::Contains, Pattern::Literal(Value::Text(t)))
        | (Operator::Contains, Pattern::Literal(Value::Path(t))) => value.contains(t.as_str()),
        (Operator::Matches, Pattern::Regex(re)) => re.is_match(value),
        (Operator::Glob, Pattern::Glob(glob)) => {
            let lowered_base;
            let basename = if ignore_case {
                lowered_base = basename.to_lowercase();
                lowered_base.as_str()
            } else {
                basename
            };
            if glob.matches(value, basename, is_dir) {
                glob.include()
            } else {
                !glob.include()
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_tables() {
        assert!(ValueKind::Text.supports(Operator::Glob));
        assert!(!ValueKind::Text.supports(Operator::Gt));
        assert!(ValueKind::Size.supports(Operator::Ge));
        assert!(!ValueKind::Size.supports(Operator::Matches));
        assert!(ValueKind::Mode.supports(Operator::Contains));
        assert!(!ValueKind::Boolean.supports(Operator::Contains));
    }

    #[test]
    fn test_file_kind_aliases() {
        assert_eq!(FileKind::parse("d").unwrap(), FileKind::Directory);
        assert_eq!(FileKind::parse("F").unwrap(), FileKind::File);
        assert_eq!(FileKind::parse("pipe").unwrap(), FileKind::Fifo);
        assert!(FileKind::parse("bogus").is_err());
    }

    #[test]
    fn test_numeric_matches() {
        let pat = Pattern::Literal(Value::Size(100));
        let val = Value::Size(150);
        assert!(matches(ValueKind::Size, Operator::Gt, &pat, &val, "", false, false));
        assert!(!matches(ValueKind::Size, Operator::Lt, &pat, &val, "", false, false));
        assert!(matches(ValueKind::Size, Operator::Ge, &pat, &val, "", false, false));
    }

    #[test]
    fn test_mode_matches() {
        let pat = Pattern::Literal(Value::Mode(0o222));
        // 0644 contains the owner write bit but not all write bits.
        let val = Value::Mode(0o644);
        assert!(matches(ValueKind::Mode, Operator::Matches, &pat, &val, "", false, false));
        assert!(!matches(ValueKind::Mode, Operator::Contains, &pat, &val, "", false, false));
        let exact = Pattern::Literal(Value::Mode(0o644));
        assert!(matches(ValueKind::Mode, Operator::Eq, &exact, &val, "", false, false));
    }

    #[test]
    fn test_list_matches() {
        let pat = Pattern::Literal(Value::Text("bar".into()));
        let val = Value::List(vec!["foobar".into(), "baz".into()]);
        assert!(matches(ValueKind::List, Operator::Contains, &pat, &val, "", false, false));
        let pat = Pattern::Literal(Value::Text("quux".into()));
        assert!(!matches(ValueKind::List, Operator::Contains, &pat, &val, "", false, false));
    }

    #[test]
    fn test_natural_sort_key() {
        let a = natural_sort_key("foo2");
        let b = natural_sort_key("foo10");
        assert!(a < b);
        let a = natural_sort_key("a/b2/c");
        let b = natural_sort_key("a/b10/c");
        assert!(a < b);
    }

    #[test]
    fn test_sort_key_ordering_is_total() {
        let n = SortKey::Number(1);
        let t = SortKey::Text("a".into());
        let l = SortKey::List(vec![]);
        assert!(n < t && t < l && n < l);
    }

    #[test]
    fn test_count_policies() {
        assert_eq!(ValueKind::Size.count_policy(), CountPolicy::Sum);
        assert_eq!(ValueKind::FileType.count_policy(), CountPolicy::Tally);
        assert_eq!(ValueKind::Path.count_policy(), CountPolicy::Uncountable);
        assert_eq!(ValueKind::Time.count_policy(), CountPolicy::Uncountable);
    }
}
