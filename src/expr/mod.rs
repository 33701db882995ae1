//! The expression language
//!
//! A query is a sequence of tokens the CLI layer already split:
//! test strings like `size+=100M`, the keywords `and`, `or`, `not`
//! (case insensitive) and the grouping tokens `(`/`)` with the
//! shell-friendly aliases `{{`/`}}`. Adjacent tests are implicitly
//! connected with `and`; `not` binds strongest, `or` weakest.
//!
//! Parsing produces an unbound [`Expr`] tree; attribute names are
//! resolved later against the registry (see [`crate::eval`]).

pub mod parser;

pub use parser::parse;

use std::sync::OnceLock;

use regex::Regex;

use crate::types::Operator;

/// One unbound test: attribute name, operator, and the raw right-hand
/// side, which is either a literal or a `{ref-attr}path` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSpec {
    pub attr: String,
    pub op: Operator,
    /// `Some("")` for `{}` (reference with the test's own attribute),
    /// `Some(name)` for `{name}`.
    pub reference: Option<String>,
    pub value: String,
}

/// A boolean expression over tests. `And`/`Or` are n-ary.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Test(TestSpec),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// True if the tree contains no tests at all. An empty matcher
    /// matches everything, an empty excluder excludes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::Test(_) => false,
            Expr::And(children) | Expr::Or(children) => children.iter().all(Expr::is_empty),
            Expr::Not(child) => child.is_empty(),
        }
    }

    /// All tests in the tree, depth first.
    pub fn tests(&self) -> Vec<&TestSpec> {
        let mut out = Vec::new();
        self.collect_tests(&mut out);
        out
    }

    fn collect_tests<'a>(&'a self, out: &mut Vec<&'a TestSpec>) {
        match self {
            Expr::Test(test) => out.push(test),
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.collect_tests(out);
                }
            }
            Expr::Not(child) => child.collect_tests(out),
        }
    }
}

fn test_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?x)
            ^\s*
            ((?:\w+\.)?\w+?)                       # attribute, optionally qualified
            \s*
            (>=|<=|\+=|-=|=|:|~|%|>|<|\+|-)        # operator, longest match first
            (\{(?:\w+\.)?\w+\}|\{\})?              # optional file reference
            \s*
            (.+)                                   # value
            $",
        )
        .unwrap()
    })
}

fn operator_from(token: &str) -> Operator {
    // `>`-style synonyms normalize to their `+`-style forms.
    match token {
        "=" => Operator::Eq,
        ":" => Operator::Contains,
        "~" => Operator::Matches,
        "%" => Operator::Glob,
        "+" | ">" => Operator::Gt,
        "-" | "<" => Operator::Lt,
        "+=" | ">=" => Operator::Ge,
        "-=" | "<=" => Operator::Le,
        _ => unreachable!("operator alternation out of sync"),
    }
}

/// Parse one test token. Tokens that don't look like a test fall back
/// to the given default attribute and operator, e.g. a bare `<regex>`
/// becomes `file.name~<regex>` for the main expression.
pub fn parse_test(
    token: &str,
    default: Option<(&str, Operator)>,
) -> Result<TestSpec, String> {
    if let Some(caps) = test_regex().captures(token) {
        let attr = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let op = operator_from(caps.get(2).map(|m| m.as_str()).unwrap_or("="));
        let reference = caps
            .get(3)
            .map(|m| m.as_str().trim_matches(['{', '}']).to_string());
        let value = caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default();
        return Ok(TestSpec { attr, op, reference, value });
    }

    match default {
        Some((attr, op)) => Ok(TestSpec {
            attr: attr.to_string(),
            op,
            reference: None,
            value: token.to_string(),
        }),
        None => Err(format!("simple patterns like {token:?} are not allowed")),
    }
}
