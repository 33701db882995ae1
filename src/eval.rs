//! Expression binding and evaluation
//!
//! Binding resolves every attribute name against the registry,
//! validates the operator against the attribute's type, parses the
//! literal (or resolves a `{ref}` file reference) and compiles
//! regexes and globs. All of this happens before any walking begins,
//! so a bad expression fails fast.
//!
//! Within each `And`/`Or` the children are reordered by attribute
//! cost, cheapest first. This is observationally safe because tests
//! are pure over the per-entry context: the first lookup materializes
//! the value, repeated lookups hit the memo. Evaluation then
//! short-circuits `And` on the first false and `Or` on the first
//! true; a missing attribute value makes its test false, never an
//! error.

use std::sync::Arc;

use regex::RegexBuilder;
use tracing::warn;

use crate::cache::MetaCache;
use crate::config::CaseMode;
use crate::context::EntryContext;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::expr::{Expr, TestSpec};
use crate::ignore::Glob;
use crate::registry::{Attribute, Registry};
use crate::types::{self, Operator, Pattern, Value, ValueKind};

/// A test with its attribute resolved and its value compiled.
#[derive(Debug, Clone)]
pub struct BoundTest {
    pub attribute: Attribute,
    pub kind: ValueKind,
    pub cost: u32,
    pub op: Operator,
    pub pattern: Pattern,
    pub ignore_case: bool,
}

impl BoundTest {
    pub fn matches(&self, ctx: &mut EntryContext) -> bool {
        let Some(value) = ctx.get(&self.attribute) else {
            // The entry has no value for this attribute.
            return false;
        };
        let basename = ctx.entry.name.clone();
        let is_dir = ctx.entry.is_dir();
        types::matches(
            self.kind,
            self.op,
            &self.pattern,
            &value,
            &basename,
            is_dir,
            self.ignore_case,
        )
    }
}

/// A bound expression tree, shared read-only across workers.
#[derive(Debug, Clone)]
pub enum BoundExpr {
    Test(BoundTest),
    And(Vec<BoundExpr>),
    Or(Vec<BoundExpr>),
    Not(Box<BoundExpr>),
}

impl BoundExpr {
    fn cost(&self) -> u32 {
        match self {
            BoundExpr::Test(test) => test.cost,
            BoundExpr::And(children) | BoundExpr::Or(children) => {
                children.iter().map(BoundExpr::cost).max().unwrap_or(0)
            }
            BoundExpr::Not(child) => child.cost(),
        }
    }

    fn eval(&self, ctx: &mut EntryContext) -> bool {
        match self {
            BoundExpr::Test(test) => test.matches(ctx),
            BoundExpr::And(children) => children.iter().all(|c| c.eval(ctx)),
            BoundExpr::Or(children) => children.iter().any(|c| c.eval(ctx)),
            BoundExpr::Not(child) => !child.eval(ctx),
        }
    }
}

/// Resolves and compiles tests against a registry.
pub struct Binder {
    registry: Arc<Registry>,
    cache: Option<Arc<MetaCache>>,
    case: CaseMode,
    si: bool,
    follow_symlinks: bool,
}

impl Binder {
    pub fn new(
        registry: Arc<Registry>,
        cache: Option<Arc<MetaCache>>,
        case: CaseMode,
        si: bool,
        follow_symlinks: bool,
    ) -> Binder {
        Binder {
            registry,
            cache,
            case,
            si,
            follow_symlinks,
        }
    }

    /// Bind a whole expression tree and reorder it by cost.
    pub fn bind(&self, expr: &Expr) -> Result<BoundExpr> {
        let bound = self.bind_expr(expr)?;
        Ok(reorder(bound))
    }

    fn bind_expr(&self, expr: &Expr) -> Result<BoundExpr> {
        match expr {
            Expr::Test(spec) => Ok(BoundExpr::Test(self.bind_test(spec)?)),
            Expr::And(children) => Ok(BoundExpr::And(
                children.iter().map(|c| self.bind_expr(c)).collect::<Result<_>>()?,
            )),
            Expr::Or(children) => Ok(BoundExpr::Or(
                children.iter().map(|c| self.bind_expr(c)).collect::<Result<_>>()?,
            )),
            Expr::Not(child) => Ok(BoundExpr::Not(Box::new(self.bind_expr(child)?))),
        }
    }

    /// Bind one test: resolve the attribute, check the operator,
    /// produce the compiled pattern.
    pub fn bind_test(&self, spec: &TestSpec) -> Result<BoundTest> {
        let mut attribute = self.registry.resolve(&spec.attr)?;
        let meta = self
            .registry
            .info(&attribute)
            .expect("resolved attribute must have metadata");
        let kind = meta.kind;

        if !kind.supports(spec.op) {
            return Err(Error::Expression(format!(
                "attribute {attribute} of type {:?} does not support operator {:?}",
                kind.name(),
                spec.op.token()
            )));
        }

        let literal = match &spec.reference {
            Some(reference) => Some(self.resolve_reference(&attribute, kind, reference, &spec.value)?),
            None => None,
        };

        let (pattern, ignore_case) = if kind.is_text() {
            let raw = match &literal {
                Some(Value::Text(s)) | Some(Value::Path(s)) => s.clone(),
                Some(other) => {
                    return Err(Error::Expression(format!(
                        "reference value {other:?} is not comparable to {attribute}"
                    )))
                }
                None => spec.value.clone(),
            };

            let ignore_case = match self.case {
                CaseMode::Smart => !raw.chars().any(|c| c.is_uppercase()),
                CaseMode::Ignore => true,
                CaseMode::Sensitive => false,
            };
            let raw = if ignore_case { raw.to_lowercase() } else { raw };

            let pattern = match spec.op {
                Operator::Matches => {
                    let regex = RegexBuilder::new(&raw)
                        .case_insensitive(ignore_case)
                        .build()
                        .map_err(|e| {
                            Error::Expression(format!("invalid regex pattern {raw:?}: {e}"))
                        })?;
                    Pattern::Regex(regex)
                }
                Operator::Glob => {
                    let glob = Glob::new(&raw, ignore_case).map_err(Error::Expression)?;
                    if glob.anchored() {
                        // Anchored globs are matched against the whole
                        // path, so path and name tests silently become
                        // relpath tests.
                        if attribute == Attribute::new("file", "path") {
                            warn!(
                                "{raw:?} is a full-path glob pattern that is matched relative \
                                 to the start directory; using 'file.relpath' instead of 'file.path'"
                            );
                            attribute = Attribute::new("file", "relpath");
                        } else if attribute == Attribute::new("file", "name") {
                            warn!(
                                "{raw:?} is a full-path glob pattern that will not match on \
                                 the basename; using 'file.relpath' instead of 'file.name'"
                            );
                            attribute = Attribute::new("file", "relpath");
                        }
                    }
                    Pattern::Glob(glob)
                }
                _ => Pattern::Literal(Value::Text(raw)),
            };
            (pattern, ignore_case)
        } else {
            let value = match literal {
                Some(value) => value,
                None => kind
                    .parse(&spec.value, self.si)
                    .map_err(Error::Expression)?,
            };
            (Pattern::Literal(value), false)
        };

        Ok(BoundTest {
            attribute,
            kind,
            cost: meta.cost,
            op: spec.op,
            pattern,
            ignore_case,
        })
    }

    /// Resolve `{ref-attr}path`: evaluate `ref-attr` (defaulting to
    /// the test's own attribute) against the referenced file and use
    /// the result as the right-hand side.
    fn resolve_reference(
        &self,
        attribute: &Attribute,
        kind: ValueKind,
        reference: &str,
        path: &str,
    ) -> Result<Value> {
        let ref_attribute = if reference.is_empty() {
            attribute.clone()
        } else {
            self.registry.resolve(reference)?
        };
        let ref_kind = self
            .registry
            .info(&ref_attribute)
            .expect("resolved attribute must have metadata")
            .kind;

        if !kind.comparable_with(ref_kind) {
            return Err(Error::Expression(format!(
                "{attribute} and {ref_attribute} have different types and cannot be compared"
            )));
        }

        let entry = Entry::reference(path, self.follow_symlinks).map_err(|e| {
            Error::Usage(format!("unable to read reference file {path:?}: {e}"))
        })?;
        let mut ctx = EntryContext::new(entry, self.registry.clone(), self.cache.clone());
        ctx.get(&ref_attribute).ok_or_else(|| {
            Error::Usage(format!(
                "reference file {path:?} has no value for {ref_attribute}"
            ))
        })
    }
}

/// Sort the children of every `And`/`Or` by cost ascending; a
/// composite child costs as much as its most expensive leaf.
/// `Not` children are kept as units.
fn reorder(expr: BoundExpr) -> BoundExpr {
    match expr {
        BoundExpr::And(children) => BoundExpr::And(reorder_children(children)),
        BoundExpr::Or(children) => BoundExpr::Or(reorder_children(children)),
        BoundExpr::Not(child) => BoundExpr::Not(Box::new(reorder(*child))),
        test => test,
    }
}

fn reorder_children(children: Vec<BoundExpr>) -> Vec<BoundExpr> {
    let mut children: Vec<BoundExpr> = children.into_iter().map(reorder).collect();
    children.sort_by_key(BoundExpr::cost);
    children
}

/// The main expression. An empty matcher matches every entry.
pub struct Matcher {
    root: Option<BoundExpr>,
}

impl Matcher {
    pub fn new(binder: &Binder, expr: &Expr) -> Result<Matcher> {
        if expr.is_empty() {
            return Ok(Matcher { root: None });
        }
        Ok(Matcher {
            root: Some(binder.bind(expr)?),
        })
    }

    pub fn matches(&self, ctx: &mut EntryContext) -> bool {
        match &self.root {
            Some(expr) => expr.eval(ctx),
            None => true,
        }
    }

    /// The attributes used by the expression, for walker setup.
    pub fn plugins(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            collect_plugins(root, &mut out);
        }
        out
    }
}

/// The exclusion prefilter: a flat any-of list of tests consulted
/// before the main expression. Matching directories are pruned from
/// the walk. An empty excluder excludes nothing.
pub struct Excluder {
    tests: Vec<BoundTest>,
}

impl Excluder {
    /// Build from `-e` tokens. Bare tokens default to `name%token`.
    pub fn new(binder: &Binder, tokens: &[String]) -> Result<Excluder> {
        let mut tests = Vec::new();
        for token in tokens {
            let spec = crate::expr::parse_test(token, Some(("name", Operator::Glob)))
                .map_err(Error::TestSyntax)?;
            tests.push(binder.bind_test(&spec)?);
        }
        tests.sort_by_key(|t| t.cost);
        Ok(Excluder { tests })
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn matches(&self, ctx: &mut EntryContext) -> bool {
        self.tests.iter().any(|test| test.matches(ctx))
    }

    pub fn plugins(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.attribute.plugin.clone()).collect()
    }
}

fn collect_plugins(expr: &BoundExpr, out: &mut Vec<String>) {
    match expr {
        BoundExpr::Test(test) => out.push(test.attribute.plugin.clone()),
        BoundExpr::And(children) | BoundExpr::Or(children) => {
            for child in children {
                collect_plugins(child, out);
            }
        }
        BoundExpr::Not(child) => collect_plugins(child, out),
    }
}
