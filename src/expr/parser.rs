//! Token-stream parser for the expression language

use crate::types::Operator;

use super::{parse_test, Expr, TestSpec};

const OPENING: &[&str] = &["(", "{{"];
const CLOSING: &[&str] = &[")", "}}"];

/// Parse a token list into an expression tree.
///
/// `default` supplies the attribute and operator for bare tokens that
/// are not test expressions (`None` forbids them). The result is
/// normalized: single-child groups collapse into their child.
pub fn parse(tokens: &[String], default: Option<(&str, Operator)>) -> Result<Expr, String> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        default,
    };
    let expr = parser.parse_sequence(false)?;
    if parser.pos < tokens.len() {
        return Err(format!(
            "superfluous closing bracket {:?}",
            tokens[parser.pos]
        ));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [String],
    pos: usize,
    default: Option<(&'a str, Operator)>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token.as_str())
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn test(&self, token: &str) -> Result<TestSpec, String> {
        parse_test(token, self.default)
    }

    /// Parse until the end of input (top level) or a closing bracket
    /// (nested). Builds an or-list of and-lists.
    fn parse_sequence(&mut self, nested: bool) -> Result<Expr, String> {
        let mut groups: Vec<Vec<Expr>> = vec![Vec::new()];

        loop {
            let Some(token) = self.next() else {
                if nested {
                    return Err("incomplete sub sequence".to_string());
                }
                break;
            };

            if OPENING.contains(&token) {
                let sub = self.parse_sequence(true)?;
                groups.last_mut().unwrap().push(sub);
            } else if CLOSING.contains(&token) {
                if !nested {
                    return Err(format!("superfluous closing bracket {token:?}"));
                }
                if groups.last().unwrap().is_empty() {
                    return Err("empty expression".to_string());
                }
                return Ok(build(groups));
            } else if token.eq_ignore_ascii_case("and") {
                // Implicit, nothing to do.
            } else if token.eq_ignore_ascii_case("or") {
                groups.push(Vec::new());
            } else if token.eq_ignore_ascii_case("not") {
                let negated = self.parse_negated()?;
                groups.last_mut().unwrap().push(negated);
            } else {
                groups
                    .last_mut()
                    .unwrap()
                    .push(Expr::Test(self.test(token)?));
            }
        }

        Ok(build(groups))
    }

    fn parse_negated(&mut self) -> Result<Expr, String> {
        let Some(token) = self.peek() else {
            return Err("premature end of expression after 'not'".to_string());
        };

        if OPENING.contains(&token) {
            self.pos += 1;
            let sub = self.parse_sequence(true)?;
            Ok(Expr::Not(Box::new(sub)))
        } else if CLOSING.contains(&token)
            || token.eq_ignore_ascii_case("and")
            || token.eq_ignore_ascii_case("or")
            || token.eq_ignore_ascii_case("not")
        {
            Err(format!("unexpected token {token:?} after 'not'"))
        } else {
            self.pos += 1;
            Ok(Expr::Not(Box::new(Expr::Test(self.test(token)?))))
        }
    }
}

fn build(groups: Vec<Vec<Expr>>) -> Expr {
    let mut alternatives: Vec<Expr> = groups
        .into_iter()
        .map(|mut group| {
            if group.len() == 1 {
                group.pop().unwrap()
            } else {
                Expr::And(group)
            }
        })
        .collect();

    if alternatives.len() == 1 {
        alternatives.pop().unwrap()
    } else {
        Expr::Or(alternatives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn attr_of(expr: &Expr) -> &str {
        match expr {
            Expr::Test(test) => &test.attr,
            _ => panic!("expected a test, got {expr:?}"),
        }
    }

    #[test]
    fn test_implicit_and() {
        let expr = parse(&tokens(&["type=f", "size+1k"]), None).unwrap();
        match expr {
            Expr::And(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(attr_of(&children[0]), "type");
                assert_eq!(attr_of(&children[1]), "size");
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_or_precedence() {
        // a or b c  =>  Or(a, And(b, c))
        let expr = parse(&tokens(&["ext=rs", "or", "ext=py", "size+1k"]), None).unwrap();
        match expr {
            Expr::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Expr::Test(_)));
                assert!(matches!(&children[1], Expr::And(c) if c.len() == 2));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_and_is_noop() {
        let a = parse(&tokens(&["type=f", "and", "size+1k"]), None).unwrap();
        let b = parse(&tokens(&["type=f", "size+1k"]), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_brackets_group() {
        let expr = parse(
            &tokens(&["type=f", "(", "ext=rs", "or", "ext=py", ")"]),
            None,
        )
        .unwrap();
        match expr {
            Expr::And(children) => {
                assert!(matches!(children[1], Expr::Or(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_brace_aliases() {
        let a = parse(&tokens(&["{{", "ext=rs", "or", "ext=py", "}}"]), None).unwrap();
        let b = parse(&tokens(&["(", "ext=rs", "or", "ext=py", ")"]), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_not_single_test() {
        let expr = parse(&tokens(&["not", "empty=yes"]), None).unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn test_not_group() {
        let expr = parse(&tokens(&["not", "(", "ext=rs", "or", "ext=py", ")"]), None).unwrap();
        match expr {
            Expr::Not(inner) => assert!(matches!(*inner, Expr::Or(_))),
            other => panic!("expected Not, got {other:?}"),
        }
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let a = parse(&tokens(&["ext=rs", "OR", "ext=py"]), None).unwrap();
        let b = parse(&tokens(&["ext=rs", "or", "ext=py"]), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_errors() {
        assert!(parse(&tokens(&["("]), None).is_err());
        assert!(parse(&tokens(&[")"]), None).is_err());
        assert!(parse(&tokens(&["(", ")"]), None).is_err());
        assert!(parse(&tokens(&["not"]), None).is_err());
        assert!(parse(&tokens(&["not", "or"]), None).is_err());
        assert!(parse(&tokens(&["type=f", ")"]), None).is_err());
    }

    #[test]
    fn test_empty_input_matches_everything() {
        let expr = parse(&[], None).unwrap();
        assert!(expr.is_empty());
    }
}
