//! Assurance requirement expressions.
//!
//! A requirement is a boolean expression over assurance atoms:
//!
//! ```text
//! disjunction := conjunction ( "|" conjunction )*
//! conjunction := primary ( "&" primary )*
//! primary     := "(" disjunction ")" | atom
//! ```
//!
//! `&` binds tighter than `|`. The atom `*` is always satisfied, `+` is
//! satisfied by any non-empty set of claims. Atoms starting with `http://` or
//! `https://` are absolute; all others are resolved against a prefix.
//! Evaluation is literal set membership of the resolved atom.

use std::fmt;

use crate::error::{AdapterError, AdapterResult};

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    LeftParen,
    RightParen,
    Atom(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("&"),
            Self::Or => f.write_str("|"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::Atom(atom) => f.write_str(atom),
        }
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        let single = match c {
            '&' => Some(Token::And),
            '|' => Some(Token::Or),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push(token);
            chars.next();
            continue;
        }
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut atom = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || matches!(c, '&' | '|' | '(' | ')') {
                break;
            }
            atom.push(c);
            chars.next();
        }
        tokens.push(Token::Atom(atom));
    }

    tokens
}

// ============================================================================
// AST
// ============================================================================

/// A compiled assurance expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssuranceExpr {
    /// `*`: always satisfied.
    Any,
    /// `+`: satisfied by any non-empty claim set.
    NonEmpty,
    /// A resolved assurance URI.
    Claim(String),
    /// Both operands must hold.
    And(Box<AssuranceExpr>, Box<AssuranceExpr>),
    /// One operand must hold.
    Or(Box<AssuranceExpr>, Box<AssuranceExpr>),
}

impl AssuranceExpr {
    /// Evaluates the expression against a set of claims.
    #[must_use]
    pub fn evaluate(&self, claims: &[String]) -> bool {
        match self {
            Self::Any => true,
            Self::NonEmpty => !claims.is_empty(),
            Self::Claim(uri) => claims.iter().any(|claim| claim == uri),
            Self::And(left, right) => left.evaluate(claims) && right.evaluate(claims),
            Self::Or(left, right) => left.evaluate(claims) || right.evaluate(claims),
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'p> {
    tokens: Vec<Token>,
    position: usize,
    prefix: &'p str,
}

impl Parser<'_> {
    fn parse_or(&mut self) -> AdapterResult<AssuranceExpr> {
        let mut left = self.parse_and()?;
        while self.match_token(&Token::Or) {
            let right = self.parse_and()?;
            left = AssuranceExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> AdapterResult<AssuranceExpr> {
        let mut left = self.parse_primary()?;
        while self.match_token(&Token::And) {
            let right = self.parse_primary()?;
            left = AssuranceExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> AdapterResult<AssuranceExpr> {
        match self.tokens.get(self.position).cloned() {
            Some(Token::LeftParen) => {
                self.position += 1;
                let expr = self.parse_or()?;
                if !self.match_token(&Token::RightParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(expr)
            }
            Some(Token::Atom(atom)) => {
                self.position += 1;
                Ok(self.resolve(&atom))
            }
            Some(token) => Err(self.error(&format!("unexpected '{token}'"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn resolve(&self, atom: &str) -> AssuranceExpr {
        match atom {
            "*" => AssuranceExpr::Any,
            "+" => AssuranceExpr::NonEmpty,
            _ if atom.starts_with("http://") || atom.starts_with("https://") => {
                AssuranceExpr::Claim(atom.to_string())
            }
            _ => AssuranceExpr::Claim(format!("{}{atom}", self.prefix)),
        }
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.tokens.get(self.position) == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> AdapterError {
        AdapterError::config(format!(
            "invalid assurance expression: {message} at token {}",
            self.position
        ))
    }
}

// ============================================================================
// Policy
// ============================================================================

/// A compiled assurance requirement together with its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssurancePolicy {
    source: String,
    expr: AssuranceExpr,
}

impl AssurancePolicy {
    /// Compiles `require`, resolving relative atoms against `prefix`.
    ///
    /// The prefix is normalized to end with exactly one `/`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] for empty input, missing `)`,
    /// consecutive operators and trailing tokens.
    pub fn compile(require: &str, prefix: &str) -> AdapterResult<Self> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut parser = Parser {
            tokens: tokenize(require),
            position: 0,
            prefix: &prefix,
        };

        let expr = parser.parse_or()?;
        if let Some(token) = parser.tokens.get(parser.position) {
            return Err(parser.error(&format!("unexpected '{token}' after expression")));
        }

        Ok(Self {
            source: require.to_string(),
            expr,
        })
    }

    /// The expression as configured.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled expression.
    #[must_use]
    pub const fn expr(&self) -> &AssuranceExpr {
        &self.expr
    }

    /// Checks whether `claims` satisfy the requirement.
    #[must_use]
    pub fn is_satisfied(&self, claims: &[String]) -> bool {
        self.expr.evaluate(claims)
    }
}

/// Compiles and evaluates `require` against `claims` in one step.
pub fn evaluate(require: &str, prefix: &str, claims: &[String]) -> AdapterResult<bool> {
    Ok(AssurancePolicy::compile(require, prefix)?.is_satisfied(claims))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const PREFIX: &str = "https://refeds.org/assurance";

    fn claims(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn star_is_always_true() {
        assert!(evaluate("*", PREFIX, &[]).unwrap());
        assert!(evaluate("*", PREFIX, &claims(&["x"])).unwrap());
    }

    #[test]
    fn plus_requires_any_claim() {
        assert!(!evaluate("+", PREFIX, &[]).unwrap());
        assert!(evaluate("+", PREFIX, &claims(&["anything"])).unwrap());
    }

    #[test]
    fn relative_atoms_use_prefix() {
        let user = claims(&["https://refeds.org/assurance/profile/cappuccino"]);
        assert!(evaluate("profile/cappuccino", PREFIX, &user).unwrap());
        assert!(evaluate("profile/cappuccino", "https://refeds.org/assurance//", &user).unwrap());
        assert!(!evaluate("profile/espresso", PREFIX, &user).unwrap());
    }

    #[test]
    fn absolute_atoms_are_literal() {
        let user = claims(&["https://aai.egi.eu/LoA#Substantial"]);
        assert!(evaluate("https://aai.egi.eu/LoA#Substantial", PREFIX, &user).unwrap());
        assert!(evaluate("http://example.org/x | https://aai.egi.eu/LoA#Substantial", PREFIX, &user).unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a | b & c  ==  a | (b & c)
        let only_a = claims(&["https://x/a"]);
        assert!(evaluate("https://x/a | https://x/b & https://x/c", PREFIX, &only_a).unwrap());

        let only_c = claims(&["https://x/c"]);
        assert!(!evaluate("https://x/a | https://x/b & https://x/c", PREFIX, &only_c).unwrap());
        assert!(evaluate("(https://x/a | https://x/b) & https://x/c", PREFIX, &claims(&["https://x/a", "https://x/c"])).unwrap());
        assert!(!evaluate("(https://x/a | https://x/b) & https://x/c", PREFIX, &only_a).unwrap());
    }

    #[test]
    fn redundant_parentheses_nest() {
        let expr = "((a|(b&c)))";
        let full = |atom: &str| format!("{PREFIX}/{atom}");
        assert!(evaluate(expr, PREFIX, &[full("a")]).unwrap());
        assert!(evaluate(expr, PREFIX, &[full("b"), full("c")]).unwrap());
        assert!(!evaluate(expr, PREFIX, &[full("b")]).unwrap());
        assert!(!evaluate(expr, PREFIX, &[]).unwrap());
    }

    #[test]
    fn deep_nesting_parses() {
        let depth = 64;
        let expr = format!("{}profile/cappuccino{}", "(".repeat(depth), ")".repeat(depth));
        let policy = AssurancePolicy::compile(&expr, PREFIX).unwrap();
        assert!(policy.is_satisfied(&claims(&["https://refeds.org/assurance/profile/cappuccino"])));
        assert!(!policy.is_satisfied(&claims(&["https://refeds.org/assurance/profile/espresso"])));

        let unbalanced = format!("{}+{}", "(".repeat(depth), ")".repeat(depth - 1));
        assert!(AssurancePolicy::compile(&unbalanced, PREFIX).is_err());
    }

    #[test]
    fn parentheses_may_hug_atoms() {
        let user = claims(&["https://refeds.org/assurance/ID/unique"]);
        assert!(evaluate("(ID/unique&+)|(profile/espresso)", PREFIX, &user).unwrap());
    }

    #[test]
    fn malformed_expressions_are_config_errors() {
        for bad in ["", "   ", "(a | b", "a | | b", "a & | b", "a b", "a )", "| a", "()"] {
            let err = AssurancePolicy::compile(bad, PREFIX).unwrap_err();
            assert!(
                matches!(err, AdapterError::Config(_)),
                "expected a configuration error for {bad:?}"
            );
        }
    }

    #[test]
    fn policy_keeps_source() {
        let policy = AssurancePolicy::compile("profile/cappuccino | +", PREFIX).unwrap();
        assert_eq!(policy.source(), "profile/cappuccino | +");
        assert!(matches!(policy.expr(), AssuranceExpr::Or(_, _)));
    }

    proptest! {
        #[test]
        fn star_and_plus_truth_tables(values in proptest::collection::vec("[a-z]{1,8}", 0..4)) {
            prop_assert!(evaluate("*", PREFIX, &values).unwrap());
            prop_assert_eq!(evaluate("+", PREFIX, &values).unwrap(), !values.is_empty());
            prop_assert_eq!(evaluate("* & +", PREFIX, &values).unwrap(), !values.is_empty());
        }
    }
}
