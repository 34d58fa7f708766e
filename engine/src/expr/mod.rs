//! Boolean conditions over a fixed set of market variables.
//!
//! A [`Condition`] is parsed once and then evaluated any number of times
//! against [`Bindings`]. Evaluation is total: every variable always has a
//! value and no operation can fail.

mod ast;
mod lexer;
mod parser;

use market::{CurrentSnapshot, HistoricalSnapshot};
use thiserror::Error;

pub use ast::{CmpOp, Expr, Operand, Var};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("empty condition")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected token {found} at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of condition")]
    UnexpectedEnd,

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("parentheses nested deeper than {} at {pos}", MAX_DEPTH)]
    TooDeep { pos: usize },

    #[error("condition has {0} tokens, more than {max}", max = MAX_TOKENS)]
    TooLong(usize),
}

/// Deepest parenthesis nesting a condition may use.
pub const MAX_DEPTH: usize = 32;

/// Longest condition, in tokens.
pub const MAX_TOKENS: usize = 512;

/// Values for every [`Var`] at evaluation time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bindings {
    pub price: f64,
    pub daily_change_pct: f64,
    pub volume: f64,
    pub monthly_high: f64,
    pub monthly_low: f64,
}

impl Bindings {
    /// Monthly extremes are 0 when no history is available.
    pub fn from_snapshots(current: &CurrentSnapshot, historical: Option<&HistoricalSnapshot>) -> Self {
        Self {
            price: current.price,
            daily_change_pct: current.daily_change_pct(),
            volume: current.volume as f64,
            monthly_high: historical.map_or(0.0, |h| h.monthly_high),
            monthly_low: historical.map_or(0.0, |h| h.monthly_low),
        }
    }

    fn get(&self, var: Var) -> f64 {
        match var {
            Var::Price => self.price,
            Var::DailyChangePct => self.daily_change_pct,
            Var::Volume => self.volume,
            Var::MonthlyHigh => self.monthly_high,
            Var::MonthlyLow => self.monthly_low,
        }
    }

    fn resolve(&self, operand: Operand) -> f64 {
        match operand {
            Operand::Var(v) => self.get(v),
            Operand::Num(n) => n,
        }
    }
}

/// A parsed, validated condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(source)?;
        if tokens.len() > MAX_TOKENS {
            return Err(ExprError::TooLong(tokens.len()));
        }
        let expr = parser::Parser::new(&tokens).parse()?;

        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn eval(&self, bindings: &Bindings) -> bool {
        eval(&self.expr, bindings)
    }
}

fn eval(expr: &Expr, b: &Bindings) -> bool {
    match expr {
        Expr::Bool(v) => *v,
        Expr::Cmp { lhs, op, rhs } => op.apply(b.resolve(*lhs), b.resolve(*rhs)),
        Expr::And(clauses) => clauses.iter().all(|c| eval(c, b)),
        Expr::Or(clauses) => clauses.iter().any(|c| eval(c, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Bindings {
        Bindings {
            price: 500.0,
            daily_change_pct: 4.1667,
            volume: 150_000_000.0,
            monthly_high: 510.0,
            monthly_low: 400.0,
        }
    }

    fn check(src: &str) -> bool {
        Condition::parse(src).unwrap().eval(&bindings())
    }

    #[test]
    fn simple_comparisons() {
        assert!(check("price > 450"));
        assert!(check("price >= 500"));
        assert!(check("price <= 500"));
        assert!(check("price == 500"));
        assert!(!check("price < 500"));
        assert!(check("price != 1"));
    }

    #[test]
    fn and_requires_both_clauses() {
        assert!(check("daily_change_pct > 3 and volume > 100000000"));
        assert!(!check("daily_change_pct > 5 and volume > 100000000"));
        assert!(!check("daily_change_pct > 3 and volume > 200000000"));
    }

    #[test]
    fn or_requires_either_clause() {
        assert!(check("daily_change_pct > 5 or daily_change_pct > 4"));
        assert!(!check("daily_change_pct > 5 or daily_change_pct < -5"));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // True or (False and False) => true
        assert!(check("price > 1 or price < 1 and price < 0"));
        // (True or False) and False => false
        assert!(!check("(price > 1 or price < 1) and price < 0"));
    }

    #[test]
    fn negative_literals_and_variable_comparisons() {
        assert!(check("daily_change_pct > -5"));
        assert!(check("price < monthly_high"));
        assert!(check("monthly_low < price"));
    }

    #[test]
    fn boolean_literals() {
        assert!(check("True"));
        assert!(!check("False"));
        assert!(check("False or price > 0"));
    }

    #[test]
    fn missing_history_compares_against_zero() {
        let current = CurrentSnapshot {
            ticker: "AAPL".into(),
            price: 190.0,
            previous_close: 185.0,
            open: 186.0,
            high: 191.0,
            low: 185.0,
            volume: 60_000_000,
            observed_at: chrono::Utc::now(),
        };
        let b = Bindings::from_snapshots(&current, None);

        assert_eq!(b.monthly_high, 0.0);
        assert!(Condition::parse("price > monthly_high").unwrap().eval(&b));
    }

    #[test]
    fn rejects_malformed_conditions() {
        for src in [
            "",
            "   ",
            "price ??? 100",
            "price >",
            "price > 100 and",
            "(price > 100",
            "price > 100)",
            "price 100",
            "__import__ > 1",
            "price > 1 > 2",
        ] {
            assert!(Condition::parse(src).is_err(), "expected error for {src:?}");
        }
    }

    #[test]
    fn nesting_is_capped() {
        let ok = format!("{}price > 1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(Condition::parse(&ok).unwrap().eval(&bindings()));

        let deep = format!("{}price > 1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(matches!(
            Condition::parse(&deep),
            Err(ExprError::TooDeep { .. }) | Err(ExprError::TooLong(_))
        ));

        let just_over = format!("{}price > 1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(matches!(
            Condition::parse(&just_over),
            Err(ExprError::TooDeep { pos: 32 })
        ));
    }

    #[test]
    fn long_chains_are_rejected_and_short_ones_stay_flat() {
        let huge = vec!["price > 1"; 200_000].join(" and ");
        assert!(matches!(Condition::parse(&huge), Err(ExprError::TooLong(_))));

        let chain = vec!["price > 1"; 100].join(" and ");
        let cond = Condition::parse(&chain).unwrap();
        assert!(matches!(cond.expr(), Expr::And(clauses) if clauses.len() == 100));
        assert!(cond.eval(&bindings()));
    }

    #[test]
    fn unknown_identifier_is_named() {
        let err = Condition::parse("os > 1").unwrap_err();
        assert_eq!(err, ExprError::UnknownVariable("os".into()));
    }
}
