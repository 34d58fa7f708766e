use std::fmt;

/// Variables a condition may reference. Nothing outside this set is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Var {
    Price,
    DailyChangePct,
    Volume,
    MonthlyHigh,
    MonthlyLow,
}

impl Var {
    pub const ALL: [Var; 5] = [
        Var::Price,
        Var::DailyChangePct,
        Var::Volume,
        Var::MonthlyHigh,
        Var::MonthlyLow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Var::Price => "price",
            Var::DailyChangePct => "daily_change_pct",
            Var::Volume => "volume",
            Var::MonthlyHigh => "monthly_high",
            Var::MonthlyLow => "monthly_low",
        }
    }

    pub fn lookup(name: &str) -> Option<Var> {
        Var::ALL.into_iter().find(|v| v.name() == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Var(Var),
    Num(f64),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Bool(bool),
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    /// At least two clauses; chains are kept flat.
    And(Vec<Expr>),
    Or(Vec<Expr>),
}
