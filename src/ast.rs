//! The concrete syntax tree (§4.1) produced by the parser and consumed by
//! the compiler (§4.2). Kept as tagged sum types (not an `Optional`-heavy
//! visitor hierarchy) per the Design Notes in §9.

use rust_decimal::Decimal;

use crate::stream::Stream;
use crate::units::BaseUnit;

#[derive(Debug, Clone, PartialEq)]
pub struct CstProgram {
    pub stanzas: Vec<Stanza>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stanza {
    About,
    Default(Vec<AppItem>),
    Policy(String, Vec<AppItem>),
    Simulations(Vec<SimItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppItem {
    /// `define application "A" ... end application` (only valid in `default`).
    Define(AppBody),
    /// `modify application "A" ... end application` (only valid in a policy).
    Modify(AppBody),
    Global(GlobalStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppBody {
    pub name: String,
    pub substances: Vec<SubstanceItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubstanceItem {
    /// `uses substance "S" ... end substance` or `modify substance "S" ... end substance`.
    Substance(SubstanceBody),
    Global(GlobalStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubstanceBody {
    pub name: String,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimItem {
    Simulate(SimulateDef),
    Global(GlobalStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulateDef {
    pub name: String,
    pub policies: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub trials: u32,
}

/// `define X as E` / `set X to E` at stanza/application/simulations level
/// (§4.2 "Global statements").
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalStmt {
    Define(String, Expr),
    Set(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Set { target: Stream, value: Expr, during: During },
    Change { target: Stream, value: Expr, during: During },
    Cap { target: Stream, value: Expr, during: During },
    Floor { target: Stream, value: Expr, displacing: Option<String>, during: During },
    Replace { volume: Expr, target: Stream, destination: String, during: During },
    Retire { volume: Expr, during: During },
    Recharge { population_pct: Expr, per_unit_volume: Expr, during: During },
    Recover { volume: Expr, yield_fraction: Expr, during: During },
    InitialCharge { per_unit_volume: Expr, stream: Stream, during: During },
    Equals { factor: Expr, numerator: BaseUnit, denominator: BaseUnit },
    Emit { value: Expr, during: During },
    Enable { stream: Stream },
    Define(String, Expr),
}

/// `ParsedDuring` (§3): the optional `during` clause attached to a statement.
/// Both fields absent means "every year of the simulation".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct During {
    pub start: Option<TimePointFuture>,
    pub end: Option<TimePointFuture>,
}

impl During {
    pub fn always() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicCap {
    Beginning,
    Onwards,
}

/// A time point known only at scenario-execution time (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum TimePointFuture {
    Literal(i32),
    Dynamic(DynamicCap),
    Calculated(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Decimal),
    /// `expression unit` or `expression unit / unit` (§4.2 `unitValue`).
    WithUnit(Box<Expr>, crate::units::Unit),
    Var(String),
    Get { stream: Stream, substance: String, application: Option<String> },
    Neg(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    SampleNormal { mean: Box<Expr>, std: Box<Expr> },
    SampleUniform { low: Box<Expr>, high: Box<Expr> },
    Limit { x: Box<Expr>, lo: Option<Box<Expr>>, hi: Option<Box<Expr>> },
}
