//! The operation tree (§4.3): the unit of work the engine replays for every
//! active year of a substance. Each variant borrows its value expressions
//! straight from the CST (`ast::Expr`) — the compiler's job is validating
//! structure, not re-lowering expressions into a second tree, the same way
//! `chapaty::decision_policy` stores its condition trees as-is rather than
//! compiling them into bytecode.

use crate::ast::Expr;
use crate::stream::Stream;

/// A resolved `during` clause: an inclusive `[start, end]` year range,
/// either or both bounds open. Resolution of `beginning`/`onwards`/
/// calculated bounds against a concrete scenario happens once per scenario
/// run, in `engine::resolve_during` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuringRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl DuringRange {
    pub fn always() -> Self {
        Self { start: None, end: None }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start.is_none_or(|s| year >= s) && self.end.is_none_or(|e| year <= e)
    }
}

/// One of the 13 statement kinds from §4.3. `Enable`/`Equals` are not
/// represented here: they configure a substance once rather than replaying
/// per year, so the compiler lifts them into `ParsedSubstance::enabled_streams`
/// / `ParsedSubstance::equals` directly (see DESIGN.md).
#[derive(Debug, Clone)]
pub enum Operation {
    Set { target: Stream, value: Expr },
    Change { target: Stream, value: Expr },
    Cap { target: Stream, value: Expr },
    Floor { target: Stream, value: Expr, displacing: Option<String> },
    Replace { volume: Expr, target: Stream, destination: String },
    Retire { volume: Expr },
    Recharge { population_pct: Expr, per_unit_volume: Expr },
    Recover { volume: Expr, yield_fraction: Expr },
    InitialCharge { per_unit_volume: Expr, stream: Stream },
    Emit { value: Expr },
    Define { name: String, value: Expr },
}

impl Operation {
    pub fn target_stream(&self) -> Option<Stream> {
        match self {
            Operation::Set { target, .. }
            | Operation::Change { target, .. }
            | Operation::Cap { target, .. }
            | Operation::Floor { target, .. } => Some(*target),
            Operation::Replace { target, .. } => Some(*target),
            Operation::InitialCharge { stream, .. } => Some(*stream),
            _ => None,
        }
    }
}
