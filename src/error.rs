//! Layered error taxonomy for the QubecTalk pipeline.
//!
//! Mirrors the shape of `chapaty::error::ChapatyError`: a top-level enum of
//! `#[error(transparent)]` variants, each wrapping a focused sub-enum for one
//! pipeline stage, so call sites can match on the stage without unwrapping a
//! single flat bag of strings.

use thiserror::Error;

pub type QubecResult<T> = Result<T, QubecError>;

#[derive(Debug, Error)]
pub enum QubecError {
    #[error("{0} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// A single `(line, message)` syntax diagnostic. `line` is 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Errors raised while walking the CST into a `ParsedProgram`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("scenario '{scenario}' references undefined policy '{policy}'")]
    UndefinedPolicy { scenario: String, policy: String },

    #[error("'default' cannot be used as a user policy name")]
    ReservedDefaultName,

    #[error("malformed during clause: {0}")]
    MalformedDuring(String),

    #[error("program has no 'default' policy")]
    MissingDefaultPolicy,

    #[error("unknown stream keyword: '{0}'")]
    UnknownStream(String),

    #[error("unknown unit keyword: '{0}'")]
    UnknownUnit(String),
}

/// Machine-level failures from unit-aware arithmetic (§4.4).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("cannot combine units '{left}' and '{right}'")]
    Mismatch { left: String, right: String },

    #[error("no known conversion from '{from}' to '{to}'")]
    Conversion { from: String, to: String },
}

/// Stream-read/write failures (§7 `UndefinedStream` / `UndefinedReference`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream '{stream}' is not enabled for substance '{substance}'")]
    UndefinedStream { stream: String, substance: String },

    #[error("undefined reference: substance '{substance}' in application '{application:?}'")]
    UndefinedReference { substance: String, application: Option<String> },

    #[error("year {year} is outside the simulation range [{start}, {end}]")]
    YearOutOfRange { year: i32, start: i32, end: i32 },
}

/// Internal invariant violations (§7 `InvariantError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("getResult called on an empty stack")]
    EmptyStack,

    #[error("getResult called with {0} elements on the stack, expected exactly 1")]
    MultiElementStack(usize),

    #[error("calculated time point evaluated to a unit-bearing number: '{0}'")]
    CalculatedTimePointHasUnits(String),

    #[error("ParseResult constructed with an empty error list and no program")]
    EmptyParseResult,
}
