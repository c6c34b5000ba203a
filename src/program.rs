//! The semantic program model (§4.2): what the compiler produces from the
//! CST. Distinct from `ast::CstProgram` the same way `chapaty`'s `dfa`
//! states are distinct from its raw config deserialization types — parsing
//! concerns (spans, stray stanzas) are gone, leaving only what the engine
//! needs to run a scenario.

use std::collections::HashMap;

use crate::operation::{DuringRange, Operation};
use crate::stream::Stream;

#[derive(Debug, Clone, Default)]
pub struct ParsedProgram {
    pub default_policy: ParsedPolicy,
    pub policies: HashMap<String, ParsedPolicy>,
    pub scenarios: HashMap<String, ParsedScenario>,
    pub scenario_order: Vec<String>,
    /// `define`/`set` statements at `simulations` stanza level.
    pub sim_globals: HashMap<String, crate::ast::Expr>,
}

impl ParsedProgram {
    pub fn policy(&self, name: &str) -> Option<&ParsedPolicy> {
        if name == "default" {
            Some(&self.default_policy)
        } else {
            self.policies.get(name)
        }
    }
}

/// One `default`/`policy` stanza: a set of per-application modifications
/// layered onto the applications defined so far (§4.2 "policy stacking").
#[derive(Debug, Clone, Default)]
pub struct ParsedPolicy {
    pub name: String,
    pub applications: HashMap<String, ParsedApplication>,
    pub application_order: Vec<String>,
    /// `define`/`set` statements at `default`/`policy` stanza level.
    pub globals: HashMap<String, crate::ast::Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedApplication {
    pub name: String,
    pub substances: HashMap<String, ParsedSubstance>,
    pub substance_order: Vec<String>,
    /// `define`/`set` statements at `application` level.
    pub globals: HashMap<String, crate::ast::Expr>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedSubstance {
    pub name: String,
    /// Operations in source order; the engine applies them in order for
    /// every year they're active in (§4.5).
    pub operations: Vec<(Operation, DuringRange)>,
    pub enabled_streams: Vec<Stream>,
    pub equals: Vec<(crate::ast::Expr, crate::units::BaseUnit, crate::units::BaseUnit)>,
}

#[derive(Debug, Clone)]
pub struct ParsedScenario {
    pub name: String,
    /// Policy names applied in order, `"default"` implied first.
    pub policies: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub trials: u32,
}
