//! CST → `ParsedProgram` (§4.2). Walks `ast::CstProgram`, applying policy
//! stacking (a `modify application`/`modify substance` layers its statements
//! onto whatever `default` already defined) and collecting the structural
//! validation errors in §7 (`duplicate name`, `undefined policy`, the
//! reserved `"default"` name, malformed `during` clauses).

use crate::ast::*;
use crate::error::CompileError;
use crate::operation::{DuringRange, Operation};
use crate::program::{ParsedApplication, ParsedPolicy, ParsedProgram, ParsedScenario, ParsedSubstance};

pub fn compile(cst: &CstProgram) -> Result<ParsedProgram, Vec<CompileError>> {
    let mut program = ParsedProgram::default();
    let mut errors = Vec::new();

    for stanza in &cst.stanzas {
        match stanza {
            Stanza::About => {}
            Stanza::Default(items) => {
                program.default_policy.name = "default".to_string();
                apply_app_items(&mut program.default_policy, items, &mut errors);
            }
            Stanza::Policy(name, items) => {
                if name == "default" {
                    errors.push(CompileError::ReservedDefaultName);
                    continue;
                }
                if program.policies.contains_key(name) {
                    errors.push(CompileError::DuplicateName { kind: "policy", name: name.clone() });
                    continue;
                }
                let mut policy = ParsedPolicy { name: name.clone(), ..Default::default() };
                apply_app_items(&mut policy, items, &mut errors);
                program.policies.insert(name.clone(), policy);
            }
            Stanza::Simulations(items) => {
                for item in items {
                    match item {
                        SimItem::Simulate(def) => {
                            if program.scenarios.contains_key(&def.name) {
                                errors.push(CompileError::DuplicateName { kind: "scenario", name: def.name.clone() });
                                continue;
                            }
                            for policy in &def.policies {
                                if policy != "default" && !cst_defines_policy(cst, policy) {
                                    errors.push(CompileError::UndefinedPolicy {
                                        scenario: def.name.clone(),
                                        policy: policy.clone(),
                                    });
                                }
                            }
                            program.scenario_order.push(def.name.clone());
                            program.scenarios.insert(
                                def.name.clone(),
                                ParsedScenario {
                                    name: def.name.clone(),
                                    policies: def.policies.clone(),
                                    start_year: def.start_year,
                                    end_year: def.end_year,
                                    trials: def.trials,
                                },
                            );
                        }
                        SimItem::Global(GlobalStmt::Define(name, value) | GlobalStmt::Set(name, value)) => {
                            program.sim_globals.insert(name.clone(), value.clone());
                        }
                    }
                }
            }
        }
    }

    if program.policies.is_empty() && program.default_policy.applications.is_empty() && !has_default_stanza(cst) {
        errors.push(CompileError::MissingDefaultPolicy);
    }

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

fn has_default_stanza(cst: &CstProgram) -> bool {
    cst.stanzas.iter().any(|s| matches!(s, Stanza::Default(_)))
}

fn cst_defines_policy(cst: &CstProgram, name: &str) -> bool {
    cst.stanzas.iter().any(|s| matches!(s, Stanza::Policy(n, _) if n == name))
}

fn apply_app_items(policy: &mut ParsedPolicy, items: &[AppItem], errors: &mut Vec<CompileError>) {
    for item in items {
        match item {
            AppItem::Define(body) => {
                if policy.applications.contains_key(&body.name) {
                    errors.push(CompileError::DuplicateName { kind: "application", name: body.name.clone() });
                    continue;
                }
                let app = build_application(body, errors);
                policy.application_order.push(body.name.clone());
                policy.applications.insert(body.name.clone(), app);
            }
            AppItem::Modify(body) => {
                let app = policy.applications.entry(body.name.clone()).or_insert_with(|| {
                    policy.application_order.push(body.name.clone());
                    ParsedApplication { name: body.name.clone(), ..Default::default() }
                });
                merge_substance_items(app, &body.substances, errors);
            }
            AppItem::Global(GlobalStmt::Define(name, value) | GlobalStmt::Set(name, value)) => {
                policy.globals.insert(name.clone(), value.clone());
            }
        }
    }
}

fn build_application(body: &AppBody, errors: &mut Vec<CompileError>) -> ParsedApplication {
    let mut app = ParsedApplication { name: body.name.clone(), ..Default::default() };
    merge_substance_items(&mut app, &body.substances, errors);
    app
}

fn merge_substance_items(app: &mut ParsedApplication, items: &[SubstanceItem], errors: &mut Vec<CompileError>) {
    for item in items {
        match item {
            SubstanceItem::Substance(body) => {
                let substance = app.substances.entry(body.name.clone()).or_insert_with(|| {
                    app.substance_order.push(body.name.clone());
                    ParsedSubstance { name: body.name.clone(), ..Default::default() }
                });
                for stmt in &body.statements {
                    if let Err(e) = apply_stmt(substance, stmt) {
                        errors.push(e);
                    }
                }
            }
            SubstanceItem::Global(GlobalStmt::Define(name, value) | GlobalStmt::Set(name, value)) => {
                app.globals.insert(name.clone(), value.clone());
            }
        }
    }
}

fn apply_stmt(substance: &mut ParsedSubstance, stmt: &Stmt) -> Result<(), CompileError> {
    match stmt {
        Stmt::Set { target, value, during } => {
            substance.operations.push((Operation::Set { target: *target, value: value.clone() }, resolve_during(during)?));
        }
        Stmt::Change { target, value, during } => {
            substance.operations.push((Operation::Change { target: *target, value: value.clone() }, resolve_during(during)?));
        }
        Stmt::Cap { target, value, during } => {
            substance.operations.push((Operation::Cap { target: *target, value: value.clone() }, resolve_during(during)?));
        }
        Stmt::Floor { target, value, displacing, during } => {
            substance.operations.push((
                Operation::Floor { target: *target, value: value.clone(), displacing: displacing.clone() },
                resolve_during(during)?,
            ));
        }
        Stmt::Replace { volume, target, destination, during } => {
            substance.operations.push((
                Operation::Replace { volume: volume.clone(), target: *target, destination: destination.clone() },
                resolve_during(during)?,
            ));
        }
        Stmt::Retire { volume, during } => {
            substance.operations.push((Operation::Retire { volume: volume.clone() }, resolve_during(during)?));
        }
        Stmt::Recharge { population_pct, per_unit_volume, during } => {
            substance.operations.push((
                Operation::Recharge { population_pct: population_pct.clone(), per_unit_volume: per_unit_volume.clone() },
                resolve_during(during)?,
            ));
        }
        Stmt::Recover { volume, yield_fraction, during } => {
            substance.operations.push((
                Operation::Recover { volume: volume.clone(), yield_fraction: yield_fraction.clone() },
                resolve_during(during)?,
            ));
        }
        Stmt::InitialCharge { per_unit_volume, stream, during } => {
            substance.operations.push((
                Operation::InitialCharge { per_unit_volume: per_unit_volume.clone(), stream: *stream },
                resolve_during(during)?,
            ));
        }
        Stmt::Emit { value, during } => {
            substance.operations.push((Operation::Emit { value: value.clone() }, resolve_during(during)?));
        }
        Stmt::Enable { stream } => {
            if !substance.enabled_streams.contains(stream) {
                substance.enabled_streams.push(*stream);
            }
        }
        Stmt::Equals { factor, numerator, denominator } => {
            substance.equals.push((factor.clone(), *numerator, *denominator));
        }
        Stmt::Define(name, value) => {
            substance.operations.push((Operation::Define { name: name.clone(), value: value.clone() }, DuringRange::always()));
        }
    }
    Ok(())
}

/// Lowers a CST `During` into a `DuringRange` with only literal bounds
/// resolved; `beginning`/`onwards`/calculated bounds all collapse to an open
/// (`None`) bound. For `beginning`/`onwards` that's exact: "unconstrained" is
/// already the correct reading. For a `calculated` bound (an expression) it
/// is a known simplification — the expression is never evaluated, so such a
/// clause is treated as always-open rather than resolved against the
/// scenario (see DESIGN.md).
fn resolve_during(during: &During) -> Result<DuringRange, CompileError> {
    let start = match &during.start {
        None => None,
        Some(TimePointFuture::Literal(y)) => Some(*y),
        Some(TimePointFuture::Dynamic(_)) => None,
        Some(TimePointFuture::Calculated(_)) => None,
    };
    let end = match &during.end {
        None => None,
        Some(TimePointFuture::Literal(y)) => Some(*y),
        Some(TimePointFuture::Dynamic(_)) => None,
        Some(TimePointFuture::Calculated(_)) => None,
    };
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(CompileError::MalformedDuring(format!("start year {s} is after end year {e}")));
        }
    }
    Ok(DuringRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_default_as_policy_name() {
        let cst = CstProgram { stanzas: vec![Stanza::Policy("default".to_string(), vec![])] };
        let errs = compile(&cst).unwrap_err();
        assert!(matches!(errs[0], CompileError::ReservedDefaultName));
    }

    #[test]
    fn detects_duplicate_policy_names() {
        let cst = CstProgram {
            stanzas: vec![
                Stanza::Policy("p".to_string(), vec![]),
                Stanza::Policy("p".to_string(), vec![]),
            ],
        };
        let errs = compile(&cst).unwrap_err();
        assert!(matches!(&errs[0], CompileError::DuplicateName { name, .. } if name == "p"));
    }

    #[test]
    fn detects_undefined_policy_reference() {
        let cst = CstProgram {
            stanzas: vec![Stanza::Simulations(vec![SimItem::Simulate(SimulateDef {
                name: "s".to_string(),
                policies: vec!["missing".to_string()],
                start_year: 1,
                end_year: 2,
                trials: 1,
            })])],
        };
        let errs = compile(&cst).unwrap_err();
        assert!(matches!(&errs[0], CompileError::UndefinedPolicy { policy, .. } if policy == "missing"));
    }
}
