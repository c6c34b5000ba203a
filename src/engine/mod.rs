//! The stream engine (§4.5): owns per-(application, substance, year) state,
//! replays `Operation`s for a scenario's year range, and materializes
//! `EngineResult` rows. One `Engine` runs exactly one scenario, matching
//! the single-threaded, one-scenario-at-a-time model of §5.

pub mod result;
pub mod state;

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::ast::Expr;
use crate::config::EngineConfig;
use crate::error::{QubecError, StreamError};
use crate::machine::{self, EvalContext, Machine};
use crate::number::EngineNumber;
use crate::operation::Operation;
use crate::program::{ParsedProgram, ParsedScenario};
use crate::rng::{MeanRng, Rng};
use crate::stream::Stream;
use crate::units::Unit;

pub use result::EngineResult;
use state::SubstanceState;

type Key = (String, String);

pub struct Engine<'p> {
    config: &'p EngineConfig,
    states: HashMap<Key, SubstanceState>,
    /// Read-only copy of `states` as of the start of the current year, used
    /// to serve cross-substance `get` reads (§9 snapshot semantics).
    snapshot: HashMap<Key, SubstanceState>,
    /// `define`/`set` globals from the `simulations`, `default`/`policy`, and
    /// `application` stanzas, resolved once per scenario run and visible to
    /// any expression that doesn't shadow them with a substance-local `define`
    /// (§4.2 "global statements compile to an implicit scope").
    globals: HashMap<String, EngineNumber>,
    year: i32,
}

struct Ctx<'a, 'p> {
    engine: &'a Engine<'p>,
    current: &'a Key,
}

impl<'a, 'p> EvalContext for Ctx<'a, 'p> {
    fn lookup_var(&self, name: &str) -> Option<EngineNumber> {
        self.engine
            .states
            .get(self.current)
            .and_then(|s| s.vars.get(name).copied())
            .or_else(|| self.engine.globals.get(name).copied())
    }

    fn get_stream(&self, stream: Stream, substance: &str, application: Option<&str>) -> Result<EngineNumber, StreamError> {
        let app = application.unwrap_or(&self.current.0);
        let key = (app.to_string(), substance.to_string());
        if &key == self.current {
            let state = self.engine.states.get(&key).expect("current substance must be initialized");
            if !state.enabled.contains(&stream) && !stream.is_derived() {
                return Ok(EngineNumber::new(Decimal::ZERO, Unit::Base(stream.native_unit())));
            }
            return Ok(state.as_engine_number(stream));
        }
        match self.engine.snapshot.get(&key) {
            Some(state) => Ok(state.as_engine_number(stream)),
            None if self.engine.config.strict => {
                Err(StreamError::UndefinedReference { substance: substance.to_string(), application: application.map(str::to_string) })
            }
            None => {
                tracing::warn!(substance, ?application, "read of undefined reference, yielding zero");
                Ok(EngineNumber::new(Decimal::ZERO, Unit::Base(stream.native_unit())))
            }
        }
    }
}

impl<'p> Engine<'p> {
    pub fn new(config: &'p EngineConfig, start_year: i32) -> Self {
        Self { config, states: HashMap::new(), snapshot: HashMap::new(), globals: HashMap::new(), year: start_year }
    }

    /// Resolves `sim_globals`, then each active policy's globals, then each
    /// touched application's globals, in that outer-to-inner order so an
    /// application-level `define` shadows a same-named simulations-level one.
    fn resolve_globals(&mut self, program: &'p ParsedProgram, policy_names: &[&str], rng: &mut dyn Rng) -> Result<(), QubecError> {
        let empty_key: Key = (String::new(), String::new());
        self.ensure_state("", "");
        for (name, expr) in &program.sim_globals {
            let v = self.eval_expr(&empty_key, expr, rng)?;
            self.globals.insert(name.clone(), v);
        }
        for policy_name in policy_names {
            let policy = program.policy(policy_name).expect("policy name already validated by run_scenario");
            for (name, expr) in &policy.globals {
                let v = self.eval_expr(&empty_key, expr, rng)?;
                self.globals.insert(name.clone(), v);
            }
            for app in policy.applications.values() {
                for (name, expr) in &app.globals {
                    let v = self.eval_expr(&empty_key, expr, rng)?;
                    self.globals.insert(name.clone(), v);
                }
            }
        }
        self.states.remove(&empty_key);
        Ok(())
    }

    /// Runs `scenario` end to end and returns its `EngineResult` rows,
    /// ordered by (application, substance, year) for determinism.
    pub fn run_scenario(
        program: &'p ParsedProgram,
        scenario: &ParsedScenario,
        config: &'p EngineConfig,
    ) -> Result<Vec<EngineResult>, QubecError> {
        let mut engine = Engine::new(config, scenario.start_year);
        let mut rng: Box<dyn Rng> = match config.seed {
            Some(seed) if scenario.trials > 1 => Box::new(crate::rng::SeededRng::new(seed)),
            _ => Box::new(MeanRng),
        };

        let mut results = Vec::new();
        let policy_names: Vec<&str> = std::iter::once("default").chain(scenario.policies.iter().map(String::as_str)).collect();
        engine.resolve_globals(program, &policy_names, rng.as_mut())?;

        for year in scenario.start_year..=scenario.end_year {
            engine.year = year;
            engine.snapshot = engine.states.clone();
            for name in &policy_names {
                let policy = program.policy(name).ok_or_else(|| {
                    QubecError::Compile(crate::error::CompileError::UndefinedPolicy {
                        scenario: scenario.name.clone(),
                        policy: (*name).to_string(),
                    })
                })?;
                for app_name in &policy.application_order {
                    let app = &policy.applications[app_name];
                    for sub_name in &app.substance_order {
                        let sub = &app.substances[sub_name];
                        engine.ensure_state(app_name, sub_name);
                        for (equals_expr, numer, denom) in &sub.equals {
                            let value = engine.eval_static(app_name, sub_name, equals_expr, rng.as_mut())?;
                            let state = engine.states.get_mut(&(app_name.clone(), sub_name.clone())).unwrap();
                            state.equivalencies.insert((*numer, *denom), value.value);
                        }
                        for stream in &sub.enabled_streams {
                            engine.states.get_mut(&(app_name.clone(), sub_name.clone())).unwrap().enabled.insert(*stream);
                        }
                        for (op, during) in &sub.operations {
                            if during.contains(year) {
                                engine.apply_operation(app_name, sub_name, op, rng.as_mut())?;
                            }
                        }
                    }
                }
            }
            results.extend(engine.snapshot_year(year));
            engine.increment_year();
        }

        results.sort_by(|a, b| (a.application.as_str(), a.substance.as_str(), a.year).cmp(&(b.application.as_str(), b.substance.as_str(), b.year)));
        Ok(results)
    }

    fn ensure_state(&mut self, app: &str, sub: &str) {
        let key = (app.to_string(), sub.to_string());
        self.states.entry(key).or_default();
    }

    fn eval_static(&mut self, app: &str, sub: &str, expr: &Expr, rng: &mut dyn Rng) -> Result<EngineNumber, QubecError> {
        let key = (app.to_string(), sub.to_string());
        let mut machine = Machine::new(rng);
        let ctx = Ctx { engine: self, current: &key };
        machine::eval(&mut machine, &ctx, expr)
    }

    fn apply_operation(&mut self, app: &str, sub: &str, op: &Operation, rng: &mut dyn Rng) -> Result<(), QubecError> {
        let key = (app.to_string(), sub.to_string());

        match op {
            Operation::Define { name, value } => {
                let v = self.eval_expr(&key, value, rng)?;
                self.states.get_mut(&key).unwrap().vars.insert(name.clone(), v);
            }
            Operation::Set { target, value } => {
                let v = self.eval_expr(&key, value, rng)?;
                self.write_stream(&key, *target, v)?;
            }
            Operation::Change { target, value } => {
                let v = self.eval_expr(&key, value, rng)?;
                let state = self.states.get_mut(&key).unwrap();
                let delta = if matches!(v.units, Unit::Base(crate::units::BaseUnit::Percent)) {
                    state.get(*target) * v.value / Decimal::from(100)
                } else {
                    state.to_native(*target, v)?
                };
                self.guard_writable(&key, *target)?;
                let state = self.states.get_mut(&key).unwrap();
                let new_value = state.get(*target) + delta;
                state.set_raw(*target, new_value);
            }
            Operation::Cap { target, value } => {
                let v = self.eval_expr(&key, value, rng)?;
                self.apply_clamp(&key, *target, v, true)?;
            }
            Operation::Floor { target, value, displacing } => {
                let v = self.eval_expr(&key, value, rng)?;
                let before = self.states[&key].get(*target);
                self.apply_clamp(&key, *target, v, false)?;
                let after = self.states[&key].get(*target);
                let increase = after - before;
                if increase > Decimal::ZERO {
                    if let Some(other_sub) = displacing {
                        self.subtract_from(&key.0, other_sub, *target, increase);
                    }
                }
            }
            Operation::Replace { volume, target, destination } => {
                let v = self.eval_expr(&key, volume, rng)?;
                let state = &self.states[&key];
                let amount = state.to_native(*target, v)?;
                self.transfer(&key.0, sub, destination, *target, amount)?;
            }
            Operation::Retire { volume } => {
                let v = self.eval_expr(&key, volume, rng)?;
                let state = self.states.get_mut(&key).unwrap();
                let amount = state.to_native(Stream::Equipment, v)?;
                let new_value = (state.get(Stream::Equipment) - amount).max(Decimal::ZERO);
                state.set_raw(Stream::Equipment, new_value);
            }
            Operation::Recharge { population_pct, per_unit_volume } => {
                let pct = self.eval_expr(&key, population_pct, rng)?;
                let per_unit = self.eval_expr(&key, per_unit_volume, rng)?;
                let state = self.states.get_mut(&key).unwrap();
                let prior = state.get(Stream::PriorEquipment);
                let fraction = if matches!(pct.units, Unit::Base(crate::units::BaseUnit::Percent)) {
                    pct.value / Decimal::from(100)
                } else {
                    pct.value
                };
                let demand = prior * fraction * per_unit.value;
                let new_manufacture = state.get(Stream::Manufacture) + demand;
                state.set_raw(Stream::Manufacture, new_manufacture);
                let emitted = state.to_tco2e(EngineNumber::new(demand, Unit::Base(crate::units::BaseUnit::Kg)));
                state.emissions += emitted;
            }
            Operation::Recover { volume, yield_fraction } => {
                let v = self.eval_expr(&key, volume, rng)?;
                let y = self.eval_expr(&key, yield_fraction, rng)?;
                let state = self.states.get_mut(&key).unwrap();
                let volume_kg = state.to_native(Stream::Manufacture, v)?;
                let fraction = if matches!(y.units, Unit::Base(crate::units::BaseUnit::Percent)) {
                    y.value / Decimal::from(100)
                } else {
                    y.value
                };
                let reclaimed = volume_kg * fraction;
                let new_manufacture = (state.get(Stream::Manufacture) - reclaimed).max(Decimal::ZERO);
                state.set_raw(Stream::Manufacture, new_manufacture);
            }
            Operation::InitialCharge { per_unit_volume, stream } => {
                let v = self.eval_expr(&key, per_unit_volume, rng)?;
                self.states.get_mut(&key).unwrap().initial_charge.insert(*stream, v.value);
            }
            Operation::Emit { value } => {
                let v = self.eval_expr(&key, value, rng)?;
                let state = self.states.get_mut(&key).unwrap();
                let amount = state.to_tco2e(v);
                state.emissions += amount;
            }
        }
        Ok(())
    }

    fn eval_expr(&mut self, key: &Key, expr: &Expr, rng: &mut dyn Rng) -> Result<EngineNumber, QubecError> {
        let mut machine = Machine::new(rng);
        let ctx = Ctx { engine: self, current: key };
        machine::eval(&mut machine, &ctx, expr)
    }

    fn guard_writable(&self, key: &Key, stream: Stream) -> Result<(), QubecError> {
        if stream.is_derived() {
            return Ok(());
        }
        let state = &self.states[key];
        if state.enabled.is_empty() || state.enabled.contains(&stream) {
            Ok(())
        } else {
            Err(QubecError::Stream(StreamError::UndefinedStream { stream: stream.to_string(), substance: key.1.clone() }))
        }
    }

    fn write_stream(&mut self, key: &Key, target: Stream, value: EngineNumber) -> Result<(), QubecError> {
        self.guard_writable(key, target)?;
        let state = self.states.get_mut(key).unwrap();
        let native = state.to_native(target, value)?;
        state.set_raw(target, native);
        Ok(())
    }

    fn apply_clamp(&mut self, key: &Key, target: Stream, value: EngineNumber, is_cap: bool) -> Result<(), QubecError> {
        self.guard_writable(key, target)?;
        let state = self.states.get_mut(key).unwrap();
        let current = state.get(target);
        let baseline = *state.cap_baseline.entry(target).or_insert(current);
        let limit = if matches!(value.units, Unit::Base(crate::units::BaseUnit::Percent)) {
            baseline * value.value / Decimal::from(100)
        } else {
            state.to_native(target, value)?
        };
        let new_value = if is_cap { current.min(limit) } else { current.max(limit) };
        state.set_raw(target, new_value);
        Ok(())
    }

    /// Reduces `other_sub`'s stream by `amount` without crediting it
    /// anywhere else (§4.3 item 5, `floor ... displacing`): the displaced
    /// volume is assumed absorbed elsewhere in the market, not tracked.
    fn subtract_from(&mut self, app: &str, other_sub: &str, stream: Stream, amount: Decimal) {
        let key = (app.to_string(), other_sub.to_string());
        let state = self.states.entry(key).or_default();
        let new_value = (state.get(stream) - amount).max(Decimal::ZERO);
        state.set_raw(stream, new_value);
    }

    fn transfer(&mut self, app: &str, from_sub: &str, to_sub: &str, stream: Stream, amount_kg: Decimal) -> Result<(), QubecError> {
        let from_key = (app.to_string(), from_sub.to_string());
        let to_key = (app.to_string(), to_sub.to_string());
        if let Some(state) = self.states.get_mut(&from_key) {
            let new_value = (state.get(stream) - amount_kg).max(Decimal::ZERO);
            state.set_raw(stream, new_value);
        }
        self.states.entry(to_key.clone()).or_default();
        let state = self.states.get_mut(&to_key).unwrap();
        let new_value = state.get(stream) + amount_kg;
        state.set_raw(stream, new_value);
        Ok(())
    }

    fn snapshot_year(&self, year: i32) -> Vec<EngineResult> {
        let mut rows = Vec::new();
        for ((app, sub), state) in &self.states {
            rows.push(EngineResult {
                application: app.clone(),
                substance: sub.clone(),
                year,
                manufacture: state.get(Stream::Manufacture),
                import: state.get(Stream::Import),
                export: state.get(Stream::Export),
                sales: state.get(Stream::Sales),
                equipment: state.get(Stream::Equipment),
                prior_equipment: state.get(Stream::PriorEquipment),
                emissions: state.emissions,
                energy: state.energy,
            });
        }
        rows
    }

    fn increment_year(&mut self) {
        for state in self.states.values_mut() {
            state.promote_equipment();
            state.reset_year_flows();
        }
        self.year += 1;
    }
}
