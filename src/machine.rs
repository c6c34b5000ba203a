//! The push-down machine (§4.4): evaluates an `ast::Expr` against an
//! explicit `Vec<EngineNumber>` stack rather than folding it with plain
//! recursion-as-arithmetic, so every primitive the grammar allows —
//! `add`/`sub`/`mul`/`div`/`pow`/`changeUnits`/`sampleNormal`/
//! `sampleUniform`/`limit` — is one push/pop pair, mirroring the explicit
//! state-stack style `chapaty::dfa` uses for its own transition machine.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::ast::{BinOp, CmpOp, Expr};
use crate::error::{InvariantError, UnitError};
use crate::number::EngineNumber;
use crate::rng::Rng;
use crate::stream::Stream;
use crate::units::{fixed_conversion_factor, Unit};

/// What the machine needs from its caller to resolve `define`d variables
/// and `get ... of ...` cross-substance reads (§4.5 "snapshot at year start").
pub trait EvalContext {
    fn lookup_var(&self, name: &str) -> Option<EngineNumber>;
    fn get_stream(
        &self,
        stream: Stream,
        substance: &str,
        application: Option<&str>,
    ) -> Result<EngineNumber, crate::error::StreamError>;
}

pub struct Machine<'a> {
    stack: Vec<EngineNumber>,
    rng: &'a mut dyn Rng,
}

impl<'a> Machine<'a> {
    pub fn new(rng: &'a mut dyn Rng) -> Self {
        Self { stack: Vec::new(), rng }
    }

    pub fn push(&mut self, n: EngineNumber) {
        self.stack.push(n);
    }

    pub fn pop(&mut self) -> Result<EngineNumber, InvariantError> {
        self.stack.pop().ok_or(InvariantError::EmptyStack)
    }

    /// Drains the stack; errors unless exactly one value remains (§4.4
    /// `getResult`).
    pub fn get_result(mut self) -> Result<EngineNumber, InvariantError> {
        match self.stack.len() {
            1 => Ok(self.stack.pop().unwrap()),
            n => Err(InvariantError::MultiElementStack(n)),
        }
    }

    pub fn add(&mut self) -> Result<(), UnitError> {
        let b = self.pop_unchecked();
        let a = self.pop_unchecked();
        let (a, b) = harmonize(a, b)?;
        self.push(EngineNumber::new(a.value + b.value, a.units));
        Ok(())
    }

    pub fn sub(&mut self) -> Result<(), UnitError> {
        let b = self.pop_unchecked();
        let a = self.pop_unchecked();
        let (a, b) = harmonize(a, b)?;
        self.push(EngineNumber::new(a.value - b.value, a.units));
        Ok(())
    }

    pub fn mul(&mut self) -> Result<(), UnitError> {
        let b = self.pop_unchecked();
        let a = self.pop_unchecked();
        let units = if a.units.is_empty() {
            b.units
        } else if b.units.is_empty() {
            a.units
        } else {
            return Err(UnitError::Mismatch { left: a.units.to_string(), right: b.units.to_string() });
        };
        self.push(EngineNumber::new(a.value * b.value, units));
        Ok(())
    }

    pub fn div(&mut self) -> Result<(), UnitError> {
        let b = self.pop_unchecked();
        let a = self.pop_unchecked();
        let units = if b.units.is_empty() {
            a.units
        } else if a.units.is_empty() {
            b.units
        } else {
            return Err(UnitError::Mismatch { left: a.units.to_string(), right: b.units.to_string() });
        };
        self.push(EngineNumber::new(a.value / b.value, units));
        Ok(())
    }

    pub fn pow(&mut self) -> Result<(), UnitError> {
        let b = self.pop_unchecked();
        let a = self.pop_unchecked();
        if !b.units.is_empty() {
            return Err(UnitError::Mismatch { left: a.units.to_string(), right: b.units.to_string() });
        }
        let exp = b.value.to_f64().unwrap_or(0.0);
        let base = a.value.to_f64().unwrap_or(0.0);
        let result = Decimal::from_f64_retain(base.powf(exp)).unwrap_or(Decimal::ZERO);
        self.push(EngineNumber::new(result, a.units));
        Ok(())
    }

    pub fn change_units(&mut self, target: Unit) -> Result<(), UnitError> {
        let a = self.pop_unchecked();
        let converted = convert(a, target)?;
        self.push(converted);
        Ok(())
    }

    pub fn sample_normal(&mut self) -> Result<(), InvariantError> {
        let std = self.pop()?;
        let mean = self.pop()?;
        let value = self.rng.sample_normal(mean.value, std.value);
        self.push(EngineNumber::new(value, mean.units));
        Ok(())
    }

    pub fn sample_uniform(&mut self) -> Result<(), InvariantError> {
        let high = self.pop()?;
        let low = self.pop()?;
        let value = self.rng.sample_uniform(low.value, high.value);
        self.push(EngineNumber::new(value, low.units));
        Ok(())
    }

    pub fn limit(&mut self, has_lo: bool, has_hi: bool) -> Result<(), InvariantError> {
        let hi = if has_hi { Some(self.pop()?) } else { None };
        let lo = if has_lo { Some(self.pop()?) } else { None };
        let x = self.pop()?;
        let mut value = x.value;
        if let Some(lo) = &lo {
            value = value.max(lo.value);
        }
        if let Some(hi) = &hi {
            value = value.min(hi.value);
        }
        self.push(EngineNumber::new(value, x.units));
        Ok(())
    }

    fn pop_unchecked(&mut self) -> EngineNumber {
        self.stack.pop().unwrap_or_else(|| EngineNumber::scalar(Decimal::ZERO))
    }
}

fn harmonize(a: EngineNumber, b: EngineNumber) -> Result<(EngineNumber, EngineNumber), UnitError> {
    if a.units == b.units || b.units.is_empty() {
        Ok((a, EngineNumber::new(b.value, a.units)))
    } else if a.units.is_empty() {
        Ok((EngineNumber::new(a.value, b.units), b))
    } else {
        Ok((a, convert(b, a.units)?))
    }
}

fn convert(n: EngineNumber, target: Unit) -> Result<EngineNumber, UnitError> {
    if n.units == target {
        return Ok(EngineNumber::new(n.value, target));
    }
    match (n.units, target) {
        (Unit::Base(from), Unit::Base(to)) => {
            let factor = fixed_conversion_factor(from, to)
                .ok_or_else(|| UnitError::Conversion { from: from.to_string(), to: to.to_string() })?;
            Ok(EngineNumber::new(n.value * factor, target))
        }
        (Unit::Empty, _) | (_, Unit::Empty) => Ok(EngineNumber::new(n.value, target)),
        _ => Err(UnitError::Conversion { from: n.units.to_string(), to: target.to_string() }),
    }
}

/// Evaluate `expr` against `ctx`, pushing one value via `machine` and
/// returning it. Recursion drives tree traversal; every arithmetic/sampling
/// primitive still goes through the machine's explicit stack operations.
pub fn eval(
    machine: &mut Machine,
    ctx: &dyn EvalContext,
    expr: &Expr,
) -> Result<EngineNumber, crate::error::QubecError> {
    match expr {
        Expr::Num(n) => {
            let v = EngineNumber::scalar(*n);
            machine.push(v);
            Ok(machine.pop()?)
        }
        Expr::WithUnit(inner, unit) => {
            let v = eval(machine, ctx, inner)?;
            machine.push(EngineNumber::new(v.value, *unit));
            Ok(machine.pop()?)
        }
        Expr::Var(name) => {
            let v = ctx
                .lookup_var(name)
                .ok_or_else(|| crate::error::StreamError::UndefinedReference { substance: name.clone(), application: None })?;
            machine.push(v);
            Ok(machine.pop()?)
        }
        Expr::Get { stream, substance, application } => {
            let v = ctx.get_stream(*stream, substance, application.as_deref())?;
            machine.push(v);
            Ok(machine.pop()?)
        }
        Expr::Neg(inner) => {
            let v = eval(machine, ctx, inner)?;
            machine.push(EngineNumber::new(-v.value, v.units));
            Ok(machine.pop()?)
        }
        Expr::BinOp(op, left, right) => {
            let l = eval(machine, ctx, left)?;
            let r = eval(machine, ctx, right)?;
            machine.push(l);
            machine.push(r);
            match op {
                BinOp::Add => machine.add()?,
                BinOp::Sub => machine.sub()?,
                BinOp::Mul => machine.mul()?,
                BinOp::Div => machine.div()?,
                BinOp::Pow => machine.pow()?,
            }
            Ok(machine.pop()?)
        }
        Expr::Cmp(op, left, right) => {
            let l = eval(machine, ctx, left)?;
            let r = eval(machine, ctx, right)?;
            let (l, r) = harmonize(l, r)?;
            let truth = match op {
                CmpOp::Eq => l.value == r.value,
                CmpOp::Ne => l.value != r.value,
                CmpOp::Lt => l.value < r.value,
                CmpOp::Le => l.value <= r.value,
                CmpOp::Gt => l.value > r.value,
                CmpOp::Ge => l.value >= r.value,
            };
            Ok(EngineNumber::scalar(if truth { Decimal::ONE } else { Decimal::ZERO }))
        }
        Expr::If { cond, then_branch, else_branch } => {
            let c = eval(machine, ctx, cond)?;
            if c.value != Decimal::ZERO {
                eval(machine, ctx, then_branch)
            } else {
                eval(machine, ctx, else_branch)
            }
        }
        Expr::SampleNormal { mean, std } => {
            let m = eval(machine, ctx, mean)?;
            let s = eval(machine, ctx, std)?;
            machine.push(m);
            machine.push(s);
            machine.sample_normal()?;
            Ok(machine.pop()?)
        }
        Expr::SampleUniform { low, high } => {
            let l = eval(machine, ctx, low)?;
            let h = eval(machine, ctx, high)?;
            machine.push(l);
            machine.push(h);
            machine.sample_uniform()?;
            Ok(machine.pop()?)
        }
        Expr::Limit { x, lo, hi } => {
            let xv = eval(machine, ctx, x)?;
            machine.push(xv);
            if let Some(lo) = lo {
                let lov = eval(machine, ctx, lo)?;
                machine.push(lov);
            }
            if let Some(hi) = hi {
                let hiv = eval(machine, ctx, hi)?;
                machine.push(hiv);
            }
            machine.limit(lo.is_some(), hi.is_some())?;
            Ok(machine.pop()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::MeanRng;

    struct EmptyCtx;
    impl EvalContext for EmptyCtx {
        fn lookup_var(&self, _name: &str) -> Option<EngineNumber> {
            None
        }
        fn get_stream(
            &self,
            _stream: Stream,
            _substance: &str,
            _application: Option<&str>,
        ) -> Result<EngineNumber, crate::error::StreamError> {
            unreachable!()
        }
    }

    #[test]
    fn adds_compatible_units() {
        let mut rng = MeanRng;
        let mut m = Machine::new(&mut rng);
        let expr = Expr::BinOp(
            BinOp::Add,
            Box::new(Expr::WithUnit(Box::new(Expr::Num(Decimal::from(1))), Unit::Base(crate::units::BaseUnit::Kg))),
            Box::new(Expr::WithUnit(Box::new(Expr::Num(Decimal::from(2))), Unit::Base(crate::units::BaseUnit::Kg))),
        );
        let result = eval(&mut m, &EmptyCtx, &expr).unwrap();
        assert_eq!(result.value, Decimal::from(3));
    }

    #[test]
    fn converts_mt_to_kg() {
        let mut rng = MeanRng;
        let mut m = Machine::new(&mut rng);
        let one_mt = EngineNumber::new(Decimal::ONE, Unit::Base(crate::units::BaseUnit::Mt));
        m.push(one_mt);
        m.change_units(Unit::Base(crate::units::BaseUnit::Kg)).unwrap();
        let result = m.pop().unwrap();
        assert_eq!(result.value, Decimal::from(1000));
    }

    #[test]
    fn limit_clamps_both_sides() {
        let mut rng = MeanRng;
        let mut m = Machine::new(&mut rng);
        let expr = Expr::Limit {
            x: Box::new(Expr::Num(Decimal::from(50))),
            lo: Some(Box::new(Expr::Num(Decimal::from(0)))),
            hi: Some(Box::new(Expr::Num(Decimal::from(10)))),
        };
        let result = eval(&mut m, &EmptyCtx, &expr).unwrap();
        assert_eq!(result.value, Decimal::from(10));
    }
}
