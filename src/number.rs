//! `EngineNumber`: a unit-tagged decimal value (§3).

use std::fmt;

use rust_decimal::Decimal;

use crate::units::Unit;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineNumber {
    pub value: Decimal,
    pub units: Unit,
}

impl EngineNumber {
    pub fn new(value: Decimal, units: Unit) -> Self {
        Self { value, units }
    }

    pub fn scalar(value: Decimal) -> Self {
        Self { value, units: Unit::Empty }
    }
}

impl fmt::Display for EngineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.units)
        }
    }
}
