//! Per-(application, substance) working state (§3 "Engine state", §4.5).

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;

use crate::number::EngineNumber;
use crate::stream::Stream;
use crate::units::{fixed_conversion_factor, BaseUnit, Unit};

#[derive(Debug, Clone, Default)]
pub struct SubstanceState {
    pub streams: HashMap<Stream, Decimal>,
    pub enabled: HashSet<Stream>,
    pub equivalencies: HashMap<(BaseUnit, BaseUnit), Decimal>,
    pub initial_charge: HashMap<Stream, Decimal>,
    pub vars: HashMap<String, EngineNumber>,
    pub emissions: Decimal,
    pub energy: Decimal,
    /// Baseline captured the first time a percentage `cap`/`floor` runs in
    /// the current year; cleared on `increment_year` (§4.3 item 4).
    pub cap_baseline: HashMap<Stream, Decimal>,
}

impl SubstanceState {
    pub fn get(&self, stream: Stream) -> Decimal {
        if stream == Stream::Sales {
            return self.get(Stream::Manufacture) + self.get(Stream::Import) - self.get(Stream::Export);
        }
        self.streams.get(&stream).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set_raw(&mut self, stream: Stream, value: Decimal) {
        self.streams.insert(stream, value);
    }

    pub fn as_engine_number(&self, stream: Stream) -> EngineNumber {
        EngineNumber::new(self.get(stream), Unit::Base(stream.native_unit()))
    }

    /// Converts `value` into the native unit of `stream` (§4.4
    /// `changeUnits`): fixed table first, then the substance's registered
    /// equivalencies, then its `initial charge` coefficient for that stream.
    pub fn to_native(&self, stream: Stream, value: EngineNumber) -> Result<Decimal, crate::error::UnitError> {
        let native = stream.native_unit();
        let from = match value.units {
            Unit::Empty => return Ok(value.value),
            Unit::Base(b) => b,
            Unit::Compound(_, _) => {
                return Err(crate::error::UnitError::Conversion { from: value.units.to_string(), to: native.to_string() })
            }
        };
        if from == native {
            return Ok(value.value);
        }
        if let Some(factor) = fixed_conversion_factor(from, native) {
            return Ok(value.value * factor);
        }
        if let Some(factor) = self.equivalencies.get(&(from, native)) {
            return Ok(value.value * factor);
        }
        if let Some(factor) = self.equivalencies.get(&(native, from)) {
            return Ok(value.value / factor);
        }
        if (from == BaseUnit::Unit || from == BaseUnit::Units) && native == BaseUnit::Kg {
            if let Some(coef) = self.initial_charge.get(&stream) {
                return Ok(value.value * coef);
            }
        }
        if from == BaseUnit::Kg && (native == BaseUnit::Unit || native == BaseUnit::Units) {
            if let Some(coef) = self.initial_charge.get(&stream) {
                if !coef.is_zero() {
                    return Ok(value.value / coef);
                }
            }
        }
        Err(crate::error::UnitError::Conversion { from: from.to_string(), to: native.to_string() })
    }

    pub fn to_tco2e(&self, value: EngineNumber) -> Decimal {
        match value.units {
            Unit::Empty => value.value,
            Unit::Base(BaseUnit::TCo2e) => value.value,
            Unit::Base(from) => {
                if let Some(factor) = self.equivalencies.get(&(BaseUnit::TCo2e, from)) {
                    value.value * factor
                } else if let Some(factor) = self.equivalencies.get(&(from, BaseUnit::TCo2e)) {
                    value.value / factor
                } else {
                    value.value
                }
            }
            Unit::Compound(_, _) => value.value,
        }
    }

    pub fn reset_year_flows(&mut self) {
        self.streams.remove(&Stream::Manufacture);
        self.streams.remove(&Stream::Import);
        self.streams.remove(&Stream::Export);
        self.emissions = Decimal::ZERO;
        self.energy = Decimal::ZERO;
        self.cap_baseline.clear();
    }

    pub fn promote_equipment(&mut self) {
        let equipment = self.get(Stream::Equipment);
        self.streams.insert(Stream::PriorEquipment, equipment);
    }
}
