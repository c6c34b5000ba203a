//! Unit vocabulary and the fixed exact-conversion table (§4.4).
//!
//! `BaseUnit` is the closed keyword vocabulary from the grammar (§6.1); it
//! derives `EnumString`/`Display` the way `chapaty::enums` derives string
//! conversions for its keyword enums (`BotKind`, column-name enums) instead
//! of hand-rolling `FromStr`/`fmt::Display` bodies.

use std::fmt;

use strum_macros::{Display as StrumDisplay, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BaseUnit {
    Kg,
    Mt,
    #[strum(serialize = "unit")]
    Unit,
    #[strum(serialize = "units")]
    Units,
    #[strum(serialize = "%")]
    Percent,
    #[strum(serialize = "tCO2e")]
    TCo2e,
    #[strum(serialize = "kwh")]
    Kwh,
    #[strum(serialize = "year")]
    Year,
    #[strum(serialize = "years")]
    Years,
}

/// A unit attached to an `EngineNumber`: empty (scalar), a single base unit,
/// or a compound `numerator / denominator` (the only compound shape the
/// grammar allows, per `unitValue` in spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Empty,
    Base(BaseUnit),
    Compound(BaseUnit, BaseUnit),
}

impl Unit {
    pub fn is_empty(&self) -> bool {
        matches!(self, Unit::Empty)
    }

    /// True if `self` and `other` can combine without conversion (identical,
    /// or one side empty).
    pub fn compatible(&self, other: &Unit) -> bool {
        self == other || self.is_empty() || other.is_empty()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Empty => write!(f, ""),
            Unit::Base(b) => write!(f, "{b}"),
            Unit::Compound(n, d) => write!(f, "{n} / {d}"),
        }
    }
}

/// `1 mt = 1000 kg`, `1 year = 1 years`: the fixed, direction-free exact
/// conversions from §4.4, independent of any substance's registered
/// equivalencies or initial-charge coefficients.
pub fn fixed_conversion_factor(from: BaseUnit, to: BaseUnit) -> Option<rust_decimal::Decimal> {
    use rust_decimal::Decimal;
    use BaseUnit::*;
    match (from, to) {
        (a, b) if a == b => Some(Decimal::ONE),
        (Mt, Kg) => Some(Decimal::from(1000)),
        (Kg, Mt) => Some(Decimal::ONE / Decimal::from(1000)),
        (Year, Years) | (Years, Year) => Some(Decimal::ONE),
        (Unit, Units) | (Units, Unit) => Some(Decimal::ONE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_keyword_strings() {
        for (text, unit) in [
            ("kg", BaseUnit::Kg),
            ("mt", BaseUnit::Mt),
            ("unit", BaseUnit::Unit),
            ("units", BaseUnit::Units),
            ("%", BaseUnit::Percent),
            ("tCO2e", BaseUnit::TCo2e),
            ("kwh", BaseUnit::Kwh),
            ("year", BaseUnit::Year),
            ("years", BaseUnit::Years),
        ] {
            assert_eq!(text.parse::<BaseUnit>().unwrap(), unit);
            assert_eq!(unit.to_string(), text);
        }
    }

    #[test]
    fn mt_to_kg_is_exact() {
        let factor = fixed_conversion_factor(BaseUnit::Mt, BaseUnit::Kg).unwrap();
        assert_eq!(factor, rust_decimal::Decimal::from(1000));
    }

    #[test]
    fn unrelated_units_have_no_fixed_conversion() {
        assert!(fixed_conversion_factor(BaseUnit::Kg, BaseUnit::TCo2e).is_none());
    }
}
