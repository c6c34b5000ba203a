//! The fixed stream vocabulary (§3, §6.1).

use strum_macros::{Display as StrumDisplay, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum Stream {
    #[strum(serialize = "manufacture")]
    Manufacture,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "export")]
    Export,
    #[strum(serialize = "sales")]
    Sales,
    #[strum(serialize = "equipment")]
    Equipment,
    #[strum(serialize = "priorEquipment")]
    PriorEquipment,
}

impl Stream {
    /// `sales` is always derived (`manufacture + import - export`); it can
    /// be read but never written directly.
    pub fn is_derived(&self) -> bool {
        matches!(self, Stream::Sales)
    }

    /// Mass streams are stored/converted in `kg`; `equipment`/`priorEquipment`
    /// are stored in `units`.
    pub fn native_unit(&self) -> crate::units::BaseUnit {
        use crate::units::BaseUnit;
        match self {
            Stream::Manufacture | Stream::Import | Stream::Export | Stream::Sales => BaseUnit::Kg,
            Stream::Equipment | Stream::PriorEquipment => BaseUnit::Units,
        }
    }
}
