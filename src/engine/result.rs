//! `EngineResult` (§6.2): one year-boundary snapshot for one (application,
//! substance).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub application: String,
    pub substance: String,
    pub year: i32,
    pub manufacture: Decimal,
    pub import: Decimal,
    pub export: Decimal,
    pub sales: Decimal,
    pub equipment: Decimal,
    pub prior_equipment: Decimal,
    pub emissions: Decimal,
    pub energy: Decimal,
}
