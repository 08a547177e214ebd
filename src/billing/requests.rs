//! Request DTOs for billing API endpoints.

use serde::Deserialize;
use uuid::Uuid;

use super::models::{Bill, ChargeCategory, ChargeLine, PostDatedCheck};
use super::money::Money;

/// An itemized charge or discount as submitted by the landlord
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeLineRequest {
    #[serde(default)]
    pub charge_id: Option<Uuid>,
    /// Informational; the list a line arrives in decides its category.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", alias = "charge_type", default)]
    pub charge_type: String,
    #[serde(default)]
    pub amount: Money,
}

impl ChargeLineRequest {
    pub fn into_line(self, category: ChargeCategory) -> ChargeLine {
        ChargeLine {
            from_db: self.charge_id.is_some(),
            charge_id: self.charge_id,
            charge_type: self.charge_type.trim().to_string(),
            amount: self.amount,
            category,
        }
    }
}

/// Request to save a bill's itemized adjustments and total
#[derive(Debug, Deserialize)]
pub struct SaveBillRequest {
    #[serde(default)]
    pub agreement_id: Option<Uuid>,
    /// Total computed by the client, compared against the server's.
    #[serde(default)]
    pub total: Option<Money>,
    #[serde(default)]
    pub additional_charges: Vec<ChargeLineRequest>,
    #[serde(default)]
    pub discounts: Vec<ChargeLineRequest>,
}

impl SaveBillRequest {
    /// Split into typed lines, tagging each by the list it came from.
    pub fn into_lines(self) -> (Vec<ChargeLine>, Vec<ChargeLine>) {
        let additional = self
            .additional_charges
            .into_iter()
            .map(|line| line.into_line(ChargeCategory::Additional))
            .collect();
        let discounts = self
            .discounts
            .into_iter()
            .map(|line| line.into_line(ChargeCategory::Discount))
            .collect();
        (additional, discounts)
    }
}

/// Request to compute a breakdown without touching storage
#[derive(Debug, Deserialize)]
pub struct PreviewBillRequest {
    pub bill: Bill,
    #[serde(default)]
    pub additional_charges: Vec<ChargeLineRequest>,
    #[serde(default)]
    pub discounts: Vec<ChargeLineRequest>,
    /// Candidate checks; the selection rule picks one.
    #[serde(default)]
    pub pdcs: Vec<PostDatedCheck>,
}

/// Query parameters for bill listings
#[derive(Debug, Deserialize)]
pub struct ListBillsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}
