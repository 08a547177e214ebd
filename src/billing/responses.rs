//! Response DTOs for billing API endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::calculators::BillBreakdown;
use super::models::{Bill, BillStatus, ChargeLine, PostDatedCheck};
use super::money::Money;

/// Full review of a unit's current bill
#[derive(Debug, Clone, Serialize)]
pub struct BillReviewResponse {
    pub bill: Bill,
    pub status: BillStatus,
    pub currency: String,
    pub additional_charges: Vec<ChargeLine>,
    pub discounts: Vec<ChargeLine>,
    pub pdc: Option<PostDatedCheck>,
    pub breakdown: BillBreakdown,
    /// Total currently stored on the bill (may lag an unsaved review)
    pub stored_total: Option<Money>,
}

/// Response for a stateless breakdown preview
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub currency: String,
    pub pdc: Option<PostDatedCheck>,
    pub breakdown: BillBreakdown,
}

/// Response after a bill save
#[derive(Debug, Serialize)]
pub struct SaveBillResponse {
    pub billing_id: Uuid,
    pub unit_id: Uuid,
    pub currency: String,
    pub total: Money,
    pub breakdown: BillBreakdown,
    pub additional_charges: Vec<ChargeLine>,
    pub discounts: Vec<ChargeLine>,
}

/// Response after deleting a single charge
#[derive(Debug, Serialize)]
pub struct DeleteChargeResponse {
    pub charge_id: Uuid,
    pub billing_id: Uuid,
    pub total: Money,
}

/// Response after approving a bill
#[derive(Debug, Serialize)]
pub struct ApproveBillResponse {
    pub billing_id: Uuid,
    pub unit_id: Uuid,
    pub status: BillStatus,
    pub approved_at: DateTime<Utc>,
}

/// One row of the landlord's bill overview
#[derive(Debug, Serialize)]
pub struct BillSummaryResponse {
    pub billing_id: Uuid,
    pub unit_id: Uuid,
    pub agreement_id: Uuid,
    pub billing_period: NaiveDate,
    pub status: BillStatus,
    pub total_amount_due: Money,
}

/// Generic billing error response
#[derive(Debug, Serialize)]
pub struct BillingErrorResponse {
    pub error_type: String,
    pub message: String,
}
