//! Billing models.
//!
//! Row structs use sqlx's FromRow derive for direct database
//! deserialization; domain structs are what the calculators consume.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::money::{lenient_count, Money};

/// Bill joined with its lease agreement terms
#[derive(Debug, Clone, FromRow)]
pub struct BillRow {
    pub billing_id: Uuid,
    pub unit_id: Uuid,
    pub agreement_id: Uuid,
    pub billing_period: NaiveDate,
    pub status: String,
    pub total_amount_due: Option<Decimal>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rent_amount: Option<Decimal>,
    pub advance_payment_amount: Option<Decimal>,
    pub advance_payment_months: Option<i32>,
    pub late_penalty_amount: Option<Decimal>,
    pub additional_expenses: Option<serde_json::Value>,
}

/// Stored additional charge or discount from billing_additional_charges
#[derive(Debug, Clone, FromRow)]
pub struct ChargeRow {
    pub charge_id: Uuid,
    pub billing_id: Uuid,
    pub charge_category: String,
    pub charge_type: String,
    pub amount: Option<Decimal>,
}

/// Post-dated check from post_dated_checks
#[derive(Debug, Clone, FromRow)]
pub struct PdcRow {
    pub pdc_id: Uuid,
    pub agreement_id: Uuid,
    pub billing_id: Option<Uuid>,
    pub check_number: String,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
}

/// Lifecycle state of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Under landlord review, not visible to the tenant
    Draft,
    /// Approved and visible to the tenant
    Unpaid,
    Paid,
    Overdue,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    /// Unrecognized values are treated as finalized, never as draft.
    pub fn from_db(value: &str) -> Self {
        match value {
            "draft" => Self::Draft,
            "paid" => Self::Paid,
            "overdue" => Self::Overdue,
            _ => Self::Unpaid,
        }
    }

    pub fn is_editable(self) -> bool {
        self == Self::Draft
    }
}

/// Recurring expense defined on the lease (e.g. parking, association dues)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseExpense {
    #[serde(rename = "type", default)]
    pub expense_type: String,
    #[serde(default)]
    pub amount: Money,
}

/// Parse the lease's `additional_expenses` column.
///
/// Entries that are not objects are skipped; a non-array value yields no
/// expenses.
pub fn parse_lease_expenses(value: Option<&serde_json::Value>) -> Vec<LeaseExpense> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Bill terms as consumed by the billing computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    #[serde(default)]
    pub billing_id: Option<Uuid>,
    #[serde(default)]
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub agreement_id: Option<Uuid>,
    #[serde(default)]
    pub base_rent: Money,
    #[serde(default)]
    pub advance_payment_amount: Money,
    #[serde(default, deserialize_with = "lenient_count")]
    pub advance_payment_months: i32,
    #[serde(default)]
    pub late_penalty_amount: Money,
    #[serde(default)]
    pub billing_period: Option<NaiveDate>,
    #[serde(default)]
    pub lease_additional_expenses: Vec<LeaseExpense>,
}

impl From<&BillRow> for Bill {
    fn from(row: &BillRow) -> Self {
        Self {
            billing_id: Some(row.billing_id),
            unit_id: Some(row.unit_id),
            agreement_id: Some(row.agreement_id),
            base_rent: row.rent_amount.into(),
            advance_payment_amount: row.advance_payment_amount.into(),
            advance_payment_months: row.advance_payment_months.unwrap_or(0),
            late_penalty_amount: row.late_penalty_amount.into(),
            billing_period: Some(row.billing_period),
            lease_additional_expenses: parse_lease_expenses(row.additional_expenses.as_ref()),
        }
    }
}

/// Category of an itemized bill adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeCategory {
    Additional,
    Discount,
}

impl ChargeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Additional => "additional",
            Self::Discount => "discount",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "additional" => Some(Self::Additional),
            "discount" => Some(Self::Discount),
            _ => None,
        }
    }
}

/// An additional charge or discount line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargeLine {
    pub charge_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub charge_type: String,
    pub amount: Money,
    pub category: ChargeCategory,
    #[serde(rename = "fromDB")]
    pub from_db: bool,
}

impl ChargeLine {
    /// An unsaved line
    pub fn new(category: ChargeCategory, charge_type: impl Into<String>, amount: Money) -> Self {
        Self {
            charge_id: None,
            charge_type: charge_type.into(),
            amount,
            category,
            from_db: false,
        }
    }

    /// Convert a stored row; rows with an unknown category are dropped.
    pub fn from_row(row: &ChargeRow) -> Option<Self> {
        let category = ChargeCategory::from_db(&row.charge_category)?;
        Some(Self {
            charge_id: Some(row.charge_id),
            charge_type: row.charge_type.clone(),
            amount: row.amount.into(),
            category,
            from_db: true,
        })
    }
}

/// Clearance status of a post-dated check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdcStatus {
    Pending,
    Cleared,
    Bounced,
    Replaced,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PdcStatus {
    /// Matching is exact: `"Cleared"` is not `cleared`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "cleared" => Self::Cleared,
            "bounced" => Self::Bounced,
            "replaced" => Self::Replaced,
            _ => Self::Unknown,
        }
    }
}

/// Post-dated check linked to a bill or its lease agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDatedCheck {
    #[serde(default)]
    pub pdc_id: Option<Uuid>,
    #[serde(default)]
    pub status: PdcStatus,
    #[serde(default)]
    pub amount: Money,
    #[serde(default)]
    pub check_number: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl From<&PdcRow> for PostDatedCheck {
    fn from(row: &PdcRow) -> Self {
        Self {
            pdc_id: Some(row.pdc_id),
            status: PdcStatus::from_db(&row.status),
            amount: row.amount.into(),
            check_number: row.check_number.clone(),
            due_date: row.due_date,
        }
    }
}
