//! Billing service functions with database access.
//!
//! Every total computed here, whether shown or stored, comes from
//! [`calculate_total`].

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::cache::AppCache;
use crate::error::AppError;

use super::calculators::{calculate_total, select_pdc, BillBreakdown};
use super::models::{
    Bill, BillRow, BillStatus, ChargeCategory, ChargeLine, ChargeRow, PdcRow, PostDatedCheck,
};
use super::money::Money;
use super::queries;
use super::requests::{ListBillsQuery, PreviewBillRequest, SaveBillRequest};
use super::responses::{
    ApproveBillResponse, BillReviewResponse, BillSummaryResponse, DeleteChargeResponse,
    PreviewResponse, SaveBillResponse,
};

const MAX_LIST_LIMIT: i64 = 500;

/// Billing error types
#[derive(Debug, Clone)]
pub enum BillingError {
    BillNotFound {
        unit_id: Uuid,
    },
    ChargeNotFound {
        charge_id: Uuid,
    },
    BillFinalized {
        billing_id: Uuid,
        status: BillStatus,
    },
    AgreementMismatch {
        expected: Uuid,
        received: Uuid,
    },
    InvalidCharge {
        message: String,
    },
    UnknownStatus {
        status: String,
    },
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingError::BillNotFound { unit_id } => {
                write!(f, "No bill found for unit {}", unit_id)
            }
            BillingError::ChargeNotFound { charge_id } => {
                write!(f, "Charge {} does not exist", charge_id)
            }
            BillingError::BillFinalized { billing_id, status } => write!(
                f,
                "Bill {} is already {} and can no longer be changed",
                billing_id,
                status.as_str()
            ),
            BillingError::AgreementMismatch { expected, received } => write!(
                f,
                "Agreement {} does not match the bill's agreement {}",
                received, expected
            ),
            BillingError::InvalidCharge { message } => write!(f, "{}", message),
            BillingError::UnknownStatus { status } => write!(f, "Unknown bill status '{}'", status),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::BillNotFound { .. } | BillingError::ChargeNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            BillingError::BillFinalized { .. } => AppError::Conflict(err.to_string()),
            BillingError::AgreementMismatch { .. }
            | BillingError::InvalidCharge { .. }
            | BillingError::UnknownStatus { .. } => AppError::Validation(err.to_string()),
        }
    }
}

/// Split stored rows into (additional charges, discounts), keeping order.
pub fn split_charges(rows: &[ChargeRow]) -> (Vec<ChargeLine>, Vec<ChargeLine>) {
    rows.iter()
        .filter_map(ChargeLine::from_row)
        .partition(|line| line.category == ChargeCategory::Additional)
}

/// Lease recurring expenses become unsaved additional charges on a draft
/// bill that has no stored additional charges yet.
pub fn seed_lease_expenses(
    bill: &Bill,
    status: BillStatus,
    additional: Vec<ChargeLine>,
) -> Vec<ChargeLine> {
    if !status.is_editable() || !additional.is_empty() {
        return additional;
    }

    bill.lease_additional_expenses
        .iter()
        .map(|expense| {
            ChargeLine::new(
                ChargeCategory::Additional,
                expense.expense_type.clone(),
                expense.amount,
            )
        })
        .collect()
}

/// Every line needs a label. Amounts are never rejected.
pub fn validate_lines(lines: &[ChargeLine]) -> Result<(), BillingError> {
    match lines.iter().find(|line| line.charge_type.is_empty()) {
        Some(line) => Err(BillingError::InvalidCharge {
            message: format!(
                "Please enter a type for every {} line",
                match line.category {
                    ChargeCategory::Additional => "additional charge",
                    ChargeCategory::Discount => "discount",
                }
            ),
        }),
        None => Ok(()),
    }
}

/// Only draft bills can be saved, approved or have charges removed.
pub fn ensure_editable(row: &BillRow) -> Result<BillStatus, BillingError> {
    let status = BillStatus::from_db(&row.status);
    if status.is_editable() {
        Ok(status)
    } else {
        Err(BillingError::BillFinalized {
            billing_id: row.billing_id,
            status,
        })
    }
}

/// A submitted agreement id, when present, must be the bill's own.
pub fn ensure_agreement(row: &BillRow, received: Option<Uuid>) -> Result<(), BillingError> {
    match received {
        Some(received) if received != row.agreement_id => Err(BillingError::AgreementMismatch {
            expected: row.agreement_id,
            received,
        }),
        _ => Ok(()),
    }
}

/// How a save reconciles submitted lines with stored ones
#[derive(Debug, Default, PartialEq)]
pub struct ChargeSyncPlan {
    /// Stored ids that survive the save; every other stored line is deleted
    pub kept_ids: Vec<Uuid>,
    pub updates: Vec<(Uuid, ChargeLine)>,
    pub inserts: Vec<ChargeLine>,
}

/// Plan the save of `incoming` lines against the `stored` rows of a bill.
///
/// A line referencing an id that is not stored on this bill, or referencing
/// the same id twice, is rejected.
pub fn plan_charge_sync(
    stored: &[ChargeRow],
    incoming: &[ChargeLine],
) -> Result<ChargeSyncPlan, BillingError> {
    let stored_ids: HashSet<Uuid> = stored.iter().map(|row| row.charge_id).collect();
    let mut seen = HashSet::new();
    let mut plan = ChargeSyncPlan::default();

    for line in incoming {
        match line.charge_id {
            Some(id) => {
                if !stored_ids.contains(&id) {
                    return Err(BillingError::InvalidCharge {
                        message: format!("Charge {} does not belong to this bill", id),
                    });
                }
                if !seen.insert(id) {
                    return Err(BillingError::InvalidCharge {
                        message: format!("Charge {} was submitted more than once", id),
                    });
                }
                plan.kept_ids.push(id);
                plan.updates.push((id, line.clone()));
            }
            None => plan.inserts.push(line.clone()),
        }
    }

    Ok(plan)
}

fn selected_pdc(rows: &[PdcRow]) -> Option<PostDatedCheck> {
    let candidates: Vec<PostDatedCheck> = rows.iter().map(PostDatedCheck::from).collect();
    select_pdc(&candidates).cloned()
}

/// Build the review of a bill from storage
pub async fn build_review(
    pool: &PgPool,
    row: &BillRow,
    currency: &str,
) -> Result<BillReviewResponse, AppError> {
    let bill = Bill::from(row);
    let status = BillStatus::from_db(&row.status);

    let charge_rows = queries::list_charges(pool, row.billing_id).await?;
    let (additional, discounts) = split_charges(&charge_rows);
    let additional = seed_lease_expenses(&bill, status, additional);

    let pdc_rows = queries::find_pdcs(pool, row.billing_id, row.agreement_id).await?;
    let pdc = selected_pdc(&pdc_rows);

    let breakdown = calculate_total(&bill, &additional, &discounts, pdc.as_ref());

    Ok(BillReviewResponse {
        bill,
        status,
        currency: currency.to_string(),
        additional_charges: additional,
        discounts,
        pdc,
        breakdown,
        stored_total: row.total_amount_due.map(Money::from),
    })
}

/// Load the review of a unit's current bill, from cache when possible.
pub async fn load_review(
    pool: &PgPool,
    cache: &AppCache,
    currency: &str,
    unit_id: Uuid,
) -> Result<Arc<BillReviewResponse>, AppError> {
    if let Some(cached) = cache.reviews.get(&unit_id).await {
        tracing::debug!("Cache HIT for bill review: {}", unit_id);
        return Ok(cached);
    }

    tracing::debug!("Cache MISS for bill review: {}", unit_id);
    let row = queries::find_current_bill(pool, unit_id)
        .await?
        .ok_or(BillingError::BillNotFound { unit_id })?;

    let review = Arc::new(build_review(pool, &row, currency).await?);
    cache.reviews.insert(unit_id, review.clone()).await;

    Ok(review)
}

/// Compute a breakdown from a fully supplied request.
pub fn preview_bill(request: PreviewBillRequest, currency: &str) -> PreviewResponse {
    let additional: Vec<ChargeLine> = request
        .additional_charges
        .into_iter()
        .map(|line| line.into_line(ChargeCategory::Additional))
        .collect();
    let discounts: Vec<ChargeLine> = request
        .discounts
        .into_iter()
        .map(|line| line.into_line(ChargeCategory::Discount))
        .collect();
    let pdc = select_pdc(&request.pdcs).cloned();

    let breakdown = calculate_total(&request.bill, &additional, &discounts, pdc.as_ref());

    PreviewResponse {
        currency: currency.to_string(),
        pdc,
        breakdown,
    }
}

/// Persist a bill's itemized lines and its computed total.
pub async fn save_bill(
    pool: &PgPool,
    cache: &AppCache,
    currency: &str,
    unit_id: Uuid,
    request: SaveBillRequest,
) -> Result<SaveBillResponse, AppError> {
    let agreement_id = request.agreement_id;
    let client_total = request.total;
    let (additional, discounts) = request.into_lines();
    validate_lines(&additional)?;
    validate_lines(&discounts)?;

    let row = queries::find_current_bill(pool, unit_id)
        .await?
        .ok_or(BillingError::BillNotFound { unit_id })?;
    ensure_agreement(&row, agreement_id)?;

    let mut tx = pool.begin().await?;

    let locked = queries::lock_bill(&mut *tx, row.billing_id)
        .await?
        .ok_or(BillingError::BillNotFound { unit_id })?;
    ensure_editable(&locked)?;

    let pdc_rows = queries::find_pdcs(&mut *tx, locked.billing_id, locked.agreement_id).await?;
    let pdc = selected_pdc(&pdc_rows);

    let bill = Bill::from(&locked);
    let breakdown = calculate_total(&bill, &additional, &discounts, pdc.as_ref());

    if let Some(client_total) = client_total {
        if client_total != breakdown.total {
            tracing::warn!(
                billing_id = %locked.billing_id,
                client_total = %client_total,
                server_total = %breakdown.total,
                "Submitted bill total differs from computed total; storing computed total"
            );
        }
    }

    let stored = queries::list_charges(&mut *tx, locked.billing_id).await?;
    let incoming: Vec<ChargeLine> = additional.iter().chain(discounts.iter()).cloned().collect();
    let plan = plan_charge_sync(&stored, &incoming)?;

    let removed = queries::delete_charges_except(&mut *tx, locked.billing_id, &plan.kept_ids).await?;
    for (charge_id, line) in &plan.updates {
        queries::update_charge(&mut *tx, locked.billing_id, line, *charge_id).await?;
    }

    let mut inserted = Vec::with_capacity(plan.inserts.len());
    for line in &plan.inserts {
        let charge_id = queries::insert_charge(&mut *tx, locked.billing_id, line).await?;
        inserted.push(charge_id);
    }

    queries::update_bill_total(&mut *tx, locked.billing_id, breakdown.total.amount()).await?;
    tx.commit().await?;

    cache.invalidate_unit(unit_id).await;

    tracing::info!(
        billing_id = %locked.billing_id,
        unit_id = %unit_id,
        total = %breakdown.total,
        updated = plan.updates.len(),
        inserted = inserted.len(),
        removed,
        "Bill saved"
    );

    // Inserts were planned additional-first, matching this order.
    let mut new_ids = inserted.into_iter();
    let additional_charges = mark_persisted(additional, &mut new_ids);
    let discounts = mark_persisted(discounts, &mut new_ids);

    Ok(SaveBillResponse {
        billing_id: locked.billing_id,
        unit_id,
        currency: currency.to_string(),
        total: breakdown.total,
        breakdown,
        additional_charges,
        discounts,
    })
}

/// Give unsaved lines their newly inserted ids, in order.
fn mark_persisted(
    lines: Vec<ChargeLine>,
    new_ids: &mut impl Iterator<Item = Uuid>,
) -> Vec<ChargeLine> {
    lines
        .into_iter()
        .map(|mut line| {
            if line.charge_id.is_none() {
                line.charge_id = new_ids.next();
            }
            line.from_db = true;
            line
        })
        .collect()
}

/// Recompute a bill's total from its stored lines
fn stored_breakdown(
    bill: &Bill,
    rows: &[ChargeRow],
    pdc: Option<&PostDatedCheck>,
) -> BillBreakdown {
    let (additional, discounts) = split_charges(rows);
    calculate_total(bill, &additional, &discounts, pdc)
}

/// Remove a single stored charge and re-store the bill total.
pub async fn delete_charge(
    pool: &PgPool,
    cache: &AppCache,
    charge_id: Uuid,
) -> Result<DeleteChargeResponse, AppError> {
    let charge = queries::find_charge(pool, charge_id)
        .await?
        .ok_or(BillingError::ChargeNotFound { charge_id })?;

    let mut tx = pool.begin().await?;

    let bill_row = queries::lock_bill(&mut *tx, charge.billing_id)
        .await?
        .ok_or(BillingError::ChargeNotFound { charge_id })?;
    ensure_editable(&bill_row)?;

    if queries::delete_charge(&mut *tx, charge_id).await? == 0 {
        return Err(BillingError::ChargeNotFound { charge_id }.into());
    }

    let remaining = queries::list_charges(&mut *tx, bill_row.billing_id).await?;
    let pdc_rows =
        queries::find_pdcs(&mut *tx, bill_row.billing_id, bill_row.agreement_id).await?;
    let pdc = selected_pdc(&pdc_rows);
    let breakdown = stored_breakdown(&Bill::from(&bill_row), &remaining, pdc.as_ref());

    queries::update_bill_total(&mut *tx, bill_row.billing_id, breakdown.total.amount()).await?;
    tx.commit().await?;

    cache.invalidate_unit(bill_row.unit_id).await;

    tracing::info!(
        charge_id = %charge_id,
        billing_id = %bill_row.billing_id,
        total = %breakdown.total,
        "Charge deleted"
    );

    Ok(DeleteChargeResponse {
        charge_id,
        billing_id: bill_row.billing_id,
        total: breakdown.total,
    })
}

/// Finalize a unit's current bill and make it visible to the tenant.
pub async fn approve_bill(
    pool: &PgPool,
    cache: &AppCache,
    unit_id: Uuid,
) -> Result<ApproveBillResponse, AppError> {
    let row = queries::find_current_bill(pool, unit_id)
        .await?
        .ok_or(BillingError::BillNotFound { unit_id })?;
    ensure_editable(&row)?;

    // A concurrent approval may have won between the read and the update.
    let approved_at = queries::approve_bill(pool, row.billing_id)
        .await?
        .ok_or(BillingError::BillFinalized {
            billing_id: row.billing_id,
            status: BillStatus::Unpaid,
        })?;

    cache.invalidate_unit(unit_id).await;

    tracing::info!(billing_id = %row.billing_id, unit_id = %unit_id, "Bill approved");

    Ok(ApproveBillResponse {
        billing_id: row.billing_id,
        unit_id,
        status: BillStatus::Unpaid,
        approved_at,
    })
}

/// Parse a status filter for listings
pub fn parse_status_filter(status: Option<&str>) -> Result<Option<BillStatus>, BillingError> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some("draft") => Ok(Some(BillStatus::Draft)),
        Some("unpaid") => Ok(Some(BillStatus::Unpaid)),
        Some("paid") => Ok(Some(BillStatus::Paid)),
        Some("overdue") => Ok(Some(BillStatus::Overdue)),
        Some(other) => Err(BillingError::UnknownStatus {
            status: other.to_string(),
        }),
    }
}

/// Landlord overview of bills
pub async fn list_bills(
    pool: &PgPool,
    query: ListBillsQuery,
) -> Result<Vec<BillSummaryResponse>, AppError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);

    let rows = queries::list_bills(pool, status.map(BillStatus::as_str), limit).await?;

    Ok(rows
        .into_iter()
        .map(|row| BillSummaryResponse {
            billing_id: row.billing_id,
            unit_id: row.unit_id,
            agreement_id: row.agreement_id,
            billing_period: row.billing_period,
            status: BillStatus::from_db(&row.status),
            total_amount_due: row.total_amount_due.into(),
        })
        .collect())
}
