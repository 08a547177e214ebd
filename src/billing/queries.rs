//! Database queries for the billing engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::AppError;

use super::models::{BillRow, ChargeLine, ChargeRow, PdcRow};

const BILL_COLUMNS: &str = r#"
    b.billing_id, b.unit_id, b.agreement_id, b.billing_period,
    b.status, b.total_amount_due, b.approved_at,
    l.rent_amount, l.advance_payment_amount, l.advance_payment_months,
    l.late_penalty_amount, l.additional_expenses
"#;

/// Get the most recent bill of a unit
pub async fn find_current_bill(pool: &PgPool, unit_id: Uuid) -> Result<Option<BillRow>, AppError> {
    let sql = format!(
        r#"
        SELECT {BILL_COLUMNS}
        FROM billing b
        JOIN lease_agreements l ON l.agreement_id = b.agreement_id
        WHERE b.unit_id = $1
        ORDER BY b.billing_period DESC, b.created_at DESC
        LIMIT 1
        "#
    );

    let bill = sqlx::query_as::<_, BillRow>(&sql)
        .bind(unit_id)
        .fetch_optional(pool)
        .await?;

    Ok(bill)
}

/// Get a bill by id, locking it for the rest of the transaction
pub async fn lock_bill(conn: &mut PgConnection, billing_id: Uuid) -> Result<Option<BillRow>, AppError> {
    let sql = format!(
        r#"
        SELECT {BILL_COLUMNS}
        FROM billing b
        JOIN lease_agreements l ON l.agreement_id = b.agreement_id
        WHERE b.billing_id = $1
        FOR UPDATE OF b
        "#
    );

    let bill = sqlx::query_as::<_, BillRow>(&sql)
        .bind(billing_id)
        .fetch_optional(conn)
        .await?;

    Ok(bill)
}

/// List bills with an optional status filter, newest period first
pub async fn list_bills(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<BillRow>, AppError> {
    let sql = format!(
        r#"
        SELECT {BILL_COLUMNS}
        FROM billing b
        JOIN lease_agreements l ON l.agreement_id = b.agreement_id
        WHERE ($1::text IS NULL OR b.status = $1)
        ORDER BY b.billing_period DESC, b.unit_id
        LIMIT $2
        "#
    );

    let bills = sqlx::query_as::<_, BillRow>(&sql)
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(bills)
}

/// Current bills that are still drafts, one per unit, newest period first.
///
/// A unit's current bill is the one [`find_current_bill`] resolves; older
/// drafts behind a finalized bill are skipped.
pub async fn list_current_drafts(pool: &PgPool, limit: i64) -> Result<Vec<BillRow>, AppError> {
    let sql = format!(
        r#"
        SELECT latest.*
        FROM (
            SELECT DISTINCT ON (b.unit_id) {BILL_COLUMNS}
            FROM billing b
            JOIN lease_agreements l ON l.agreement_id = b.agreement_id
            ORDER BY b.unit_id, b.billing_period DESC, b.created_at DESC
        ) latest
        WHERE latest.status = 'draft'
        ORDER BY latest.billing_period DESC, latest.unit_id
        LIMIT $1
        "#
    );

    let bills = sqlx::query_as::<_, BillRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(bills)
}

/// Get all stored charges and discounts of a bill, in entry order
pub async fn list_charges<'e, E>(executor: E, billing_id: Uuid) -> Result<Vec<ChargeRow>, AppError>
where
    E: PgExecutor<'e>,
{
    let charges = sqlx::query_as::<_, ChargeRow>(
        r#"
        SELECT charge_id, billing_id, charge_category, charge_type, amount
        FROM billing_additional_charges
        WHERE billing_id = $1
        ORDER BY created_at, charge_id
        "#,
    )
    .bind(billing_id)
    .fetch_all(executor)
    .await?;

    Ok(charges)
}

/// Get a single stored charge
pub async fn find_charge(pool: &PgPool, charge_id: Uuid) -> Result<Option<ChargeRow>, AppError> {
    let charge = sqlx::query_as::<_, ChargeRow>(
        r#"
        SELECT charge_id, billing_id, charge_category, charge_type, amount
        FROM billing_additional_charges
        WHERE charge_id = $1
        "#,
    )
    .bind(charge_id)
    .fetch_optional(pool)
    .await?;

    Ok(charge)
}

/// Post-dated checks linked to the bill or to its lease agreement.
///
/// Checks tied to this bill come first, then by due date.
pub async fn find_pdcs<'e, E>(
    executor: E,
    billing_id: Uuid,
    agreement_id: Uuid,
) -> Result<Vec<PdcRow>, AppError>
where
    E: PgExecutor<'e>,
{
    let pdcs = sqlx::query_as::<_, PdcRow>(
        r#"
        SELECT pdc_id, agreement_id, billing_id, check_number, amount, due_date, status
        FROM post_dated_checks
        WHERE billing_id = $1
           OR (billing_id IS NULL AND agreement_id = $2)
        ORDER BY (billing_id = $1) DESC NULLS LAST, due_date NULLS LAST, created_at
        "#,
    )
    .bind(billing_id)
    .bind(agreement_id)
    .fetch_all(executor)
    .await?;

    Ok(pdcs)
}

/// Delete stored lines of a bill that are not in `kept_ids`
pub async fn delete_charges_except(
    conn: &mut PgConnection,
    billing_id: Uuid,
    kept_ids: &[Uuid],
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        DELETE FROM billing_additional_charges
        WHERE billing_id = $1
          AND NOT (charge_id = ANY($2))
        "#,
    )
    .bind(billing_id)
    .bind(kept_ids)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Update a stored line in place
pub async fn update_charge(
    conn: &mut PgConnection,
    billing_id: Uuid,
    line: &ChargeLine,
    charge_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE billing_additional_charges
        SET charge_category = $3, charge_type = $4, amount = $5
        WHERE charge_id = $1 AND billing_id = $2
        "#,
    )
    .bind(charge_id)
    .bind(billing_id)
    .bind(line.category.as_str())
    .bind(&line.charge_type)
    .bind(line.amount.amount())
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Insert a new line, returning its id
pub async fn insert_charge(
    conn: &mut PgConnection,
    billing_id: Uuid,
    line: &ChargeLine,
) -> Result<Uuid, AppError> {
    let charge_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO billing_additional_charges
            (charge_id, billing_id, charge_category, charge_type, amount, created_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        RETURNING charge_id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(billing_id)
    .bind(line.category.as_str())
    .bind(&line.charge_type)
    .bind(line.amount.amount())
    .fetch_one(conn)
    .await?;

    Ok(charge_id)
}

/// Delete a single line
pub async fn delete_charge(conn: &mut PgConnection, charge_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM billing_additional_charges WHERE charge_id = $1")
        .bind(charge_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Store the computed total on a bill
pub async fn update_bill_total(
    conn: &mut PgConnection,
    billing_id: Uuid,
    total: Decimal,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE billing
        SET total_amount_due = $2, updated_at = NOW()
        WHERE billing_id = $1
        "#,
    )
    .bind(billing_id)
    .bind(total)
    .execute(conn)
    .await?;

    Ok(())
}

/// Move a draft bill to `unpaid`. Returns `None` if it was not a draft.
pub async fn approve_bill(
    pool: &PgPool,
    billing_id: Uuid,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let approved_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        UPDATE billing
        SET status = 'unpaid', approved_at = NOW(), updated_at = NOW()
        WHERE billing_id = $1
          AND status = 'draft'
        RETURNING approved_at
        "#,
    )
    .bind(billing_id)
    .fetch_optional(pool)
    .await?;

    Ok(approved_at)
}
