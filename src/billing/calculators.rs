//! Core billing calculation functions.
//!
//! Pure functions for bill math - no database access. The review screen,
//! the preview endpoint and the save path all go through [`calculate_total`].

use rust_decimal::prelude::*;
use serde::Serialize;

use super::models::{Bill, ChargeLine, PdcStatus, PostDatedCheck};
use super::money::Money;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use rentbill_api::billing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Per-period share of the lease's advance payment.
///
/// Zero unless `advance_payment_months` is positive. The denominator is
/// clamped to at least one month and the share is rounded to cents, so the
/// stored total may differ from the exact quotient by up to half a cent.
pub fn advance_deduction(bill: &Bill) -> Decimal {
    if bill.advance_payment_months <= 0 {
        return Decimal::ZERO;
    }

    let months = Decimal::from(bill.advance_payment_months.max(1));
    round_money(bill.advance_payment_amount.amount() / months, 2)
}

/// Sum of line amounts.
pub fn lines_total(lines: &[ChargeLine]) -> Decimal {
    lines.iter().map(|line| line.amount).sum::<Money>().amount()
}

/// Sum of all discount amounts.
pub fn discount_total(discounts: &[ChargeLine]) -> Decimal {
    lines_total(discounts)
}

/// `base_rent + Σ extra charges − advance deduction`
pub fn calculate_subtotal(bill: &Bill, extra_charges: &[ChargeLine]) -> Decimal {
    let subtotal = bill.base_rent + Money::from(lines_total(extra_charges))
        - Money::from(advance_deduction(bill));
    subtotal.amount()
}

/// Whether the rent component is still owed on this bill.
///
/// A cleared post-dated check has already paid the rent.
pub fn rent_included(pdc: Option<&PostDatedCheck>) -> bool {
    !matches!(pdc, Some(check) if check.status == PdcStatus::Cleared)
}

/// Amount removed from the bill for a cleared post-dated check.
///
/// Always the bill's base rent, never the check's face amount.
pub fn pdc_deduction(bill: &Bill, pdc: Option<&PostDatedCheck>) -> Decimal {
    if rent_included(pdc) {
        Decimal::ZERO
    } else {
        bill.base_rent.amount()
    }
}

/// Itemized result of a bill computation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillBreakdown {
    pub base_rent: Money,
    pub additional_total: Money,
    pub advance_deduction: Money,
    pub subtotal: Money,
    pub discount_total: Money,
    pub pdc_deduction: Money,
    pub rent_included: bool,
    /// May be negative; totals are never clamped. Saturates at the
    /// `Decimal` bounds.
    pub total: Money,
}

/// Compute the bill total.
///
/// `total = subtotal − discount_total − pdc_deduction`
pub fn calculate_total(
    bill: &Bill,
    extra_charges: &[ChargeLine],
    discounts: &[ChargeLine],
    pdc: Option<&PostDatedCheck>,
) -> BillBreakdown {
    let additional_total = lines_total(extra_charges);
    let advance = advance_deduction(bill);
    let subtotal = calculate_subtotal(bill, extra_charges);
    let discounts_sum = discount_total(discounts);
    let pdc_amount = pdc_deduction(bill, pdc);

    BillBreakdown {
        base_rent: bill.base_rent,
        additional_total: additional_total.into(),
        advance_deduction: advance.into(),
        subtotal: subtotal.into(),
        discount_total: discounts_sum.into(),
        pdc_deduction: pdc_amount.into(),
        rent_included: rent_included(pdc),
        total: Money::from(subtotal) - Money::from(discounts_sum) - Money::from(pdc_amount),
    }
}

/// Pick the post-dated check to show and deduct for a bill.
///
/// Priority: first pending, then first cleared, then the first candidate.
pub fn select_pdc(candidates: &[PostDatedCheck]) -> Option<&PostDatedCheck> {
    candidates
        .iter()
        .find(|pdc| pdc.status == PdcStatus::Pending)
        .or_else(|| {
            candidates
                .iter()
                .find(|pdc| pdc.status == PdcStatus::Cleared)
        })
        .or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::models::ChargeCategory;
    use rust_decimal_macros::dec;

    fn bill(base_rent: Decimal, advance_amount: Decimal, advance_months: i32) -> Bill {
        Bill {
            billing_id: None,
            unit_id: None,
            agreement_id: None,
            base_rent: base_rent.into(),
            advance_payment_amount: advance_amount.into(),
            advance_payment_months: advance_months,
            late_penalty_amount: Money::ZERO,
            billing_period: None,
            lease_additional_expenses: vec![],
        }
    }

    fn charges(amounts: &[Decimal]) -> Vec<ChargeLine> {
        amounts
            .iter()
            .map(|a| ChargeLine::new(ChargeCategory::Additional, "Utility", (*a).into()))
            .collect()
    }

    fn discounts(amounts: &[Decimal]) -> Vec<ChargeLine> {
        amounts
            .iter()
            .map(|a| ChargeLine::new(ChargeCategory::Discount, "Promo", (*a).into()))
            .collect()
    }

    fn pdc(status: PdcStatus, amount: Decimal) -> PostDatedCheck {
        PostDatedCheck {
            pdc_id: None,
            status,
            amount: amount.into(),
            check_number: "000123".to_string(),
            due_date: None,
        }
    }

    // ==================== advance_deduction tests ====================

    #[test]
    fn test_advance_deduction_zero_months() {
        assert_eq!(advance_deduction(&bill(dec!(0), dec!(500), 0)), dec!(0));
    }

    #[test]
    fn test_advance_deduction_two_months() {
        assert_eq!(advance_deduction(&bill(dec!(0), dec!(500), 2)), dec!(250));
    }

    #[test]
    fn test_advance_deduction_negative_months() {
        assert_eq!(advance_deduction(&bill(dec!(0), dec!(500), -3)), dec!(0));
    }

    #[test]
    fn test_advance_deduction_rounds_to_cents() {
        // 1000 / 3 = 333.333...
        assert_eq!(advance_deduction(&bill(dec!(0), dec!(1000), 3)), dec!(333.33));

        for (amount, months) in [(dec!(1000), 3), (dec!(2000), 7), (dec!(0.05), 2)] {
            let exact = amount / Decimal::from(months);
            let rounded = advance_deduction(&bill(dec!(0), amount, months));
            assert!((rounded - exact).abs() <= dec!(0.005));
        }
    }

    // ==================== subtotal / discount tests ====================

    #[test]
    fn test_subtotal_composition() {
        let b = bill(dec!(5000), dec!(0), 0);
        assert_eq!(
            calculate_subtotal(&b, &charges(&[dec!(200), dec!(300)])),
            dec!(5500)
        );
    }

    #[test]
    fn test_subtotal_no_charges() {
        let b = bill(dec!(5000), dec!(1200), 12);
        assert_eq!(calculate_subtotal(&b, &[]), dec!(4900));
    }

    #[test]
    fn test_discount_total() {
        assert_eq!(discount_total(&discounts(&[dec!(100), dec!(50.25)])), dec!(150.25));
        assert_eq!(discount_total(&[]), dec!(0));
    }

    // ==================== calculate_total tests ====================

    #[test]
    fn test_total_end_to_end_without_pdc() {
        let b = bill(dec!(10000), dec!(2000), 2);
        let breakdown = calculate_total(&b, &charges(&[dec!(500)]), &discounts(&[dec!(300)]), None);

        assert_eq!(breakdown.advance_deduction.amount(), dec!(1000));
        assert_eq!(breakdown.subtotal.amount(), dec!(9500));
        assert_eq!(breakdown.discount_total.amount(), dec!(300));
        assert_eq!(breakdown.pdc_deduction.amount(), dec!(0));
        assert!(breakdown.rent_included);
        assert_eq!(breakdown.total.amount(), dec!(9200));
    }

    #[test]
    fn test_total_cleared_pdc_goes_negative() {
        let b = bill(dec!(10000), dec!(2000), 2);
        let check = pdc(PdcStatus::Cleared, dec!(10000));
        let breakdown = calculate_total(
            &b,
            &charges(&[dec!(500)]),
            &discounts(&[dec!(300)]),
            Some(&check),
        );

        assert_eq!(breakdown.pdc_deduction.amount(), dec!(10000));
        assert!(!breakdown.rent_included);
        assert_eq!(breakdown.total.amount(), dec!(-800));
    }

    #[test]
    fn test_pdc_deduction_only_when_cleared() {
        let b = bill(dec!(8000), dec!(0), 0);
        for status in [
            PdcStatus::Pending,
            PdcStatus::Bounced,
            PdcStatus::Replaced,
            PdcStatus::Unknown,
        ] {
            let check = pdc(status, dec!(8000));
            assert_eq!(pdc_deduction(&b, Some(&check)), dec!(0), "{:?}", status);
        }
        assert_eq!(pdc_deduction(&b, None), dec!(0));
        assert_eq!(
            pdc_deduction(&b, Some(&pdc(PdcStatus::Cleared, dec!(8000)))),
            dec!(8000)
        );
    }

    #[test]
    fn test_pdc_deduction_uses_base_rent_not_check_amount() {
        let b = bill(dec!(8000), dec!(0), 0);
        let check = pdc(PdcStatus::Cleared, dec!(9500));
        let breakdown = calculate_total(&b, &[], &[], Some(&check));
        assert_eq!(breakdown.pdc_deduction.amount(), dec!(8000));
        assert_eq!(breakdown.total.amount(), dec!(0));
    }

    #[test]
    fn test_calculate_total_is_pure() {
        let b = bill(dec!(12000), dec!(3000), 3);
        let extra = charges(&[dec!(450.50), dec!(99.99)]);
        let off = discounts(&[dec!(120)]);
        let check = pdc(PdcStatus::Pending, dec!(12000));

        let first = calculate_total(&b, &extra, &off, Some(&check));
        let second = calculate_total(&b, &extra, &off, Some(&check));
        assert_eq!(first, second);
        assert_eq!(first.total.amount(), dec!(11430.49));
    }

    #[test]
    fn test_total_components_add_up() {
        let b = bill(dec!(7000), dec!(1000), 3);
        let breakdown = calculate_total(&b, &charges(&[dec!(10)]), &discounts(&[dec!(5)]), None);
        let recomposed = breakdown.base_rent.amount() + breakdown.additional_total.amount()
            - breakdown.advance_deduction.amount()
            - breakdown.discount_total.amount()
            - breakdown.pdc_deduction.amount();
        assert_eq!(recomposed, breakdown.total.amount());
    }

    // ==================== select_pdc tests ====================

    #[test]
    fn test_select_pdc_prefers_pending() {
        let candidates = vec![
            pdc(PdcStatus::Cleared, dec!(1)),
            pdc(PdcStatus::Bounced, dec!(2)),
            pdc(PdcStatus::Pending, dec!(3)),
            pdc(PdcStatus::Pending, dec!(4)),
        ];
        assert_eq!(select_pdc(&candidates).unwrap().amount.amount(), dec!(3));
    }

    #[test]
    fn test_select_pdc_falls_back_to_cleared() {
        let candidates = vec![
            pdc(PdcStatus::Bounced, dec!(1)),
            pdc(PdcStatus::Cleared, dec!(2)),
        ];
        assert_eq!(select_pdc(&candidates).unwrap().status, PdcStatus::Cleared);
    }

    #[test]
    fn test_select_pdc_falls_back_to_first() {
        let candidates = vec![
            pdc(PdcStatus::Replaced, dec!(1)),
            pdc(PdcStatus::Bounced, dec!(2)),
        ];
        assert_eq!(select_pdc(&candidates).unwrap().amount.amount(), dec!(1));
    }

    #[test]
    fn test_select_pdc_empty() {
        assert!(select_pdc(&[]).is_none());
    }

    #[test]
    fn test_calculate_total_saturates_on_huge_amounts() {
        let huge = Money::parse_lenient("79228162514264337593543950335").amount();
        let b = bill(huge, dec!(0), 0);

        assert_eq!(calculate_subtotal(&b, &charges(&[huge])), Decimal::MAX);

        let breakdown = calculate_total(
            &b,
            &charges(&[huge, huge]),
            &discounts(&[huge, huge]),
            Some(&pdc(PdcStatus::Cleared, huge)),
        );
        assert_eq!(breakdown.additional_total.amount(), Decimal::MAX);
        assert_eq!(breakdown.subtotal.amount(), Decimal::MAX);
        assert_eq!(breakdown.discount_total.amount(), Decimal::MAX);
        assert_eq!(breakdown.total.amount(), -Decimal::MAX);
    }

    // ==================== round_money tests ====================

    #[test]
    fn test_round_money_bankers_rounding() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(666.665), 2), dec!(666.66));
        assert_eq!(round_money(dec!(-1.234), 2), dec!(-1.23));
    }
}
