//! Billing engine module for non-submetered rental units.
//!
//! Computes, reviews, saves and approves the monthly bill of each unit:
//! base rent, additional charges, advance-payment amortization, discounts
//! and post-dated check adjustments.

pub mod calculators;
pub mod models;
pub mod money;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::{calculate_total, round_money, select_pdc, BillBreakdown};
pub use money::Money;
pub use routes::router;
pub use services::BillingError;
