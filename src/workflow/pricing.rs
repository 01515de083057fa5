use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::WorkflowError;
use crate::models::{LineItem, ServiceType};

/// Largest single money value accepted from clients (prices, offers, payouts).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest quantity accepted on one line item.
pub const MAX_QUANTITY: u32 = 10_000;

/// Reject negative amounts and amounts above [`MAX_AMOUNT`].
pub fn check_amount(what: &str, amount: Decimal) -> Result<(), WorkflowError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(WorkflowError::validation(format!("{what} cannot be negative")));
    }
    if amount > MAX_AMOUNT {
        return Err(WorkflowError::validation(format!(
            "{what} {amount} exceeds the maximum of {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

/// A percent-or-fixed amount rule.
///
/// Shared by payment-plan surcharges, marketplace commission and processor
/// fee estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Adjustment {
    /// Percentage of the base, e.g. `Percent(10)` is 10%.
    Percent(Decimal),
    Fixed(Decimal),
}

impl Adjustment {
    /// Amount this rule adds on top of `base`, rounded to cents.
    /// Saturates instead of overflowing.
    pub fn apply(&self, base: Decimal) -> Decimal {
        self.checked_apply(base).unwrap_or(Decimal::MAX)
    }

    pub fn checked_apply(&self, base: Decimal) -> Option<Decimal> {
        match self {
            Adjustment::Percent(pct) => Some(
                base.checked_mul(*pct)?
                    .checked_div(Decimal::ONE_HUNDRED)?
                    .round_dp(2),
            ),
            Adjustment::Fixed(amount) => Some(*amount),
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Adjustment::Percent(v) | Adjustment::Fixed(v) => v.is_sign_negative() && !v.is_zero(),
        }
    }
}

/// One add-on service as seen by the totals calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCharge {
    pub price: Decimal,
    pub required: bool,
    pub selected: bool,
}

impl ServiceCharge {
    pub fn counts(&self) -> bool {
        self.required || self.selected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub product_total: Decimal,
    pub service_total: Decimal,
    pub surcharge_total: Decimal,
    pub grand_total: Decimal,
}

impl OrderTotals {
    fn saturated() -> Self {
        Self {
            product_total: Decimal::MAX,
            service_total: Decimal::MAX,
            surcharge_total: Decimal::MAX,
            grand_total: Decimal::MAX,
        }
    }
}

/// Authoritative order totals.
///
/// `grand = (product if buy_for_me else 0) + service + Σ surcharge(base)`
/// where `base` is `product + service` for buy-for-me and `service` alone for
/// ship-for-me. Product total is always reported, even when it does not
/// contribute.
///
/// Order inputs are bounded at creation, so stored orders never overflow;
/// if one does, every figure saturates at `Decimal::MAX`.
pub fn compute_totals(
    service_type: ServiceType,
    line_items: &[LineItem],
    services: &[ServiceCharge],
    surcharges: &[Adjustment],
) -> OrderTotals {
    checked_totals(service_type, line_items, services, surcharges)
        .unwrap_or_else(OrderTotals::saturated)
}

/// Same as [`compute_totals`] but `None` on arithmetic overflow.
pub fn checked_totals(
    service_type: ServiceType,
    line_items: &[LineItem],
    services: &[ServiceCharge],
    surcharges: &[Adjustment],
) -> Option<OrderTotals> {
    let mut product_total = Decimal::ZERO;
    for item in line_items {
        product_total = product_total.checked_add(item.checked_subtotal()?)?;
    }

    let mut service_total = Decimal::ZERO;
    for service in services.iter().filter(|s| s.counts()) {
        service_total = service_total.checked_add(service.price)?;
    }

    let contributing_product = match service_type {
        ServiceType::BuyForMe => product_total,
        ServiceType::ShipForMe => Decimal::ZERO,
    };
    let base = contributing_product.checked_add(service_total)?;

    let mut surcharge_total = Decimal::ZERO;
    for surcharge in surcharges {
        surcharge_total = surcharge_total.checked_add(surcharge.checked_apply(base)?)?;
    }

    Some(OrderTotals {
        product_total,
        service_total,
        surcharge_total,
        grand_total: base.checked_add(surcharge_total)?,
    })
}
