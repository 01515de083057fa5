pub mod locks;
pub mod pricing;

pub use locks::KeyedLocks;
pub use pricing::{
    check_amount, checked_totals, compute_totals, Adjustment, OrderTotals, ServiceCharge,
    MAX_AMOUNT, MAX_QUANTITY,
};
