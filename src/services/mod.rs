pub mod messages;
pub mod offers;
pub mod orders;
pub mod payments;
pub mod tracking;
pub mod wallet;

use std::sync::Arc;
use std::time::Duration;

pub use messages::{MessageService, NewMessage};
pub use offers::OfferService;
pub use orders::{NewOrder, OrderService};
pub use payments::{CaptureCallback, PaymentOutcome, PaymentService};
pub use tracking::{AppendOutcome, TrackingService};
pub use wallet::{CaptureRequest, TransactionFilter, WalletLedger};

use crate::db::Store;
use crate::models::Catalog;
use crate::payments::PaymentGateway;
use crate::workflow::{Adjustment, KeyedLocks};

/// Every workflow service wired against one store and one lock table.
#[derive(Clone)]
pub struct Services {
    pub orders: OrderService,
    pub offers: OfferService,
    pub tracking: TrackingService,
    pub ledger: WalletLedger,
    pub messages: MessageService,
    pub payments: PaymentService,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<Catalog>,
        commission: Adjustment,
        gateway: Arc<dyn PaymentGateway>,
        payment_timeout: Duration,
    ) -> Self {
        let locks = KeyedLocks::new();
        let tracking = TrackingService::new(store.clone(), locks.clone());
        let ledger = WalletLedger::new(store.clone(), locks.clone(), commission);

        Self {
            orders: OrderService::new(
                store.clone(),
                catalog,
                locks.clone(),
                tracking.clone(),
                ledger.clone(),
            ),
            offers: OfferService::new(store.clone(), locks.clone(), tracking.clone()),
            messages: MessageService::new(store.clone(), locks.clone()),
            payments: PaymentService::new(
                store,
                locks,
                tracking.clone(),
                ledger.clone(),
                gateway,
                payment_timeout,
            ),
            tracking,
            ledger,
        }
    }
}
