pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod payments;
pub mod services;
pub mod workflow;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Store;
use crate::models::Catalog;
use crate::payments::{PaymentGateway, WebhookSigner};
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub services: Services,
    pub config: AppConfig,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    pub webhook_signer: Option<WebhookSigner>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Catalog,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let services = Services::new(
            store.clone(),
            Arc::new(catalog),
            config.commission_rule(),
            gateway,
            config.payment_timeout(),
        );
        let webhook_signer = config
            .payment_webhook_secret
            .as_deref()
            .map(WebhookSigner::new);

        Self {
            store,
            services,
            config,
            metrics_handle: crate::metrics::init_metrics(),
            webhook_signer,
        }
    }
}
