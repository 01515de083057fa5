use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::ServiceType;
use crate::workflow::Adjustment;

/// An add-on service offered for a service type (insurance, repackaging, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOnService {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub required: bool,
}

/// A payment-plan surcharge layered onto an order's base total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub name: String,
    pub adjustment: Adjustment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeCatalog {
    pub services: Vec<AddOnService>,
    pub payment_plans: Vec<PaymentPlan>,
}

impl ServiceTypeCatalog {
    pub fn service(&self, id: &str) -> Option<&AddOnService> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Server-side price list. Clients only ever send service ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub ship_for_me: ServiceTypeCatalog,
    pub buy_for_me: ServiceTypeCatalog,
}

impl Catalog {
    pub fn for_service_type(&self, service_type: ServiceType) -> &ServiceTypeCatalog {
        match service_type {
            ServiceType::ShipForMe => &self.ship_for_me,
            ServiceType::BuyForMe => &self.buy_for_me,
        }
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read catalog {}: {e}", path.display()))?;
        let catalog: Catalog = serde_json::from_str(&raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (kind, section) in [("ship_for_me", &self.ship_for_me), ("buy_for_me", &self.buy_for_me)] {
            for service in &section.services {
                if service.price.is_sign_negative() {
                    anyhow::bail!("{kind} service {} has a negative price", service.id);
                }
            }
            for plan in &section.payment_plans {
                if plan.adjustment.is_negative() {
                    anyhow::bail!("{kind} payment plan {} is negative", plan.name);
                }
            }
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let shared_services = vec![
            AddOnService {
                id: "consolidation".into(),
                name: "Package consolidation".into(),
                price: Decimal::from(3),
                required: true,
            },
            AddOnService {
                id: "insurance".into(),
                name: "Shipping insurance".into(),
                price: Decimal::from(2),
                required: false,
            },
            AddOnService {
                id: "repackaging".into(),
                name: "Repackaging".into(),
                price: Decimal::new(450, 2),
                required: false,
            },
        ];

        Self {
            ship_for_me: ServiceTypeCatalog {
                services: shared_services.clone(),
                payment_plans: vec![PaymentPlan {
                    name: "standard".into(),
                    adjustment: Adjustment::Percent(Decimal::from(5)),
                }],
            },
            buy_for_me: ServiceTypeCatalog {
                services: shared_services,
                payment_plans: vec![PaymentPlan {
                    name: "purchase handling".into(),
                    adjustment: Adjustment::Fixed(Decimal::from(5)),
                }],
            },
        }
    }
}
