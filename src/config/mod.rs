use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

use crate::workflow::Adjustment;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// In-memory store when unset.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,

    // Ledger
    pub commission_percent: Decimal,
    pub commission_fixed: Option<Decimal>,
    pub processor_fee_percent: Decimal,

    // Payment processor (dry-run when no URL is configured)
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_key: Option<String>,
    pub payment_timeout_secs: u64,
    pub payment_webhook_secret: Option<String>,

    pub catalog_path: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let commission_percent = decimal_var("COMMISSION_PERCENT", Decimal::from(10))?;
        let commission_fixed = optional_var("COMMISSION_FIXED")
            .map(|v| v.parse::<Decimal>())
            .transpose()
            .map_err(|e| anyhow::anyhow!("COMMISSION_FIXED: {e}"))?;
        let processor_fee_percent = decimal_var("PROCESSOR_FEE_PERCENT", Decimal::from(3))?;

        if commission_percent < Decimal::ZERO || commission_percent > Decimal::from(100) {
            anyhow::bail!("COMMISSION_PERCENT must be between 0 and 100");
        }
        if commission_fixed.is_some_and(|f| f < Decimal::ZERO) {
            anyhow::bail!("COMMISSION_FIXED cannot be negative");
        }
        if processor_fee_percent < Decimal::ZERO || processor_fee_percent > Decimal::from(100) {
            anyhow::bail!("PROCESSOR_FEE_PERCENT must be between 0 and 100");
        }

        Ok(Self {
            database_url: optional_var("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            commission_percent,
            commission_fixed,
            processor_fee_percent,

            payment_gateway_url: optional_var("PAYMENT_GATEWAY_URL"),
            payment_gateway_key: optional_var("PAYMENT_GATEWAY_KEY"),
            payment_timeout_secs: optional_var("PAYMENT_TIMEOUT_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("PAYMENT_TIMEOUT_SECS: {e}"))?
                .unwrap_or(15),
            payment_webhook_secret: optional_var("PAYMENT_WEBHOOK_SECRET"),

            catalog_path: optional_var("CATALOG_PATH"),
        })
    }

    /// A fixed commission, when configured, replaces the percentage.
    pub fn commission_rule(&self) -> Adjustment {
        match self.commission_fixed {
            Some(fixed) => Adjustment::Fixed(fixed),
            None => Adjustment::Percent(self.commission_percent),
        }
    }

    pub fn processor_fee_rule(&self) -> Adjustment {
        Adjustment::Percent(self.processor_fee_percent)
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs.max(1))
    }

    /// Returns true if a real payment processor is configured.
    pub fn has_payment_gateway(&self) -> bool {
        self.payment_gateway_url.is_some() && self.payment_gateway_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".into(),
            port: 8080,
            commission_percent: Decimal::from(10),
            commission_fixed: None,
            processor_fee_percent: Decimal::from(3),
            payment_gateway_url: None,
            payment_gateway_key: None,
            payment_timeout_secs: 15,
            payment_webhook_secret: None,
            catalog_path: None,
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn decimal_var(key: &str, default: Decimal) -> anyhow::Result<Decimal> {
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_commission_overrides_percent() {
        let mut config = AppConfig::default();
        assert_eq!(config.commission_rule(), Adjustment::Percent(Decimal::from(10)));

        config.commission_fixed = Some(Decimal::from(2));
        assert_eq!(config.commission_rule(), Adjustment::Fixed(Decimal::from(2)));
    }

    #[test]
    fn timeout_never_zero() {
        let config = AppConfig {
            payment_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.payment_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        env::set_var("PAYMENT_TIMEOUT_SECS", "soon");
        let result = AppConfig::from_env();
        env::remove_var("PAYMENT_TIMEOUT_SECS");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("PAYMENT_TIMEOUT_SECS"), "{err}");
    }
}
