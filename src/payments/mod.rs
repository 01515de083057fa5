pub mod gateway;
pub mod signature;

pub use gateway::{CaptureReceipt, ChargeRequest, DryRunGateway, GatewayError, HttpGateway, PaymentGateway};
pub use signature::{SignatureError, WebhookSigner};
