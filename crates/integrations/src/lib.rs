//! HTTP adapters for the engine's external collaborators.

pub use error::IntegrationError;
pub use notifier::HttpNotifier;
pub use paystack::{DEFAULT_BASE_URL as PAYSTACK_BASE_URL, PaystackClient};

mod error;
mod notifier;
mod paystack;

pub type Result<T> = std::result::Result<T, IntegrationError>;
