pub mod channel;
pub mod error;
pub mod types;

pub use channel::{DeliveryChannel, Notifier};
pub use error::DeliveryError;
pub use types::{MediaFile, Receipt, Upload};
