use thiserror::Error;

/// Errors that can occur while delivering an asset to a target.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The asset is larger than the channel accepts.
    #[error("Asset too large: {size} bytes (max {max})")]
    SizeExceeded { size: u64, max: u64 },

    /// The target kind cannot receive this kind of delivery.
    #[error("Unsupported target: {0}")]
    Unsupported(String),

    /// Any other delivery failure.
    #[error("Send failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    pub fn is_size_exceeded(&self) -> bool {
        matches!(self, DeliveryError::SizeExceeded { .. })
    }
}
