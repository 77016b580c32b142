use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Invalid rule for fragment {fragment:?}: capacity {capacity} must be positive and finite")]
    InvalidRule { fragment: String, capacity: f64 },

    #[error("Invalid default capacity {0}: must be positive and finite")]
    InvalidDefaultCapacity(f64),
}

pub type Result<T> = std::result::Result<T, ClientError>;
