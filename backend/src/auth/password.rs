use tracing::error;

use crate::error::AppError;

pub use bcrypt::DEFAULT_COST;

/// Returns a bcrypt hash in modular crypt format (`$2b$<cost>$...`).
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(password, cost).map_err(|e| {
        error!("failed to hash password: {}", e);
        AppError::InternalServerError
    })
}

/// A stored value that is not a bcrypt hash never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
