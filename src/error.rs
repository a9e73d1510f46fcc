/// Error taxonomy shared by every booking component.
///
/// Domain operations return `Result<T, BookingError>`; the HTTP layer maps
/// each variant to a status code and a `detail` message.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::SlotTime;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Slot {slot_time} on {date} is already booked for this doctor")]
    SlotConflict {
        doctor_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
    },

    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Bill {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error("credential hashing failed: {0}")]
    Credential(#[from] bcrypt::BcryptError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        BookingError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        BookingError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BookingError::NotFound(message.into())
    }

    /// True for failures caused by the service itself rather than the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, BookingError::Credential(_) | BookingError::Storage(_))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_slot_and_date() {
        let err = BookingError::SlotConflict {
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            slot_time: "9:00 AM".parse().unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Slot 9:00 AM on 2025-03-03 is already booked for this doctor"
        );
        assert!(!err.is_internal());
    }

    #[test]
    fn storage_errors_are_internal() {
        assert!(BookingError::Storage("poisoned".into()).is_internal());
        assert!(!BookingError::validation("bad").is_internal());
    }
}
