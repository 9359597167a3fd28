//! Booking eligibility: pure predicates over a fetched snapshot.
//!
//! Nothing here touches the store. Callers pass in the snapshot, the
//! resident (if any) and the instant to evaluate against, and get back
//! either [`Eligibility::Allowed`] or the first rule that failed.

pub mod kitchen;
pub mod projector;

pub use kitchen::check_slot;
pub use projector::check_request;

/// Why a booking attempt is refused. `Display` is the message shown to the
/// resident.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Please log in to book")]
    NotLoggedIn,
    #[error("Invalid slot")]
    InvalidSlot,
    #[error("Must book at least 24 hours in advance")]
    TooLate,
    #[error("Booked by {by}")]
    SlotTaken { by: String },
    #[error("You can only book 1 slot per day")]
    OnePerDay,
    #[error("Cannot book more than 60 days in advance")]
    TooFarAhead,
    #[error("Cannot book in the past")]
    InPast,
    #[error("Duration must be 1-6 hours")]
    BadDuration,
    #[error("You have {remaining} hours left this week")]
    WeeklyCap { remaining: i64 },
    #[error("This time overlaps with an existing booking")]
    Overlap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(Denial),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    /// The refusal message, if denied.
    pub fn reason(&self) -> Option<String> {
        match self {
            Eligibility::Allowed => None,
            Eligibility::Denied(d) => Some(d.to_string()),
        }
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Eligibility::Allowed => Ok(()),
            Eligibility::Denied(d) => Err(d),
        }
    }
}

impl From<Denial> for Eligibility {
    fn from(d: Denial) -> Self {
        Eligibility::Denied(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_messages() {
        assert_eq!(
            Denial::SlotTaken { by: "Ada".into() }.to_string(),
            "Booked by Ada"
        );
        assert_eq!(
            Denial::WeeklyCap { remaining: 0 }.to_string(),
            "You have 0 hours left this week"
        );
        assert_eq!(Denial::NotLoggedIn.to_string(), "Please log in to book");
    }

    #[test]
    fn eligibility_helpers() {
        assert!(Eligibility::Allowed.is_allowed());
        assert_eq!(Eligibility::Allowed.reason(), None);
        let denied = Eligibility::from(Denial::InPast);
        assert!(!denied.is_allowed());
        assert_eq!(denied.reason().as_deref(), Some("Cannot book in the past"));
        assert_eq!(denied.into_result(), Err(Denial::InPast));
    }
}
