//! Per-resource booking views.
//!
//! A view owns one week's snapshot of a resource's bookings for one resident.
//! It answers eligibility questions against that snapshot, writes through to
//! the [`Store`](crate::store::Store), and re-fetches after every successful
//! write. The store re-checks every rule under its own lock, so a snapshot
//! that went stale between check and write surfaces as a race-lost error
//! rather than a broken invariant.

pub mod kitchen;
pub mod overview;
pub mod projector;

pub use kitchen::{KitchenBookings, SlotStatus};
pub use overview::{overview, Overview};
pub use projector::ProjectorBookings;

use tokio::sync::broadcast;

use crate::eligibility::Denial;
use crate::model::Event;
use crate::store::{StoreError, KITCHEN_DATE_SLOT_KEY, KITCHEN_RESIDENT_DAY_KEY};

pub const SLOT_TAKEN_RACE: &str = "This slot was just booked by someone else";
pub const DAY_TAKEN_RACE: &str = "You already have a kitchen slot on this day";
pub const TIME_TAKEN_RACE: &str = "This time was just booked by someone else";

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Denied(#[from] Denial),
    /// The snapshot said yes but another writer got there first.
    #[error("{0}")]
    RaceLost(&'static str),
    #[error("{0}")]
    Backend(StoreError),
}

impl BookingError {
    /// Classify a rejected write.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(KITCHEN_DATE_SLOT_KEY) => BookingError::RaceLost(SLOT_TAKEN_RACE),
            StoreError::UniqueViolation(KITCHEN_RESIDENT_DAY_KEY) => BookingError::RaceLost(DAY_TAKEN_RACE),
            StoreError::Overlap(_) => BookingError::RaceLost(TIME_TAKEN_RACE),
            StoreError::WeeklyCapExceeded { remaining } => {
                BookingError::Denied(Denial::WeeklyCap { remaining })
            }
            other => BookingError::Backend(other),
        }
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            BookingError::Denied(_) => "denied",
            BookingError::RaceLost(_) => "race_lost",
            BookingError::Backend(_) => "error",
        }
    }
}

/// Drain pending change notifications; true if anything arrived (or the
/// receiver lagged and dropped some).
pub(crate) fn drain_changes(rx: &mut broadcast::Receiver<Event>) -> bool {
    let mut changed = false;
    loop {
        match rx.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
            Err(_) => return changed,
        }
    }
}

pub(crate) fn record_outcome(resource: &'static str, outcome: &'static str) {
    metrics::counter!(
        crate::observability::BOOKINGS_TOTAL,
        "resource" => resource,
        "outcome" => outcome
    )
    .increment(1);
}
