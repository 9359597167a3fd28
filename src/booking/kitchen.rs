use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::calendar::{now_ms, WeekWindow};
use crate::eligibility::{self, Eligibility};
use crate::model::*;
use crate::store::{KitchenFilter, Store, StoreError};

use super::{drain_changes, record_outcome, BookingError};

/// What the resident sees for one `(date, slot)` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Own(KitchenBooking),
    Taken(KitchenBookingRow),
    Free(Eligibility),
}

/// One week of kitchen bookings as seen by one (possibly anonymous) resident.
pub struct KitchenBookings {
    store: Arc<Store>,
    resident: Option<Resident>,
    week: WeekWindow,
    snapshot: Vec<KitchenBookingRow>,
    changes: broadcast::Receiver<Event>,
}

impl KitchenBookings {
    /// Open a view on the week containing `anchor` and fetch it.
    pub async fn load(
        store: Arc<Store>,
        resident: Option<Resident>,
        anchor: NaiveDate,
    ) -> Result<Self, StoreError> {
        let week = store.calendar().week_of(anchor);
        let changes = store.notify.subscribe(Channel::Kitchen);
        let mut view = Self {
            store,
            resident,
            week,
            snapshot: Vec::new(),
            changes,
        };
        view.refresh().await?;
        Ok(view)
    }

    pub fn week(&self) -> &WeekWindow {
        &self.week
    }

    pub fn snapshot(&self) -> &[KitchenBookingRow] {
        &self.snapshot
    }

    pub fn resident(&self) -> Option<&Resident> {
        self.resident.as_ref()
    }

    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        drain_changes(&mut self.changes);
        self.snapshot = self
            .store
            .kitchen_bookings(KitchenFilter::between(self.week.monday, self.week.sunday))
            .await?;
        Ok(())
    }

    /// Re-fetch only if the store reported kitchen changes since the last fetch.
    pub async fn refresh_if_changed(&mut self) -> Result<bool, StoreError> {
        if !drain_changes(&mut self.changes) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    /// Move to the week containing `anchor` and fetch it.
    pub async fn set_week(&mut self, anchor: NaiveDate) -> Result<(), StoreError> {
        self.week = self.store.calendar().week_of(anchor);
        self.refresh().await
    }

    pub fn slot_status(&self, date: NaiveDate, slot: KitchenSlot, now: Ms) -> SlotStatus {
        let taken = self
            .snapshot
            .iter()
            .find(|row| row.booking.date == date && row.booking.slot == slot);
        match (taken, &self.resident) {
            (Some(row), Some(me)) if row.booking.resident_id == me.id => SlotStatus::Own(row.booking.clone()),
            (Some(row), _) => SlotStatus::Taken(row.clone()),
            (None, _) => SlotStatus::Free(self.can_book(date, slot.id(), now)),
        }
    }

    pub fn can_book(&self, date: NaiveDate, slot_id: &str, now: Ms) -> Eligibility {
        eligibility::check_slot(
            self.resident.as_ref(),
            date,
            slot_id,
            &self.snapshot,
            self.store.calendar(),
            now,
        )
    }

    /// Book `slot_id` on `date` for the viewing resident.
    pub async fn book(&mut self, date: NaiveDate, slot_id: &str) -> Result<KitchenBooking, BookingError> {
        let now = now_ms();
        if let Eligibility::Denied(denial) = self.can_book(date, slot_id, now) {
            tracing::debug!("kitchen {date} {slot_id} denied: {denial}");
            record_outcome("kitchen", "denied");
            return Err(denial.into());
        }
        // Both are checked by can_book.
        let (Some(resident), Ok(slot)) = (&self.resident, slot_id.parse::<KitchenSlot>()) else {
            return Err(eligibility::Denial::InvalidSlot.into());
        };

        let booking = KitchenBooking {
            id: Ulid::new(),
            resident_id: resident.id,
            date,
            slot,
            created_at: now,
        };
        if let Err(e) = self.store.insert_kitchen_booking(booking.clone()).await {
            let err = BookingError::from_store(e);
            tracing::info!("kitchen {date} {slot} for {} rejected: {err}", resident.id);
            record_outcome("kitchen", err.outcome_label());
            return Err(err);
        }

        tracing::info!("kitchen {date} {slot} booked by {}", resident.id);
        record_outcome("kitchen", "booked");
        if let Err(e) = self.refresh().await {
            tracing::warn!("kitchen refresh after booking failed: {e}");
        }
        Ok(booking)
    }

    /// Cancel any kitchen booking by id.
    pub async fn cancel(&mut self, id: Ulid) -> Result<KitchenBooking, BookingError> {
        let removed = self
            .store
            .delete_kitchen_booking(id)
            .await
            .map_err(BookingError::Backend)?;
        tracing::info!("kitchen booking {id} cancelled");
        record_outcome("kitchen", "cancelled");
        if let Err(e) = self.refresh().await {
            tracing::warn!("kitchen refresh after cancel failed: {e}");
        }
        Ok(removed)
    }
}
