use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::calendar::{now_ms, WeekWindow};
use crate::eligibility::{self, Eligibility};
use crate::model::*;
use crate::store::{ProjectorFilter, Store, StoreError};

use super::{drain_changes, record_outcome, BookingError};

/// One week of projector bookings as seen by one (possibly anonymous) resident.
///
/// The weekly-hours figure used for the cap is always taken over the
/// displayed week, even when the requested start falls in another one.
/// The store enforces the cap over the booking's own week on write.
pub struct ProjectorBookings {
    store: Arc<Store>,
    resident: Option<Resident>,
    week: WeekWindow,
    snapshot: Vec<ProjectorBookingRow>,
    changes: broadcast::Receiver<Event>,
}

impl ProjectorBookings {
    pub async fn load(
        store: Arc<Store>,
        resident: Option<Resident>,
        anchor: NaiveDate,
    ) -> Result<Self, StoreError> {
        let week = store.calendar().week_of(anchor);
        let changes = store.notify.subscribe(Channel::Projector);
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

    pub fn snapshot(&self) -> &[ProjectorBookingRow] {
        &self.snapshot
    }

    pub fn resident(&self) -> Option<&Resident> {
        self.resident.as_ref()
    }

    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        drain_changes(&mut self.changes);
        self.snapshot = self
            .store
            .projector_bookings(ProjectorFilter::between(self.week.start, self.week.end))
            .await?;
        Ok(())
    }

    pub async fn refresh_if_changed(&mut self) -> Result<bool, StoreError> {
        if !drain_changes(&mut self.changes) {
            return Ok(false);
        }
        self.refresh().await?;
        Ok(true)
    }

    pub async fn set_week(&mut self, anchor: NaiveDate) -> Result<(), StoreError> {
        self.week = self.store.calendar().week_of(anchor);
        self.refresh().await
    }

    /// Snapshot bookings starting on local `date`.
    pub fn bookings_on(&self, date: NaiveDate) -> impl Iterator<Item = &ProjectorBookingRow> {
        let calendar = *self.store.calendar();
        self.snapshot
            .iter()
            .filter(move |row| calendar.date_of(row.booking.span.start) == date)
    }

    /// The resident's booked hours over the displayed week, fetched fresh.
    pub async fn weekly_hours(&self) -> i64 {
        match &self.resident {
            Some(r) => self.store.resident_hours(r.id, self.week.start, self.week.end).await,
            None => 0,
        }
    }

    pub async fn can_book(&self, start: Ms, duration_hours: u32, now: Ms) -> Eligibility {
        let weekly = self.weekly_hours().await;
        eligibility::check_request(
            self.resident.as_ref(),
            start,
            duration_hours,
            weekly,
            &self.snapshot,
            now,
        )
    }

    pub async fn book(&mut self, start: Ms, duration_hours: u32) -> Result<ProjectorBooking, BookingError> {
        let now = now_ms();
        if let Eligibility::Denied(denial) = self.can_book(start, duration_hours, now).await {
            tracing::debug!("projector {start} +{duration_hours}h denied: {denial}");
            record_outcome("projector", "denied");
            return Err(denial.into());
        }
        let Some(resident) = &self.resident else {
            return Err(eligibility::Denial::NotLoggedIn.into());
        };

        let booking = ProjectorBooking {
            id: Ulid::new(),
            resident_id: resident.id,
            span: Span::from_hours(start, duration_hours),
            duration_hours,
            created_at: now,
        };
        if let Err(e) = self.store.insert_projector_booking(booking.clone()).await {
            let err = BookingError::from_store(e);
            tracing::info!("projector {start} +{duration_hours}h for {} rejected: {err}", resident.id);
            record_outcome("projector", err.outcome_label());
            return Err(err);
        }

        tracing::info!("projector {start} +{duration_hours}h booked by {}", resident.id);
        record_outcome("projector", "booked");
        if let Err(e) = self.refresh().await {
            tracing::warn!("projector refresh after booking failed: {e}");
        }
        Ok(booking)
    }

    pub async fn cancel(&mut self, id: Ulid) -> Result<ProjectorBooking, BookingError> {
        let removed = self
            .store
            .delete_projector_booking(id)
            .await
            .map_err(BookingError::Backend)?;
        tracing::info!("projector booking {id} cancelled");
        record_outcome("projector", "cancelled");
        if let Err(e) = self.refresh().await {
            tracing::warn!("projector refresh after cancel failed: {e}");
        }
        Ok(removed)
    }
}
