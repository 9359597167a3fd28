use ulid::Ulid;

use crate::calendar::now_ms;
use crate::limits::*;
use crate::model::*;

use super::error::*;
use super::{apply_to_config, apply_to_directory, apply_to_kitchen, apply_to_projector, Store, StoreError};

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), StoreError> {
    if value.len() > max {
        return Err(StoreError::LimitExceeded(what));
    }
    Ok(())
}

fn require_resident(dir: &Directory, resident_id: Ulid) -> Result<(), StoreError> {
    if dir.residents.contains_key(&resident_id) {
        Ok(())
    } else {
        Err(StoreError::ForeignKeyViolation {
            constraint: RESIDENT_FKEY,
            resident_id,
        })
    }
}

impl Store {
    // ── Directory ────────────────────────────────────────────

    pub async fn insert_resident(&self, resident: Resident) -> Result<(), StoreError> {
        if resident.name.trim().is_empty() {
            return Err(StoreError::Invalid("resident name is empty"));
        }
        if resident.room_number.trim().is_empty() {
            return Err(StoreError::Invalid("room number is empty"));
        }
        check_len(&resident.name, MAX_NAME_LEN, "resident name too long")?;
        check_len(&resident.room_number, MAX_ROOM_LEN, "room number too long")?;
        if let Some(phone) = &resident.phone {
            check_len(phone, MAX_PHONE_LEN, "phone number too long")?;
        }

        let mut dir = self.directory.write().await;
        if dir.residents.len() >= MAX_RESIDENTS {
            return Err(StoreError::LimitExceeded("too many residents"));
        }
        if dir.residents.contains_key(&resident.id) {
            return Err(StoreError::UniqueViolation(RESIDENTS_PKEY));
        }
        if dir.find(&resident.name, &resident.room_number).is_some() {
            return Err(StoreError::UniqueViolation(RESIDENTS_NAME_ROOM_KEY));
        }

        tracing::debug!("resident {} created (room {})", resident.id, resident.room_number);
        self.commit(&mut *dir, Event::ResidentCreated { resident }, apply_to_directory)
            .await
    }

    pub async fn update_phone(&self, resident_id: Ulid, phone: Option<String>) -> Result<(), StoreError> {
        if let Some(p) = &phone {
            check_len(p, MAX_PHONE_LEN, "phone number too long")?;
        }
        let mut dir = self.directory.write().await;
        if !dir.residents.contains_key(&resident_id) {
            return Err(StoreError::NotFound(resident_id));
        }
        self.commit(&mut *dir, Event::PhoneUpdated { resident_id, phone }, apply_to_directory)
            .await
    }

    pub async fn grant_admin(&self, resident_id: Ulid) -> Result<(), StoreError> {
        let mut dir = self.directory.write().await;
        require_resident(&dir, resident_id)?;
        if dir.admins.contains_key(&resident_id) {
            return Err(StoreError::UniqueViolation(USER_ROLES_RESIDENT_KEY));
        }
        let event = Event::AdminGranted {
            resident_id,
            granted_at: now_ms(),
        };
        self.commit(&mut *dir, event, apply_to_directory).await
    }

    /// Returns whether a grant was removed.
    pub async fn revoke_admin(&self, resident_id: Ulid) -> Result<bool, StoreError> {
        let mut dir = self.directory.write().await;
        if !dir.admins.contains_key(&resident_id) {
            return Ok(false);
        }
        self.commit(&mut *dir, Event::AdminRevoked { resident_id }, apply_to_directory)
            .await?;
        Ok(true)
    }

    /// Tag a resident as blocked. Their bookings are left alone.
    pub async fn block_resident(
        &self,
        resident_id: Ulid,
        reason: Option<String>,
    ) -> Result<BlockRecord, StoreError> {
        if let Some(r) = &reason {
            check_len(r, MAX_REASON_LEN, "block reason too long")?;
        }
        let mut dir = self.directory.write().await;
        require_resident(&dir, resident_id)?;
        if dir.blocks.contains_key(&resident_id) {
            return Err(StoreError::UniqueViolation(BLOCKED_USERS_RESIDENT_KEY));
        }
        let block = BlockRecord {
            resident_id,
            reason,
            blocked_at: now_ms(),
        };
        self.commit(&mut *dir, Event::ResidentBlocked { block: block.clone() }, apply_to_directory)
            .await?;
        tracing::info!("resident {resident_id} blocked");
        Ok(block)
    }

    /// Returns whether a block was removed.
    pub async fn unblock_resident(&self, resident_id: Ulid) -> Result<bool, StoreError> {
        let mut dir = self.directory.write().await;
        if !dir.blocks.contains_key(&resident_id) {
            return Ok(false);
        }
        self.commit(&mut *dir, Event::ResidentUnblocked { resident_id }, apply_to_directory)
            .await?;
        tracing::info!("resident {resident_id} unblocked");
        Ok(true)
    }

    // ── Kitchen ──────────────────────────────────────────────

    /// Insert a kitchen booking. `(date, slot)` and `(resident, date)` are
    /// checked under the ledger's write lock, so of two racing writers for
    /// the same slot exactly one wins and the other gets a unique violation.
    pub async fn insert_kitchen_booking(&self, booking: KitchenBooking) -> Result<(), StoreError> {
        let dir = self.directory.read().await;
        require_resident(&dir, booking.resident_id)?;
        let mut ledger = self.kitchen.write().await;
        drop(dir);

        if ledger.index.contains_key(&booking.id) {
            return Err(StoreError::UniqueViolation(KITCHEN_PKEY));
        }
        if ledger.get(booking.date, booking.slot).is_some() {
            return Err(StoreError::UniqueViolation(KITCHEN_DATE_SLOT_KEY));
        }
        if ledger
            .on_day(booking.date)
            .any(|b| b.resident_id == booking.resident_id)
        {
            return Err(StoreError::UniqueViolation(KITCHEN_RESIDENT_DAY_KEY));
        }

        self.commit(&mut *ledger, Event::KitchenBooked { booking }, apply_to_kitchen)
            .await
    }

    /// Delete by id, whoever owns it.
    pub async fn delete_kitchen_booking(&self, id: Ulid) -> Result<KitchenBooking, StoreError> {
        let mut ledger = self.kitchen.write().await;
        let booking = ledger
            .index
            .get(&id)
            .and_then(|(date, slot)| ledger.get(*date, *slot))
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        self.commit(&mut *ledger, Event::KitchenCancelled { id }, apply_to_kitchen)
            .await?;
        Ok(booking)
    }

    // ── Projector ────────────────────────────────────────────

    /// Insert a projector booking. Overlap with any other booking and the
    /// resident's weekly hour cap (over the booking's own Monday–Sunday week)
    /// are checked under the ledger's write lock.
    pub async fn insert_projector_booking(&self, booking: ProjectorBooking) -> Result<(), StoreError> {
        if !(PROJECTOR_MIN_HOURS..=PROJECTOR_MAX_HOURS).contains(&booking.duration_hours) {
            return Err(StoreError::Invalid("duration must be 1-6 hours"));
        }
        if booking.span != Span::from_hours(booking.span.start, booking.duration_hours) {
            return Err(StoreError::Invalid("end must equal start plus duration"));
        }

        let dir = self.directory.read().await;
        require_resident(&dir, booking.resident_id)?;
        let mut ledger = self.projector.write().await;
        drop(dir);

        if ledger.bookings.iter().any(|b| b.id == booking.id) {
            return Err(StoreError::UniqueViolation(PROJECTOR_PKEY));
        }
        if let Some(existing) = ledger.overlapping(&booking.span).next() {
            return Err(StoreError::Overlap(existing.id));
        }

        let week = self.calendar.week_containing(booking.span.start);
        let used: i64 = ledger
            .starting_between(week.start, week.end)
            .filter(|b| b.resident_id == booking.resident_id)
            .map(|b| i64::from(b.duration_hours))
            .sum();
        if used + i64::from(booking.duration_hours) > PROJECTOR_WEEKLY_HOURS {
            return Err(StoreError::WeeklyCapExceeded {
                remaining: PROJECTOR_WEEKLY_HOURS - used,
            });
        }

        self.commit(&mut *ledger, Event::ProjectorBooked { booking }, apply_to_projector)
            .await
    }

    pub async fn delete_projector_booking(&self, id: Ulid) -> Result<ProjectorBooking, StoreError> {
        let mut ledger = self.projector.write().await;
        let booking = ledger
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        self.commit(&mut *ledger, Event::ProjectorCancelled { id }, apply_to_projector)
            .await?;
        Ok(booking)
    }

    // ── Configuration ────────────────────────────────────────

    /// Insert or replace the value stored under `key`.
    pub async fn set_config(&self, key: &str, value: String) -> Result<ConfigEntry, StoreError> {
        if key.is_empty() {
            return Err(StoreError::Invalid("config key is empty"));
        }
        check_len(key, MAX_CONFIG_KEY_LEN, "config key too long")?;
        check_len(&value, MAX_CONFIG_VALUE_LEN, "config value too long")?;

        let mut config = self.config.write().await;
        let entry = ConfigEntry {
            key: key.to_string(),
            value,
            updated_at: now_ms(),
        };
        self.commit(&mut *config, Event::ConfigSet { entry: entry.clone() }, apply_to_config)
            .await?;
        Ok(entry)
    }
}
