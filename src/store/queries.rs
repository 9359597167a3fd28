use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Store, StoreError};

/// Kitchen read filter: `from <= date <= to`, optionally one resident's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KitchenFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub resident_id: Option<Ulid>,
}

impl KitchenFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            resident_id: None,
        }
    }

    pub fn for_resident(mut self, resident_id: Ulid) -> Self {
        self.resident_id = Some(resident_id);
        self
    }

    fn check_window(&self) -> Result<(), StoreError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && (to - from).num_days() > MAX_QUERY_WINDOW_DAYS
        {
            return Err(StoreError::LimitExceeded("query window too wide"));
        }
        Ok(())
    }
}

/// Projector read filter: `from <= start <= to`, optionally one resident's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorFilter {
    pub from: Option<Ms>,
    pub to: Option<Ms>,
    pub resident_id: Option<Ulid>,
}

impl ProjectorFilter {
    pub fn between(from: Ms, to: Ms) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            resident_id: None,
        }
    }

    pub fn for_resident(mut self, resident_id: Ulid) -> Self {
        self.resident_id = Some(resident_id);
        self
    }

    fn check_window(&self) -> Result<(), StoreError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && to.saturating_sub(from) > MAX_QUERY_WINDOW_MS
        {
            return Err(StoreError::LimitExceeded("query window too wide"));
        }
        Ok(())
    }
}

impl Store {
    // ── Directory ────────────────────────────────────────────

    /// Look a resident up by the `(name, room_number)` login key.
    pub async fn find_resident(&self, name: &str, room_number: &str) -> Option<Resident> {
        self.directory.read().await.find(name, room_number).cloned()
    }

    pub async fn get_resident(&self, id: Ulid) -> Option<Resident> {
        self.directory.read().await.residents.get(&id).cloned()
    }

    /// Every resident with their role and block tags, newest first.
    pub async fn residents_newest_first(&self) -> Vec<ResidentStatus> {
        let dir = self.directory.read().await;
        let mut rows: Vec<ResidentStatus> = dir
            .residents
            .values()
            .map(|r| ResidentStatus {
                resident: r.clone(),
                is_admin: dir.admins.contains_key(&r.id),
                block: dir.blocks.get(&r.id).cloned(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.resident
                .created_at
                .cmp(&a.resident.created_at)
                .then(b.resident.id.cmp(&a.resident.id))
        });
        rows
    }

    pub async fn is_admin(&self, resident_id: Ulid) -> bool {
        self.directory.read().await.admins.contains_key(&resident_id)
    }

    pub async fn block_of(&self, resident_id: Ulid) -> Option<BlockRecord> {
        self.directory.read().await.blocks.get(&resident_id).cloned()
    }

    /// `(resident_id, granted_at)` for every admin, oldest grant first.
    pub async fn admin_grants(&self) -> Vec<(Ulid, Ms)> {
        let dir = self.directory.read().await;
        let mut grants: Vec<(Ulid, Ms)> = dir.admins.iter().map(|(id, at)| (*id, *at)).collect();
        grants.sort_by_key(|(id, at)| (*at, *id));
        grants
    }

    pub async fn blocks(&self) -> Vec<BlockRecord> {
        let dir = self.directory.read().await;
        let mut blocks: Vec<BlockRecord> = dir.blocks.values().cloned().collect();
        blocks.sort_by_key(|b| (b.blocked_at, b.resident_id));
        blocks
    }

    // ── Kitchen ──────────────────────────────────────────────

    /// Kitchen bookings matching `filter`, by date then slot, with owners.
    pub async fn kitchen_bookings(&self, filter: KitchenFilter) -> Result<Vec<KitchenBookingRow>, StoreError> {
        filter.check_window()?;
        let dir = self.directory.read().await;
        let ledger = self.kitchen.read().await;
        let from = filter.from.unwrap_or(NaiveDate::MIN);
        let to = filter.to.unwrap_or(NaiveDate::MAX);
        Ok(ledger
            .between(from, to)
            .filter(|b| filter.resident_id.is_none_or(|id| b.resident_id == id))
            .map(|b| KitchenBookingRow {
                booking: b.clone(),
                owner: dir.owner(&b.resident_id),
            })
            .collect())
    }

    /// The `limit` kitchen bookings with the latest dates, latest first.
    pub async fn recent_kitchen(&self, limit: usize) -> Vec<KitchenBookingRow> {
        let dir = self.directory.read().await;
        let ledger = self.kitchen.read().await;
        ledger
            .by_slot
            .values()
            .rev()
            .take(limit)
            .map(|b| KitchenBookingRow {
                booking: b.clone(),
                owner: dir.owner(&b.resident_id),
            })
            .collect()
    }

    // ── Projector ────────────────────────────────────────────

    /// Projector bookings matching `filter`, by start, with owners.
    pub async fn projector_bookings(
        &self,
        filter: ProjectorFilter,
    ) -> Result<Vec<ProjectorBookingRow>, StoreError> {
        filter.check_window()?;
        let dir = self.directory.read().await;
        let ledger = self.projector.read().await;
        let from = filter.from.unwrap_or(Ms::MIN);
        let to = filter.to.unwrap_or(Ms::MAX);
        Ok(ledger
            .starting_between(from, to)
            .filter(|b| filter.resident_id.is_none_or(|id| b.resident_id == id))
            .map(|b| ProjectorBookingRow {
                booking: b.clone(),
                owner: dir.owner(&b.resident_id),
            })
            .collect())
    }

    /// Total booked hours for `resident_id` over bookings starting in `[from, to]`.
    pub async fn resident_hours(&self, resident_id: Ulid, from: Ms, to: Ms) -> i64 {
        self.projector
            .read()
            .await
            .starting_between(from, to)
            .filter(|b| b.resident_id == resident_id)
            .map(|b| i64::from(b.duration_hours))
            .sum()
    }

    /// The `limit` projector bookings with the latest start, latest first.
    pub async fn recent_projector(&self, limit: usize) -> Vec<ProjectorBookingRow> {
        let dir = self.directory.read().await;
        let ledger = self.projector.read().await;
        ledger
            .bookings
            .iter()
            .rev()
            .take(limit)
            .map(|b| ProjectorBookingRow {
                booking: b.clone(),
                owner: dir.owner(&b.resident_id),
            })
            .collect()
    }

    // ── Configuration ────────────────────────────────────────

    pub async fn config(&self, key: &str) -> Option<ConfigEntry> {
        self.config.read().await.get(key).cloned()
    }

    pub async fn config_entries(&self) -> Vec<ConfigEntry> {
        let config = self.config.read().await;
        let mut entries: Vec<ConfigEntry> = config.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}
