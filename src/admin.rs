//! Administrator operations.
//!
//! Every call re-reads the caller's role from the store first; holding an
//! `AdminConsole` grants nothing by itself.

use std::sync::Arc;

use ulid::Ulid;

use crate::limits::{MAX_RECIPIENTS, RECENT_BOOKINGS_LIMIT};
use crate::model::*;
use crate::store::{Store, StoreError};

/// Config key holding the notification recipients as a JSON string array.
pub const RECIPIENTS_KEY: &str = "ra_emails";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Access denied. Admin only.")]
    Forbidden,
    #[error("You cannot change your own role or block status")]
    SelfChange,
    #[error("Please enter a valid email")]
    InvalidEmail,
    #[error("too many recipients")]
    TooManyRecipients,
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("could not encode recipients: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct AdminConsole {
    store: Arc<Store>,
    caller: Ulid,
}

impl AdminConsole {
    pub fn new(store: Arc<Store>, caller: Ulid) -> Self {
        Self { store, caller }
    }

    async fn authorize(&self) -> Result<(), AdminError> {
        if self.store.is_admin(self.caller).await {
            Ok(())
        } else {
            tracing::warn!("non-admin {} attempted an admin operation", self.caller);
            Err(AdminError::Forbidden)
        }
    }

    fn not_self(&self, resident_id: Ulid) -> Result<(), AdminError> {
        if resident_id == self.caller {
            Err(AdminError::SelfChange)
        } else {
            Ok(())
        }
    }

    // ── Residents ────────────────────────────────────────────

    pub async fn residents(&self) -> Result<Vec<ResidentStatus>, AdminError> {
        self.authorize().await?;
        Ok(self.store.residents_newest_first().await)
    }

    /// Grant or revoke the admin role; returns whether the resident is now an admin.
    pub async fn toggle_admin(&self, resident_id: Ulid) -> Result<bool, AdminError> {
        self.authorize().await?;
        self.not_self(resident_id)?;
        if self.store.revoke_admin(resident_id).await? {
            tracing::info!("{} revoked admin from {resident_id}", self.caller);
            return Ok(false);
        }
        self.store.grant_admin(resident_id).await?;
        tracing::info!("{} granted admin to {resident_id}", self.caller);
        Ok(true)
    }

    /// Block or unblock a resident; returns whether they are now blocked.
    /// Their bookings are untouched either way.
    pub async fn toggle_block(&self, resident_id: Ulid, reason: Option<String>) -> Result<bool, AdminError> {
        self.authorize().await?;
        self.not_self(resident_id)?;
        if self.store.unblock_resident(resident_id).await? {
            return Ok(false);
        }
        self.store.block_resident(resident_id, reason).await?;
        Ok(true)
    }

    // ── Bookings ─────────────────────────────────────────────

    pub async fn delete_kitchen_booking(&self, id: Ulid) -> Result<KitchenBooking, AdminError> {
        self.authorize().await?;
        let removed = self.store.delete_kitchen_booking(id).await?;
        tracing::info!("{} deleted kitchen booking {id}", self.caller);
        Ok(removed)
    }

    pub async fn delete_projector_booking(&self, id: Ulid) -> Result<ProjectorBooking, AdminError> {
        self.authorize().await?;
        let removed = self.store.delete_projector_booking(id).await?;
        tracing::info!("{} deleted projector booking {id}", self.caller);
        Ok(removed)
    }

    pub async fn recent_kitchen_bookings(&self) -> Result<Vec<KitchenBookingRow>, AdminError> {
        self.authorize().await?;
        Ok(self.store.recent_kitchen(RECENT_BOOKINGS_LIMIT).await)
    }

    pub async fn recent_projector_bookings(&self) -> Result<Vec<ProjectorBookingRow>, AdminError> {
        self.authorize().await?;
        Ok(self.store.recent_projector(RECENT_BOOKINGS_LIMIT).await)
    }

    // ── Notification recipients ──────────────────────────────

    /// Current recipient list. A missing or unparseable value reads as empty.
    pub async fn recipients(&self) -> Result<Vec<String>, AdminError> {
        self.authorize().await?;
        Ok(self.load_recipients().await)
    }

    async fn load_recipients(&self) -> Vec<String> {
        let Some(entry) = self.store.config(RECIPIENTS_KEY).await else {
            return Vec::new();
        };
        serde_json::from_str(&entry.value).unwrap_or_else(|e| {
            tracing::warn!("ignoring malformed {RECIPIENTS_KEY} value: {e}");
            Vec::new()
        })
    }

    async fn save_recipients(&self, list: &[String]) -> Result<(), AdminError> {
        let value = serde_json::to_string(list)?;
        self.store.set_config(RECIPIENTS_KEY, value).await?;
        Ok(())
    }

    /// Append `email` (trimmed) and write the whole list back.
    pub async fn add_recipient(&self, email: &str) -> Result<Vec<String>, AdminError> {
        self.authorize().await?;
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AdminError::InvalidEmail);
        }
        let mut list = self.load_recipients().await;
        if list.len() >= MAX_RECIPIENTS {
            return Err(AdminError::TooManyRecipients);
        }
        list.push(email.to_string());
        self.save_recipients(&list).await?;
        Ok(list)
    }

    /// Drop every occurrence of `email` and write the whole list back.
    pub async fn remove_recipient(&self, email: &str) -> Result<Vec<String>, AdminError> {
        self.authorize().await?;
        let mut list = self.load_recipients().await;
        list.retain(|e| e != email);
        self.save_recipients(&list).await?;
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{now_ms, Calendar};
    use crate::notify::NotifyHub;
    use chrono::{Days, NaiveDate};

    fn test_store(name: &str) -> Arc<Store> {
        let dir = std::env::temp_dir().join("housebook_test_admin");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        Arc::new(Store::new(path, Arc::new(NotifyHub::new()), Calendar::utc()).unwrap())
    }

    async fn add_resident(store: &Store, name: &str) -> Resident {
        let r = Resident {
            id: Ulid::new(),
            name: name.into(),
            room_number: "1".into(),
            phone: None,
            agreed_to_rules: true,
            created_at: now_ms(),
        };
        store.insert_resident(r.clone()).await.unwrap();
        r
    }

    async fn admin_console(store: &Arc<Store>) -> (AdminConsole, Resident) {
        let admin = add_resident(store, "Ra").await;
        store.grant_admin(admin.id).await.unwrap();
        (AdminConsole::new(store.clone(), admin.id), admin)
    }

    #[tokio::test]
    async fn non_admin_is_forbidden() {
        let store = test_store("forbidden.wal");
        let r = add_resident(&store, "Plain").await;
        let console = AdminConsole::new(store.clone(), r.id);
        assert!(matches!(console.residents().await, Err(AdminError::Forbidden)));
        assert!(matches!(console.add_recipient("a@b").await, Err(AdminError::Forbidden)));
    }

    #[tokio::test]
    async fn revoked_admin_loses_access_immediately() {
        let store = test_store("revoked.wal");
        let (console, admin) = admin_console(&store).await;
        assert!(console.residents().await.is_ok());
        store.revoke_admin(admin.id).await.unwrap();
        assert!(matches!(console.residents().await, Err(AdminError::Forbidden)));
    }

    #[tokio::test]
    async fn toggles_flip_and_refuse_self() {
        let store = test_store("toggles.wal");
        let (console, admin) = admin_console(&store).await;
        let r = add_resident(&store, "Sam").await;

        assert!(console.toggle_admin(r.id).await.unwrap());
        assert!(store.is_admin(r.id).await);
        assert!(!console.toggle_admin(r.id).await.unwrap());
        assert!(!store.is_admin(r.id).await);

        assert!(console.toggle_block(r.id, Some("noise".into())).await.unwrap());
        let listed = console.residents().await.unwrap();
        let sam = listed.iter().find(|s| s.resident.id == r.id).unwrap();
        assert!(sam.block.is_some());
        assert!(!console.toggle_block(r.id, None).await.unwrap());

        assert!(matches!(console.toggle_admin(admin.id).await, Err(AdminError::SelfChange)));
        assert!(matches!(console.toggle_block(admin.id, None).await, Err(AdminError::SelfChange)));
    }

    #[tokio::test]
    async fn recipients_read_modify_write() {
        let store = test_store("recipients.wal");
        let (console, _) = admin_console(&store).await;
        assert!(console.recipients().await.unwrap().is_empty());

        assert!(matches!(console.add_recipient("   ").await, Err(AdminError::InvalidEmail)));
        assert!(matches!(console.add_recipient("no-at-sign").await, Err(AdminError::InvalidEmail)));

        console.add_recipient(" ra1@house.org ").await.unwrap();
        let list = console.add_recipient("ra2@house.org").await.unwrap();
        assert_eq!(list, vec!["ra1@house.org", "ra2@house.org"]);
        assert_eq!(
            store.config(RECIPIENTS_KEY).await.unwrap().value,
            "[\"ra1@house.org\",\"ra2@house.org\"]"
        );

        let list = console.remove_recipient("ra1@house.org").await.unwrap();
        assert_eq!(list, vec!["ra2@house.org"]);
        assert_eq!(console.recipients().await.unwrap(), vec!["ra2@house.org"]);
    }

    #[tokio::test]
    async fn malformed_recipients_value_reads_as_empty() {
        let store = test_store("recipients_malformed.wal");
        let (console, _) = admin_console(&store).await;
        store.set_config(RECIPIENTS_KEY, "not json".into()).await.unwrap();
        assert!(console.recipients().await.unwrap().is_empty());
        let list = console.add_recipient("ra@house.org").await.unwrap();
        assert_eq!(list, vec!["ra@house.org"]);
    }

    #[tokio::test]
    async fn delete_and_list_bookings() {
        let store = test_store("bookings.wal");
        let (console, _) = admin_console(&store).await;
        let r = add_resident(&store, "Tia").await;
        let base = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        let mut ids = Vec::new();
        for i in 0..3u64 {
            let b = KitchenBooking {
                id: Ulid::new(),
                resident_id: r.id,
                date: base + Days::new(i),
                slot: KitchenSlot::Morning,
                created_at: now_ms(),
            };
            ids.push(b.id);
            store.insert_kitchen_booking(b).await.unwrap();
        }
        let p = ProjectorBooking {
            id: Ulid::new(),
            resident_id: r.id,
            span: Span::from_hours(Calendar::utc().instant_at(base, 18), 2),
            duration_hours: 2,
            created_at: now_ms(),
        };
        store.insert_projector_booking(p.clone()).await.unwrap();

        let recent = console.recent_kitchen_bookings().await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].booking.date, base + Days::new(2));
        assert_eq!(recent[0].owner.as_ref().unwrap().name, "Tia");

        console.delete_kitchen_booking(ids[0]).await.unwrap();
        assert_eq!(console.recent_kitchen_bookings().await.unwrap().len(), 2);
        assert!(matches!(
            console.delete_kitchen_booking(ids[0]).await,
            Err(AdminError::Store(StoreError::NotFound(_)))
        ));

        assert_eq!(console.recent_projector_bookings().await.unwrap().len(), 1);
        assert_eq!(console.delete_projector_booking(p.id).await.unwrap(), p);
        assert!(console.recent_projector_bookings().await.unwrap().is_empty());
    }
}
