//! Resident login and session restore.
//!
//! A session never carries privileges across loads: admin and block status
//! are read from the store on login and again on every restore.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar::now_ms;
use crate::model::Resident;
use crate::store::{Store, StoreError, RESIDENTS_NAME_ROOM_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    pub name: String,
    pub room_number: String,
    pub phone: Option<String>,
    pub agreed_to_rules: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Please fill in your name and room number")]
    MissingIdentity,
    #[error("Please agree to the house rules")]
    RulesNotAccepted,
    #[error("Your account has been blocked. Please contact an RA.")]
    Blocked,
    #[error("resident {0} no longer exists")]
    UnknownResident(Ulid),
    #[error("invalid session record: {0}")]
    Record(#[from] serde_json::Error),
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// What a client keeps between loads. Identity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub resident_id: Ulid,
    pub name: String,
    pub room_number: String,
}

impl SessionRecord {
    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub resident: Resident,
    pub is_admin: bool,
    pub is_blocked: bool,
}

impl Session {
    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            resident_id: self.resident.id,
            name: self.resident.name.clone(),
            room_number: self.resident.room_number.clone(),
        }
    }
}

pub struct SessionResolver {
    store: Arc<Store>,
}

impl SessionResolver {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Find or create the resident, refresh their phone, refuse if blocked.
    pub async fn login(&self, req: LoginRequest) -> Result<Session, SessionError> {
        let name = req.name.trim();
        let room = req.room_number.trim();
        if name.is_empty() || room.is_empty() {
            return Err(SessionError::MissingIdentity);
        }
        if !req.agreed_to_rules {
            return Err(SessionError::RulesNotAccepted);
        }
        let phone = req
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let mut resident = match self.store.find_resident(name, room).await {
            Some(existing) => existing,
            None => self.create(name, room, phone.clone()).await?,
        };
        if let Some(phone) = phone
            && resident.phone.as_deref() != Some(phone.as_str())
        {
            self.store.update_phone(resident.id, Some(phone.clone())).await?;
            resident.phone = Some(phone);
        }

        if self.store.block_of(resident.id).await.is_some() {
            tracing::info!("blocked resident {} refused login", resident.id);
            metrics::counter!(crate::observability::LOGINS_TOTAL, "outcome" => "blocked").increment(1);
            return Err(SessionError::Blocked);
        }

        let is_admin = self.store.is_admin(resident.id).await;
        tracing::info!("resident {} logged in (admin: {is_admin})", resident.id);
        metrics::counter!(crate::observability::LOGINS_TOTAL, "outcome" => "ok").increment(1);
        Ok(Session {
            resident,
            is_admin,
            is_blocked: false,
        })
    }

    async fn create(&self, name: &str, room: &str, phone: Option<String>) -> Result<Resident, SessionError> {
        let resident = Resident {
            id: Ulid::new(),
            name: name.to_string(),
            room_number: room.to_string(),
            phone,
            agreed_to_rules: true,
            created_at: now_ms(),
        };
        match self.store.insert_resident(resident.clone()).await {
            Ok(()) => {
                tracing::info!("new resident {} in room {room}", resident.id);
                Ok(resident)
            }
            // Someone logged in with the same name and room a moment earlier.
            Err(StoreError::UniqueViolation(RESIDENTS_NAME_ROOM_KEY)) => self
                .store
                .find_resident(name, room)
                .await
                .ok_or(SessionError::Store(StoreError::UniqueViolation(RESIDENTS_NAME_ROOM_KEY))),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild a session from a stored record, re-reading role and block
    /// status from the store.
    pub async fn restore(&self, record: &SessionRecord) -> Result<Session, SessionError> {
        let resident = self
            .store
            .get_resident(record.resident_id)
            .await
            .ok_or(SessionError::UnknownResident(record.resident_id))?;
        Ok(Session {
            is_admin: self.store.is_admin(resident.id).await,
            is_blocked: self.store.block_of(resident.id).await.is_some(),
            resident,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::notify::NotifyHub;

    fn resolver(name: &str) -> (SessionResolver, Arc<Store>) {
        let dir = std::env::temp_dir().join("housebook_test_session");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        let store = Arc::new(Store::new(path, Arc::new(NotifyHub::new()), Calendar::utc()).unwrap());
        (SessionResolver::new(store.clone()), store)
    }

    fn req(name: &str, room: &str, phone: Option<&str>) -> LoginRequest {
        LoginRequest {
            name: name.into(),
            room_number: room.into(),
            phone: phone.map(Into::into),
            agreed_to_rules: true,
        }
    }

    #[tokio::test]
    async fn first_login_creates_then_reuses() {
        let (resolver, store) = resolver("create_reuse.wal");
        let first = resolver.login(req("  Ines ", " 14B", None)).await.unwrap();
        assert_eq!(first.resident.name, "Ines");
        assert_eq!(first.resident.room_number, "14B");
        assert!(!first.is_admin);

        let second = resolver.login(req("Ines", "14B", Some(""))).await.unwrap();
        assert_eq!(second.resident.id, first.resident.id);
        assert_eq!(second.resident.phone, None);
        assert_eq!(store.residents_newest_first().await.len(), 1);
    }

    #[tokio::test]
    async fn phone_updated_only_when_different() {
        let (resolver, store) = resolver("phone.wal");
        let s = resolver.login(req("Ola", "2", Some("111"))).await.unwrap();
        assert_eq!(s.resident.phone.as_deref(), Some("111"));

        let s = resolver.login(req("Ola", "2", Some("222"))).await.unwrap();
        assert_eq!(s.resident.phone.as_deref(), Some("222"));
        assert_eq!(store.get_resident(s.resident.id).await.unwrap().phone.as_deref(), Some("222"));

        // absent phone leaves the stored one alone
        let s = resolver.login(req("Ola", "2", None)).await.unwrap();
        assert_eq!(s.resident.phone.as_deref(), Some("222"));
    }

    #[tokio::test]
    async fn login_validation() {
        let (resolver, _) = resolver("validation.wal");
        assert!(matches!(
            resolver.login(req(" ", "1", None)).await,
            Err(SessionError::MissingIdentity)
        ));
        let mut r = req("Al", "1", None);
        r.agreed_to_rules = false;
        assert!(matches!(resolver.login(r).await, Err(SessionError::RulesNotAccepted)));
    }

    #[tokio::test]
    async fn blocked_resident_refused() {
        let (resolver, store) = resolver("blocked.wal");
        let s = resolver.login(req("Bea", "9", None)).await.unwrap();
        store.block_resident(s.resident.id, None).await.unwrap();

        let err = resolver.login(req("Bea", "9", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Your account has been blocked. Please contact an RA.");

        // an existing session learns about the block on restore
        let restored = resolver.restore(&s.record()).await.unwrap();
        assert!(restored.is_blocked);
    }

    #[tokio::test]
    async fn restore_reads_role_from_store() {
        let (resolver, store) = resolver("restore.wal");
        let s = resolver.login(req("Cal", "5", None)).await.unwrap();
        let json = s.record().to_json().unwrap();
        assert!(!json.contains("admin"));

        store.grant_admin(s.resident.id).await.unwrap();
        let record = SessionRecord::from_json(&json).unwrap();
        assert!(resolver.restore(&record).await.unwrap().is_admin);

        store.revoke_admin(s.resident.id).await.unwrap();
        assert!(!resolver.restore(&record).await.unwrap().is_admin);
    }

    #[tokio::test]
    async fn restore_unknown_resident_or_bad_json() {
        let (resolver, _) = resolver("restore_unknown.wal");
        let record = SessionRecord {
            resident_id: Ulid::new(),
            name: "Ghost".into(),
            room_number: "0".into(),
        };
        assert!(matches!(
            resolver.restore(&record).await,
            Err(SessionError::UnknownResident(_))
        ));
        assert!(matches!(
            SessionRecord::from_json("{\"is_admin\":true}"),
            Err(SessionError::Record(_))
        ));
    }
}
