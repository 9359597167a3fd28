use ulid::Ulid;

pub const RESIDENTS_PKEY: &str = "residents_pkey";
pub const RESIDENTS_NAME_ROOM_KEY: &str = "residents_name_room_key";
pub const USER_ROLES_RESIDENT_KEY: &str = "user_roles_resident_id_key";
pub const BLOCKED_USERS_RESIDENT_KEY: &str = "blocked_users_resident_id_key";
pub const KITCHEN_PKEY: &str = "kitchen_bookings_pkey";
pub const KITCHEN_DATE_SLOT_KEY: &str = "kitchen_bookings_date_slot_key";
pub const KITCHEN_RESIDENT_DAY_KEY: &str = "kitchen_bookings_resident_day_key";
pub const PROJECTOR_PKEY: &str = "projector_bookings_pkey";
pub const RESIDENT_FKEY: &str = "resident_id_fkey";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("duplicate key value violates unique constraint \"{0}\"")]
    UniqueViolation(&'static str),
    #[error("insert violates foreign key constraint \"{constraint}\": resident {resident_id} does not exist")]
    ForeignKeyViolation {
        constraint: &'static str,
        resident_id: Ulid,
    },
    #[error("overlaps projector booking {0}")]
    Overlap(Ulid),
    #[error("weekly projector limit exceeded: {remaining} hours left")]
    WeeklyCapExceeded { remaining: i64 },
    #[error("invalid value: {0}")]
    Invalid(&'static str),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl StoreError {
    /// SQLSTATE reported to wire clients.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "02000",
            StoreError::UniqueViolation(_) => "23505",
            StoreError::Overlap(_) | StoreError::WeeklyCapExceeded { .. } => "23P01",
            StoreError::ForeignKeyViolation { .. } => "23503",
            StoreError::Invalid(_)
            | StoreError::LimitExceeded(_)
            | StoreError::WalError(_) => "P0001",
        }
    }

    /// Name of the violated unique constraint, if that is what this is.
    pub fn unique_constraint(&self) -> Option<&'static str> {
        match self {
            StoreError::UniqueViolation(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_uses_postgres_code() {
        let e = StoreError::UniqueViolation(KITCHEN_DATE_SLOT_KEY);
        assert_eq!(e.sqlstate(), "23505");
        assert_eq!(e.unique_constraint(), Some(KITCHEN_DATE_SLOT_KEY));
        assert!(e.to_string().contains("kitchen_bookings_date_slot_key"));
    }

    #[test]
    fn non_unique_errors_have_no_constraint() {
        let e = StoreError::WeeklyCapExceeded { remaining: 2 };
        assert_eq!(e.unique_constraint(), None);
        assert_eq!(e.sqlstate(), "23P01");
        assert_eq!(e.to_string(), "weekly projector limit exceeded: 2 hours left");
    }

    #[test]
    fn foreign_key_uses_postgres_code() {
        let e = StoreError::ForeignKeyViolation {
            constraint: RESIDENT_FKEY,
            resident_id: Ulid::nil(),
        };
        assert_eq!(e.sqlstate(), "23503");
    }

    #[test]
    fn everything_else_is_a_raised_exception() {
        assert_eq!(StoreError::NotFound(Ulid::nil()).sqlstate(), "02000");
        assert_eq!(StoreError::Invalid("duration").sqlstate(), "P0001");
        assert_eq!(StoreError::LimitExceeded("query window too wide").sqlstate(), "P0001");
    }
}
