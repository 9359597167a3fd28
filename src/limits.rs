use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_ROOM_LEN: usize = 32;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_REASON_LEN: usize = 512;
pub const MAX_CONFIG_KEY_LEN: usize = 64;
pub const MAX_CONFIG_VALUE_LEN: usize = 64 * 1024;
pub const MAX_RECIPIENTS: usize = 64;
pub const MAX_RESIDENTS: usize = 10_000;

/// Widest date window a single read may cover.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 400;
pub const MAX_QUERY_WINDOW_MS: Ms = MAX_QUERY_WINDOW_DAYS * 24 * 3_600_000;

/// Rows returned by the admin "recent bookings" listings.
pub const RECENT_BOOKINGS_LIMIT: usize = 50;

// Projector rules
pub const PROJECTOR_WEEKLY_HOURS: i64 = 6;
pub const PROJECTOR_MIN_HOURS: u32 = 1;
pub const PROJECTOR_MAX_HOURS: u32 = 6;
pub const PROJECTOR_HORIZON_DAYS: i64 = 60;

// Kitchen rules
pub const KITCHEN_NOTICE_HOURS: i64 = 24;
