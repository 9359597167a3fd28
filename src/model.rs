use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The instant type shared by the store and the WAL.
pub type Ms = i64;

pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Span starting at `start` lasting whole `hours`.
    pub fn from_hours(start: Ms, hours: u32) -> Self {
        Self::new(start, start + Ms::from(hours) * HOUR_MS)
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Kitchen slots ────────────────────────────────────────────────

/// The three fixed daily kitchen slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KitchenSlot {
    Morning,
    Afternoon,
    Evening,
}

impl KitchenSlot {
    pub const ALL: [KitchenSlot; 3] = [KitchenSlot::Morning, KitchenSlot::Afternoon, KitchenSlot::Evening];

    /// Wire identifier, e.g. `"11-14"`.
    pub fn id(&self) -> &'static str {
        match self {
            KitchenSlot::Morning => "11-14",
            KitchenSlot::Afternoon => "14-17",
            KitchenSlot::Evening => "17-22",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KitchenSlot::Morning => "11:00 – 14:00",
            KitchenSlot::Afternoon => "14:00 – 17:00",
            KitchenSlot::Evening => "17:00 – 22:00",
        }
    }

    pub fn start_hour(&self) -> u32 {
        match self {
            KitchenSlot::Morning => 11,
            KitchenSlot::Afternoon => 14,
            KitchenSlot::Evening => 17,
        }
    }

    pub fn end_hour(&self) -> u32 {
        match self {
            KitchenSlot::Morning => 14,
            KitchenSlot::Afternoon => 17,
            KitchenSlot::Evening => 22,
        }
    }
}

impl fmt::Display for KitchenSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kitchen slot: {0}")]
pub struct UnknownSlot(pub String);

impl FromStr for KitchenSlot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KitchenSlot::ALL
            .into_iter()
            .find(|slot| slot.id() == s)
            .ok_or_else(|| UnknownSlot(s.to_string()))
    }
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    pub id: Ulid,
    pub name: String,
    pub room_number: String,
    pub phone: Option<String>,
    pub agreed_to_rules: bool,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub resident_id: Ulid,
    pub reason: Option<String>,
    pub blocked_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenBooking {
    pub id: Ulid,
    pub resident_id: Ulid,
    pub date: NaiveDate,
    pub slot: KitchenSlot,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectorBooking {
    pub id: Ulid,
    pub resident_id: Ulid,
    pub span: Span,
    pub duration_hours: u32,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: Ms,
}

/// The few resident columns joined onto booking rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingOwner {
    pub id: Ulid,
    pub name: String,
    pub room_number: String,
}

impl From<&Resident> for BookingOwner {
    fn from(r: &Resident) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            room_number: r.room_number.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitchenBookingRow {
    pub booking: KitchenBooking,
    pub owner: Option<BookingOwner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorBookingRow {
    pub booking: ProjectorBooking,
    pub owner: Option<BookingOwner>,
}

/// A resident as the admin screen lists them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentStatus {
    pub resident: Resident,
    pub is_admin: bool,
    pub block: Option<BlockRecord>,
}

// ── Table state ──────────────────────────────────────────────────

/// Residents plus the role and block tags that hang off them.
#[derive(Debug, Default)]
pub struct Directory {
    pub residents: HashMap<Ulid, Resident>,
    /// `(name, room_number)` → resident id.
    pub by_key: HashMap<(String, String), Ulid>,
    /// Admin grants: resident id → granted at.
    pub admins: HashMap<Ulid, Ms>,
    pub blocks: HashMap<Ulid, BlockRecord>,
}

impl Directory {
    pub fn find(&self, name: &str, room_number: &str) -> Option<&Resident> {
        self.by_key
            .get(&(name.to_string(), room_number.to_string()))
            .and_then(|id| self.residents.get(id))
    }

    pub fn owner(&self, id: &Ulid) -> Option<BookingOwner> {
        self.residents.get(id).map(BookingOwner::from)
    }
}

/// Kitchen bookings keyed by `(date, slot)`.
#[derive(Debug, Default)]
pub struct KitchenLedger {
    pub by_slot: BTreeMap<(NaiveDate, KitchenSlot), KitchenBooking>,
    /// Booking id → `(date, slot)`.
    pub index: HashMap<Ulid, (NaiveDate, KitchenSlot)>,
}

impl KitchenLedger {
    pub fn insert(&mut self, booking: KitchenBooking) {
        let key = (booking.date, booking.slot);
        self.index.insert(booking.id, key);
        self.by_slot.insert(key, booking);
    }

    pub fn remove(&mut self, id: &Ulid) -> Option<KitchenBooking> {
        let key = self.index.remove(id)?;
        self.by_slot.remove(&key)
    }

    pub fn get(&self, date: NaiveDate, slot: KitchenSlot) -> Option<&KitchenBooking> {
        self.by_slot.get(&(date, slot))
    }

    /// Bookings with `from <= date <= to`, ordered by date then slot.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = &KitchenBooking> {
        let lo = (from, KitchenSlot::Morning);
        let hi = (to, KitchenSlot::Evening);
        let range = if from <= to { Some(self.by_slot.range(lo..=hi)) } else { None };
        range.into_iter().flatten().map(|(_, b)| b)
    }

    pub fn on_day(&self, date: NaiveDate) -> impl Iterator<Item = &KitchenBooking> {
        self.between(date, date)
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

/// Projector bookings sorted by `span.start`.
#[derive(Debug, Default)]
pub struct ProjectorLedger {
    pub bookings: Vec<ProjectorBooking>,
}

impl ProjectorLedger {
    /// Insert keeping sort order by start.
    pub fn insert(&mut self, booking: ProjectorBooking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove(&mut self, id: &Ulid) -> Option<ProjectorBooking> {
        let pos = self.bookings.iter().position(|b| b.id == *id)?;
        Some(self.bookings.remove(pos))
    }

    /// Bookings whose span overlaps `query`.
    /// Everything at index >= right_bound starts at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &ProjectorBooking> {
        let right_bound = self.bookings.partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }

    /// Bookings with `from <= start <= to` (both ends inclusive).
    pub fn starting_between(&self, from: Ms, to: Ms) -> impl Iterator<Item = &ProjectorBooking> {
        let lo = self.bookings.partition_point(|b| b.span.start < from);
        let hi = self.bookings.partition_point(|b| b.span.start <= to).max(lo);
        self.bookings[lo..hi].iter()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

/// Flat event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResidentCreated {
        resident: Resident,
    },
    PhoneUpdated {
        resident_id: Ulid,
        phone: Option<String>,
    },
    AdminGranted {
        resident_id: Ulid,
        granted_at: Ms,
    },
    AdminRevoked {
        resident_id: Ulid,
    },
    ResidentBlocked {
        block: BlockRecord,
    },
    ResidentUnblocked {
        resident_id: Ulid,
    },
    KitchenBooked {
        booking: KitchenBooking,
    },
    KitchenCancelled {
        id: Ulid,
    },
    ProjectorBooked {
        booking: ProjectorBooking,
    },
    ProjectorCancelled {
        id: Ulid,
    },
    ConfigSet {
        entry: ConfigEntry,
    },
}

/// Which table an event touches; also the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Directory,
    Kitchen,
    Projector,
    Config,
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::ResidentCreated { .. }
            | Event::PhoneUpdated { .. }
            | Event::AdminGranted { .. }
            | Event::AdminRevoked { .. }
            | Event::ResidentBlocked { .. }
            | Event::ResidentUnblocked { .. } => Channel::Directory,
            Event::KitchenBooked { .. } | Event::KitchenCancelled { .. } => Channel::Kitchen,
            Event::ProjectorBooked { .. } | Event::ProjectorCancelled { .. } => Channel::Projector,
            Event::ConfigSet { .. } => Channel::Config,
        }
    }
}
