use chrono::NaiveDate;

use crate::calendar::{hours_until, Calendar};
use crate::limits::KITCHEN_NOTICE_HOURS;
use crate::model::{KitchenBookingRow, KitchenSlot, Ms, Resident};

use super::{Denial, Eligibility};

/// Can `resident` book `slot_id` on `date`, judged against `snapshot` (the
/// bookings of the displayed week) at instant `now`? First failing rule wins.
pub fn check_slot(
    resident: Option<&Resident>,
    date: NaiveDate,
    slot_id: &str,
    snapshot: &[KitchenBookingRow],
    calendar: &Calendar,
    now: Ms,
) -> Eligibility {
    let Some(resident) = resident else {
        return Denial::NotLoggedIn.into();
    };
    let Ok(slot) = slot_id.parse::<KitchenSlot>() else {
        return Denial::InvalidSlot.into();
    };

    if hours_until(calendar.slot_start(date, slot), now) < KITCHEN_NOTICE_HOURS {
        return Denial::TooLate.into();
    }

    if let Some(taken) = snapshot
        .iter()
        .find(|row| row.booking.date == date && row.booking.slot == slot)
    {
        let by = taken
            .owner
            .as_ref()
            .map_or_else(|| "another resident".to_string(), |o| o.name.clone());
        return Denial::SlotTaken { by }.into();
    }

    if snapshot
        .iter()
        .any(|row| row.booking.date == date && row.booking.resident_id == resident.id)
    {
        return Denial::OnePerDay.into();
    }

    Eligibility::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingOwner, KitchenBooking, HOUR_MS};
    use ulid::Ulid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resident(name: &str) -> Resident {
        Resident {
            id: Ulid::new(),
            name: name.into(),
            room_number: "1".into(),
            phone: None,
            agreed_to_rules: true,
            created_at: 0,
        }
    }

    fn row(owner: &Resident, date: NaiveDate, slot: KitchenSlot) -> KitchenBookingRow {
        KitchenBookingRow {
            booking: KitchenBooking {
                id: Ulid::new(),
                resident_id: owner.id,
                date,
                slot,
                created_at: 0,
            },
            owner: Some(BookingOwner::from(owner)),
        }
    }

    /// Monday 2026-11-02 09:00 UTC; the Wednesday after is comfortably out.
    fn now() -> Ms {
        Calendar::utc().instant_at(date(2026, 11, 2), 9)
    }

    const D: (i32, u32, u32) = (2026, 11, 4);

    fn check(who: Option<&Resident>, slot: &str, snapshot: &[KitchenBookingRow]) -> Eligibility {
        check_slot(who, date(D.0, D.1, D.2), slot, snapshot, &Calendar::utc(), now())
    }

    #[test]
    fn requires_login() {
        assert_eq!(check(None, "11-14", &[]), Eligibility::Denied(Denial::NotLoggedIn));
    }

    #[test]
    fn unknown_slot_is_invalid() {
        let y = resident("Y");
        assert_eq!(check(Some(&y), "09-11", &[]), Eligibility::Denied(Denial::InvalidSlot));
    }

    #[test]
    fn notice_is_measured_in_whole_hours() {
        let cal = Calendar::utc();
        let y = resident("Y");
        let d = date(2026, 11, 3);
        let start = cal.slot_start(d, KitchenSlot::Morning);

        // exactly 24h ahead is fine
        assert!(check_slot(Some(&y), d, "11-14", &[], &cal, start - 24 * HOUR_MS).is_allowed());
        // 23h59m ahead truncates to 23
        assert_eq!(
            check_slot(Some(&y), d, "11-14", &[], &cal, start - 24 * HOUR_MS + 60_000),
            Eligibility::Denied(Denial::TooLate)
        );
    }

    #[test]
    fn notice_rule_wins_over_occupancy() {
        let cal = Calendar::utc();
        let x = resident("X");
        let y = resident("Y");
        let d = date(2026, 11, 2);
        let snapshot = [row(&x, d, KitchenSlot::Evening)];
        assert_eq!(
            check_slot(Some(&y), d, "17-22", &snapshot, &cal, now()),
            Eligibility::Denied(Denial::TooLate)
        );
    }

    #[test]
    fn taken_slot_names_occupant_then_other_slot_allowed() {
        let x = resident("Xavier");
        let y = resident("Yolanda");
        let snapshot = [row(&x, date(D.0, D.1, D.2), KitchenSlot::Evening)];

        let e = check(Some(&y), "17-22", &snapshot);
        assert_eq!(e.reason().as_deref(), Some("Booked by Xavier"));

        // Y has nothing on that day, so the morning slot is open to them.
        assert!(check(Some(&y), "11-14", &snapshot).is_allowed());
    }

    #[test]
    fn one_slot_per_day() {
        let y = resident("Y");
        let snapshot = [row(&y, date(D.0, D.1, D.2), KitchenSlot::Morning)];
        assert_eq!(check(Some(&y), "14-17", &snapshot), Eligibility::Denied(Denial::OnePerDay));

        // a booking on another day does not count
        let snapshot = [row(&y, date(2026, 11, 5), KitchenSlot::Morning)];
        assert!(check(Some(&y), "14-17", &snapshot).is_allowed());
    }

    #[test]
    fn own_booking_on_same_slot_reports_occupant() {
        let y = resident("Yuki");
        let snapshot = [row(&y, date(D.0, D.1, D.2), KitchenSlot::Morning)];
        assert_eq!(
            check(Some(&y), "11-14", &snapshot),
            Eligibility::Denied(Denial::SlotTaken { by: "Yuki".into() })
        );
    }
}
