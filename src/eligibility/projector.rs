use crate::limits::*;
use crate::model::{DAY_MS, Ms, ProjectorBookingRow, Resident, Span};

use super::{Denial, Eligibility};

/// Can `resident` book the projector for `duration_hours` from `start`?
///
/// `weekly_hours` is the resident's already-booked total for the week the
/// caller is displaying; `snapshot` is that week's bookings. The overlap scan
/// only sees what is in the snapshot.
pub fn check_request(
    resident: Option<&Resident>,
    start: Ms,
    duration_hours: u32,
    weekly_hours: i64,
    snapshot: &[ProjectorBookingRow],
    now: Ms,
) -> Eligibility {
    if resident.is_none() {
        return Denial::NotLoggedIn.into();
    }
    if start > now + PROJECTOR_HORIZON_DAYS * DAY_MS {
        return Denial::TooFarAhead.into();
    }
    if start < now {
        return Denial::InPast.into();
    }
    if !(PROJECTOR_MIN_HOURS..=PROJECTOR_MAX_HOURS).contains(&duration_hours) {
        return Denial::BadDuration.into();
    }
    if weekly_hours + i64::from(duration_hours) > PROJECTOR_WEEKLY_HOURS {
        return Denial::WeeklyCap {
            remaining: PROJECTOR_WEEKLY_HOURS - weekly_hours,
        }
        .into();
    }

    let wanted = Span::from_hours(start, duration_hours);
    if snapshot.iter().any(|row| row.booking.span.overlaps(&wanted)) {
        return Denial::Overlap.into();
    }

    Eligibility::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HOUR_MS, ProjectorBooking};
    use ulid::Ulid;

    const H: Ms = HOUR_MS;
    const NOW: Ms = 1_800_000_000_000;

    fn resident() -> Resident {
        Resident {
            id: Ulid::new(),
            name: "Pat".into(),
            room_number: "12".into(),
            phone: None,
            agreed_to_rules: true,
            created_at: 0,
        }
    }

    fn row(start: Ms, hours: u32) -> ProjectorBookingRow {
        ProjectorBookingRow {
            booking: ProjectorBooking {
                id: Ulid::new(),
                resident_id: Ulid::new(),
                span: Span::from_hours(start, hours),
                duration_hours: hours,
                created_at: 0,
            },
            owner: None,
        }
    }

    #[test]
    fn requires_login() {
        assert_eq!(
            check_request(None, NOW + H, 1, 0, &[], NOW),
            Eligibility::Denied(Denial::NotLoggedIn)
        );
    }

    #[test]
    fn horizon_is_exclusive_of_day_sixty() {
        let r = resident();
        let limit = NOW + 60 * DAY_MS;
        assert!(check_request(Some(&r), limit, 1, 0, &[], NOW).is_allowed());
        assert_eq!(
            check_request(Some(&r), limit + 1, 1, 0, &[], NOW),
            Eligibility::Denied(Denial::TooFarAhead)
        );
    }

    #[test]
    fn past_rejected_now_allowed() {
        let r = resident();
        assert_eq!(
            check_request(Some(&r), NOW - 1, 1, 0, &[], NOW),
            Eligibility::Denied(Denial::InPast)
        );
        assert!(check_request(Some(&r), NOW, 1, 0, &[], NOW).is_allowed());
    }

    #[test]
    fn duration_bounds() {
        let r = resident();
        for bad in [0, 7, 24] {
            assert_eq!(
                check_request(Some(&r), NOW + H, bad, 0, &[], NOW),
                Eligibility::Denied(Denial::BadDuration),
                "duration {bad}"
            );
        }
        for good in 1..=6 {
            assert!(check_request(Some(&r), NOW + H, good, 0, &[], NOW).is_allowed());
        }
    }

    #[test]
    fn weekly_cap_reports_remaining() {
        let r = resident();
        let e = check_request(Some(&r), NOW + H, 3, 4, &[], NOW);
        assert_eq!(e, Eligibility::Denied(Denial::WeeklyCap { remaining: 2 }));
        assert_eq!(e.reason().as_deref(), Some("You have 2 hours left this week"));
        assert!(check_request(Some(&r), NOW + H, 2, 4, &[], NOW).is_allowed());
    }

    #[test]
    fn full_week_then_nothing_left() {
        let r = resident();
        let start = NOW + 40 * DAY_MS;
        assert!(check_request(Some(&r), start, 6, 0, &[], NOW).is_allowed());

        let snapshot = [row(start, 6)];
        let e = check_request(Some(&r), start + 8 * H, 1, 6, &snapshot, NOW);
        assert_eq!(e.reason().as_deref(), Some("You have 0 hours left this week"));
    }

    #[test]
    fn overlap_is_half_open() {
        let r = resident();
        let start = NOW + 2 * DAY_MS;
        let snapshot = [row(start, 2)];

        assert_eq!(
            check_request(Some(&r), start + H, 1, 0, &snapshot, NOW),
            Eligibility::Denied(Denial::Overlap)
        );
        assert_eq!(
            check_request(Some(&r), start - H, 3, 0, &snapshot, NOW),
            Eligibility::Denied(Denial::Overlap)
        );
        // touching either end is fine
        assert!(check_request(Some(&r), start + 2 * H, 1, 0, &snapshot, NOW).is_allowed());
        assert!(check_request(Some(&r), start - H, 1, 0, &snapshot, NOW).is_allowed());
    }

    #[test]
    fn cap_checked_before_overlap() {
        let r = resident();
        let start = NOW + 2 * DAY_MS;
        let snapshot = [row(start, 2)];
        assert_eq!(
            check_request(Some(&r), start, 2, 5, &snapshot, NOW),
            Eligibility::Denied(Denial::WeeklyCap { remaining: 1 })
        );
    }
}
