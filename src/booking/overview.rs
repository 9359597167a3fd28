use ulid::Ulid;

use crate::model::{KitchenBookingRow, Ms, ProjectorBookingRow};
use crate::store::{KitchenFilter, ProjectorFilter, Store, StoreError};

/// A resident's upcoming bookings and this week's projector usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    /// Kitchen bookings dated today or later, soonest first.
    pub kitchen: Vec<KitchenBookingRow>,
    /// Projector bookings starting now or later, soonest first.
    pub projector: Vec<ProjectorBookingRow>,
    pub projector_hours_this_week: i64,
}

pub async fn overview(store: &Store, resident_id: Ulid, now: Ms) -> Result<Overview, StoreError> {
    let calendar = store.calendar();
    let today = calendar.date_of(now);
    let kitchen = store
        .kitchen_bookings(KitchenFilter {
            from: Some(today),
            to: None,
            resident_id: Some(resident_id),
        })
        .await?;
    let projector = store
        .projector_bookings(ProjectorFilter {
            from: Some(now),
            to: None,
            resident_id: Some(resident_id),
        })
        .await?;
    let week = calendar.week_containing(now);
    let projector_hours_this_week = store.resident_hours(resident_id, week.start, week.end).await;
    Ok(Overview {
        kitchen,
        projector,
        projector_hours_this_week,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::calendar::{now_ms, Calendar};
    use crate::model::*;
    use crate::notify::NotifyHub;
    use chrono::Days;

    #[tokio::test]
    async fn upcoming_only_ascending() {
        let dir = std::env::temp_dir().join("housebook_test_overview");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("overview.wal");
        let _ = std::fs::remove_file(&path);
        let store = Store::new(path, Arc::new(NotifyHub::new()), Calendar::utc()).unwrap();
        let cal = Calendar::utc();

        let me = Resident {
            id: Ulid::new(),
            name: "Mo".into(),
            room_number: "3".into(),
            phone: None,
            agreed_to_rules: true,
            created_at: 0,
        };
        store.insert_resident(me.clone()).await.unwrap();

        let now = now_ms();
        let today = cal.date_of(now);
        for (offset, slot) in [(5, KitchenSlot::Evening), (2, KitchenSlot::Morning)] {
            store
                .insert_kitchen_booking(KitchenBooking {
                    id: Ulid::new(),
                    resident_id: me.id,
                    date: today + Days::new(offset),
                    slot,
                    created_at: now,
                })
                .await
                .unwrap();
        }
        // a past kitchen day is left out
        store
            .insert_kitchen_booking(KitchenBooking {
                id: Ulid::new(),
                resident_id: me.id,
                date: today - Days::new(3),
                slot: KitchenSlot::Morning,
                created_at: now,
            })
            .await
            .unwrap();

        for start in [now + 50 * HOUR_MS, now - 5 * HOUR_MS, now + 30 * HOUR_MS] {
            store
                .insert_projector_booking(ProjectorBooking {
                    id: Ulid::new(),
                    resident_id: me.id,
                    span: Span::from_hours(start, 1),
                    duration_hours: 1,
                    created_at: now,
                })
                .await
                .unwrap();
        }

        let o = overview(&store, me.id, now).await.unwrap();
        let days: Vec<_> = o.kitchen.iter().map(|r| r.booking.date).collect();
        assert_eq!(days, vec![today + Days::new(2), today + Days::new(5)]);
        let starts: Vec<_> = o.projector.iter().map(|r| r.booking.span.start).collect();
        assert_eq!(starts, vec![now + 30 * HOUR_MS, now + 50 * HOUR_MS]);
    }

    #[tokio::test]
    async fn counts_only_this_weeks_projector_hours() {
        let dir = std::env::temp_dir().join("housebook_test_overview");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("overview_week.wal");
        let _ = std::fs::remove_file(&path);
        let store = Store::new(path, Arc::new(NotifyHub::new()), Calendar::utc()).unwrap();
        let cal = Calendar::utc();

        let me = Resident {
            id: Ulid::new(),
            name: "Lu".into(),
            room_number: "9".into(),
            phone: None,
            agreed_to_rules: true,
            created_at: 0,
        };
        store.insert_resident(me.clone()).await.unwrap();

        let now = now_ms();
        let week = cal.week_containing(now);
        // two hours this week, one the week before, three the week after
        for (start, hours) in [
            (week.start + 10 * HOUR_MS, 2),
            (week.start - 24 * HOUR_MS, 1),
            (week.start + 7 * 24 * HOUR_MS + 10 * HOUR_MS, 3),
        ] {
            store
                .insert_projector_booking(ProjectorBooking {
                    id: Ulid::new(),
                    resident_id: me.id,
                    span: Span::from_hours(start, hours),
                    duration_hours: hours,
                    created_at: now,
                })
                .await
                .unwrap();
        }

        let o = overview(&store, me.id, now).await.unwrap();
        assert_eq!(o.projector_hours_this_week, 2);
    }
}
