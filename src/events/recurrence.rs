//! Next-occurrence planning for recurring events.

use chrono::{Duration, Months, NaiveDateTime};

use super::models::{Event, Recurrence};

/// The `n`th occurrence after `start`. Monthly steps are counted from
/// `start` and clamp to the last day of shorter months.
fn nth_occurrence(start: NaiveDateTime, recurrence: Recurrence, n: u32) -> Option<NaiveDateTime> {
    match recurrence {
        Recurrence::None => None,
        Recurrence::Weekly => start.checked_add_signed(Duration::weeks(i64::from(n))),
        Recurrence::Monthly => start.checked_add_months(Months::new(n)),
    }
}

/// First occurrence after `event` that is strictly later than `now`, both
/// in civil time. Cycles missed while the scheduler was down are skipped
/// over rather than posted in the past.
pub fn compute_next_occurrence(event: &Event, now: NaiveDateTime) -> Option<NaiveDateTime> {
    next_after(event.start(), event.recurrence, now)
}

pub fn next_after(
    start: NaiveDateTime,
    recurrence: Recurrence,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if !recurrence.is_recurring() {
        return None;
    }

    let mut n = 1;
    loop {
        let candidate = nth_occurrence(start, recurrence, n)?;
        if candidate > now {
            if n > 1 {
                tracing::info!(
                    "Skipped {} missed {} occurrences after {}",
                    n - 1,
                    recurrence,
                    start
                );
            }
            return Some(candidate);
        }
        n = n.checked_add(1)?;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn non_recurring_events_have_no_successor() {
        let start = at(2025, 3, 10, 19, 0);
        assert_eq!(next_after(start, Recurrence::None, start), None);
    }

    #[test]
    fn weekly_advances_one_week() {
        let start = at(2025, 3, 10, 19, 0);
        let now = at(2025, 3, 11, 19, 30);
        assert_eq!(
            next_after(start, Recurrence::Weekly, now),
            Some(at(2025, 3, 17, 19, 0))
        );
    }

    #[test]
    fn weekly_keeps_the_civil_time_across_dst() {
        // Paris switches to summer time on 2025-03-30
        let start = at(2025, 3, 27, 19, 0);
        let now = at(2025, 3, 28, 10, 0);
        assert_eq!(
            next_after(start, Recurrence::Weekly, now),
            Some(at(2025, 4, 3, 19, 0))
        );
    }

    #[test]
    fn weekly_catches_up_after_downtime() {
        let start = at(2025, 3, 10, 19, 0);
        // Offline for a little over three weeks
        let now = at(2025, 4, 2, 9, 0);
        let next = next_after(start, Recurrence::Weekly, now).unwrap();
        assert_eq!(next, at(2025, 4, 7, 19, 0));
        assert!(next > now);
        assert!(next - now <= Duration::weeks(1));
    }

    #[test]
    fn candidate_equal_to_now_is_not_in_the_future() {
        let start = at(2025, 3, 10, 19, 0);
        let now = at(2025, 3, 17, 19, 0);
        assert_eq!(
            next_after(start, Recurrence::Weekly, now),
            Some(at(2025, 3, 24, 19, 0))
        );
    }

    #[test]
    fn monthly_keeps_the_day_of_month() {
        let start = at(2025, 3, 10, 19, 0);
        let now = at(2025, 3, 11, 8, 0);
        assert_eq!(
            next_after(start, Recurrence::Monthly, now),
            Some(at(2025, 4, 10, 19, 0))
        );
    }

    #[test]
    fn monthly_clamps_to_the_end_of_short_months() {
        let start = at(2025, 1, 31, 19, 0);
        let now = at(2025, 2, 1, 8, 0);
        assert_eq!(
            next_after(start, Recurrence::Monthly, now),
            Some(at(2025, 2, 28, 19, 0))
        );

        let leap_start = at(2024, 1, 31, 19, 0);
        let leap_now = at(2024, 2, 1, 8, 0);
        assert_eq!(
            next_after(leap_start, Recurrence::Monthly, leap_now),
            Some(at(2024, 2, 29, 19, 0))
        );
    }

    #[test]
    fn monthly_catch_up_counts_from_the_original_day() {
        let start = at(2025, 1, 31, 19, 0);
        // Dormant through February and March
        let now = at(2025, 4, 1, 8, 0);
        assert_eq!(
            next_after(start, Recurrence::Monthly, now),
            Some(at(2025, 4, 30, 19, 0))
        );
    }

    #[test]
    fn consecutive_cleanups_chain_one_period_apart() {
        let mut start = at(2025, 3, 10, 19, 0);
        let mut starts = vec![start];
        for _ in 0..4 {
            // Each cleanup runs the morning after the previous occurrence
            let now = start + Duration::hours(14);
            start = next_after(start, Recurrence::Weekly, now).unwrap();
            starts.push(start);
        }
        for pair in starts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::weeks(1));
        }
    }
}
