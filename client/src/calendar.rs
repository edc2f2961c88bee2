//! Date arithmetic behind the calendar views.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use daybook_shared::CalendarEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    fn offset(&self, date: NaiveDate) -> i64 {
        let days = match self {
            WeekStart::Monday => date.weekday().num_days_from_monday(),
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        };
        days as i64
    }
}

/// One cell of a month view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDay {
    pub date: NaiveDate,
    /// False for the leading and trailing days of neighbouring months
    pub in_month: bool,
}

/// Six full weeks covering `month`, so every month renders at the same height.
///
/// Returns `None` for an invalid year/month.
pub fn month_grid(year: i32, month: u32, week_start: WeekStart) -> Option<Vec<Vec<GridDay>>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let start = first - Duration::days(week_start.offset(first));

    let weeks = (0..6)
        .map(|week| {
            (0..7)
                .map(|day| {
                    let date = start + Duration::days(week * 7 + day);
                    GridDay {
                        date,
                        in_month: date.month() == month && date.year() == year,
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Some(weeks)
}

/// Half-open `[start, end)` range of the week containing `date`.
pub fn week_range(date: NaiveDate, week_start: WeekStart) -> (NaiveDate, NaiveDate) {
    let start = date - Duration::days(week_start.offset(date));
    (start, start + Duration::days(7))
}

/// Half-open UTC range covering the whole of `month`.
pub fn month_range(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((day_start(first), day_start(next)))
}

pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Events overlapping `[from, to)`, earliest first.
pub fn events_in_range(
    events: &[CalendarEvent],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    let mut matching: Vec<CalendarEvent> = events
        .iter()
        .filter(|event| event.overlaps(from, to))
        .cloned()
        .collect();
    matching.sort_by_key(|event| event.start);
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use daybook_shared::EntityId;

    fn event(id: i64, start: DateTime<Utc>, hours: i64) -> CalendarEvent {
        CalendarEvent {
            id: EntityId::Number(id),
            title: format!("event {}", id),
            description: None,
            location: None,
            start,
            end: start + Duration::hours(hours),
            all_day: false,
            recurrence: None,
            category_id: None,
            reminders: Vec::new(),
            color: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_month_grid_monday_start() {
        // 1 February 2024 is a Thursday
        let grid = month_grid(2024, 2, WeekStart::Monday).unwrap();
        assert_eq!(grid.len(), 6);
        assert!(grid.iter().all(|week| week.len() == 7));

        assert_eq!(grid[0][0].date, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
        assert!(!grid[0][0].in_month);
        assert_eq!(grid[0][3].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(grid[0][3].in_month);

        let in_month = grid.iter().flatten().filter(|d| d.in_month).count();
        assert_eq!(in_month, 29);
    }

    #[test]
    fn test_month_grid_sunday_start() {
        let grid = month_grid(2024, 9, WeekStart::Sunday).unwrap();
        // 1 September 2024 is a Sunday
        assert_eq!(grid[0][0].date, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        assert!(grid[0][0].in_month);
    }

    #[test]
    fn test_month_grid_invalid() {
        assert!(month_grid(2024, 13, WeekStart::Monday).is_none());
    }

    #[test]
    fn test_week_range() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let (start, end) = week_range(wednesday, WeekStart::Monday);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap());

        let (start, _) = week_range(wednesday, WeekStart::Sunday);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
    }

    #[test]
    fn test_month_range_wraps_year() {
        let (from, to) = month_range(2024, 12).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_events_in_range_overlap_and_order() {
        let day = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
        let events = vec![
            event(1, day + Duration::hours(14), 1),
            event(2, day - Duration::hours(2), 4), // started the night before
            event(3, day + Duration::hours(24), 1), // next day, touches the boundary
            event(4, day + Duration::hours(9), 1),
        ];

        let ids: Vec<EntityId> = events_in_range(&events, day, day + Duration::days(1))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(
            ids,
            vec![EntityId::Number(2), EntityId::Number(4), EntityId::Number(1)]
        );
    }
}
