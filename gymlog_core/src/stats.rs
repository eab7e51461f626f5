//! Derived statistics over the workout log.
//!
//! Everything here is pure: callers pass the entries and a reference
//! `now`, and calendar days are taken in `now`'s time zone. Rest-day
//! entries are invisible to the streak and the favorite but still count
//! toward the monthly total.

use crate::{LogEntry, WorkoutCatalog};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Shown in place of a favorite when there is none
pub const NO_FAVORITE: &str = "-";

/// Number of consecutive days, ending today or yesterday, with at least
/// one non-rest-day entry
pub fn current_streak<Tz: TimeZone>(entries: &[LogEntry], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let days: BTreeSet<NaiveDate> = entries
        .iter()
        .filter(|e| !e.is_rest_day())
        .filter_map(|e| e.at(&tz))
        .map(|at| at.date_naive())
        .collect();

    let today = now.date_naive();
    let mut descending = days.into_iter().rev();
    let Some(latest) = descending.next() else {
        return 0;
    };

    if latest != today && latest != today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    let mut previous = latest;
    for day in descending {
        if previous - day != Duration::days(1) {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}

/// Entries (rest days included) in the same calendar month as `now`
pub fn monthly_count<Tz: TimeZone>(entries: &[LogEntry], now: &DateTime<Tz>) -> usize {
    let tz = now.timezone();
    let (year, month) = (now.year(), now.month());
    entries
        .iter()
        .filter_map(|e| e.at(&tz))
        .filter(|at| at.year() == year && at.month() == month)
        .count()
}

/// Most frequently logged non-rest-day workout
///
/// Ties go to the workout encountered first.
pub fn favorite_workout(entries: &[LogEntry]) -> Option<&str> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for entry in entries.iter().filter(|e| !e.is_rest_day()) {
        let count = counts.entry(entry.workout.as_str()).or_insert_with(|| {
            order.push(entry.workout.as_str());
            0
        });
        *count += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for name in order {
        let count = counts[name];
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name)
}

/// Bucket entries by calendar day, newest entry first within each day
pub fn group_by_day<Tz: TimeZone>(
    entries: &[LogEntry],
    tz: &Tz,
) -> BTreeMap<NaiveDate, Vec<LogEntry>> {
    let mut days: BTreeMap<NaiveDate, Vec<LogEntry>> = BTreeMap::new();
    for entry in entries {
        if let Some(at) = entry.at(tz) {
            days.entry(at.date_naive()).or_default().push(entry.clone());
        }
    }
    for bucket in days.values_mut() {
        bucket.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    days
}

/// Entries logged on one calendar day, newest first
pub fn entries_on<Tz: TimeZone>(entries: &[LogEntry], day: NaiveDate, tz: &Tz) -> Vec<LogEntry> {
    let mut found: Vec<LogEntry> = entries
        .iter()
        .filter(|e| e.at(tz).is_some_and(|at| at.date_naive() == day))
        .cloned()
        .collect();
    found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    found
}

/// Per-workout tally in catalog order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkoutCounts {
    counts: Vec<(String, usize)>,
}

impl WorkoutCounts {
    pub fn get(&self, workout: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(name, _)| name == workout)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

/// Count entries per catalog workout
///
/// Every catalog workout except the rest day starts at zero. Entries whose
/// workout is not in the catalog are ignored.
pub fn counts_by_workout(entries: &[LogEntry], catalog: &WorkoutCatalog) -> WorkoutCounts {
    let mut counts: Vec<(String, usize)> =
        catalog.exercises().map(|name| (name.to_string(), 0)).collect();

    for entry in entries {
        if let Some(slot) = counts.iter_mut().find(|(name, _)| *name == entry.workout) {
            slot.1 += 1;
        }
    }

    WorkoutCounts { counts }
}

/// Workouts logged on one past day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub workouts: Vec<String>,
}

/// Activity for each of the `days` days before today, yesterday first
pub fn recent_activity<Tz: TimeZone>(
    entries: &[LogEntry],
    now: &DateTime<Tz>,
    days: u32,
) -> Vec<DayActivity> {
    let tz = now.timezone();
    let today = now.date_naive();
    (1..=i64::from(days))
        .map(|offset| {
            let date = today - Duration::days(offset);
            let mut on_day: Vec<&LogEntry> = entries
                .iter()
                .filter(|e| e.at(&tz).is_some_and(|at| at.date_naive() == date))
                .collect();
            on_day.sort_by_key(|e| e.timestamp);
            DayActivity {
                date,
                workouts: on_day.into_iter().map(|e| e.workout.clone()).collect(),
            }
        })
        .collect()
}

/// One option in today's workout picker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkoutChoice {
    pub workout: String,
    pub rest_day: bool,
    pub disabled: bool,
}

/// Which catalog workouts may still be logged today
///
/// Once a rest day is logged nothing else is offered; a workout already
/// logged today is not offered again; the rest day is only offered while
/// today is still empty.
pub fn workout_choices<Tz: TimeZone>(
    entries: &[LogEntry],
    catalog: &WorkoutCatalog,
    now: &DateTime<Tz>,
) -> Vec<WorkoutChoice> {
    let tz = now.timezone();
    let today = now.date_naive();
    let logged_today: Vec<&str> = entries
        .iter()
        .filter(|e| e.at(&tz).is_some_and(|at| at.date_naive() == today))
        .map(|e| e.workout.as_str())
        .collect();
    let rest_logged = logged_today.iter().any(|w| crate::is_rest_day(w));

    catalog
        .iter()
        .map(|workout| {
            let rest_day = crate::is_rest_day(workout);
            let disabled = rest_logged
                || logged_today.contains(&workout)
                || (rest_day && !logged_today.is_empty());
            WorkoutChoice {
                workout: workout.to_string(),
                rest_day,
                disabled,
            }
        })
        .collect()
}

/// Everything the dashboard shows, derived in one pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dashboard {
    pub streak: u32,
    pub month_count: usize,
    pub favorite: Option<String>,
    pub counts: WorkoutCounts,
    pub recent: Vec<DayActivity>,
}

impl Dashboard {
    pub fn build<Tz: TimeZone>(
        entries: &[LogEntry],
        catalog: &WorkoutCatalog,
        now: &DateTime<Tz>,
    ) -> Self {
        Self {
            streak: current_streak(entries, now),
            month_count: monthly_count(entries, now),
            favorite: favorite_workout(entries).map(str::to_string),
            counts: counts_by_workout(entries, catalog),
            recent: recent_activity(entries, now, 2),
        }
    }

    pub fn favorite_label(&self) -> &str {
        self.favorite.as_deref().unwrap_or(NO_FAVORITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::REST_DAY;
    use chrono::{FixedOffset, Utc};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn entry(when: DateTime<Utc>, workout: &str) -> LogEntry {
        LogEntry::new(None, when.timestamp_millis(), workout)
    }

    #[test]
    fn test_empty_log_gives_zero_values() {
        let now = at(10, 12);
        let catalog = WorkoutCatalog::default();

        assert_eq!(current_streak(&[], &now), 0);
        assert_eq!(monthly_count(&[], &now), 0);
        assert_eq!(favorite_workout(&[]), None);
        assert!(group_by_day(&[], &Utc).is_empty());
        assert_eq!(counts_by_workout(&[], &catalog).total(), 0);

        let dashboard = Dashboard::build(&[], &catalog, &now);
        assert_eq!(dashboard.favorite_label(), NO_FAVORITE);
    }

    #[test]
    fn test_three_consecutive_days_streak() {
        let entries = vec![
            entry(at(8, 9), "Legs"),
            entry(at(9, 9), "Back"),
            entry(at(10, 9), "Chest"),
        ];
        assert_eq!(current_streak(&entries, &at(10, 20)), 3);
    }

    #[test]
    fn test_gap_stops_streak() {
        let entries = vec![entry(at(7, 9), "Legs"), entry(at(10, 9), "Chest")];
        assert_eq!(current_streak(&entries, &at(10, 20)), 1);
    }

    #[test]
    fn test_streak_alive_from_yesterday() {
        let entries = vec![entry(at(8, 9), "Legs"), entry(at(9, 9), "Back")];
        assert_eq!(current_streak(&entries, &at(10, 20)), 2);
    }

    #[test]
    fn test_stale_log_has_no_streak() {
        let entries = vec![entry(at(7, 9), "Legs"), entry(at(8, 9), "Back")];
        assert_eq!(current_streak(&entries, &at(10, 20)), 0);
    }

    #[test]
    fn test_rest_days_neither_count_nor_break() {
        // A rest-only day is treated as if nothing was logged
        let entries = vec![
            entry(at(9, 9), "Legs"),
            entry(at(10, 9), REST_DAY),
        ];
        assert_eq!(current_streak(&entries, &at(10, 20)), 1);

        let rest_only = vec![entry(at(10, 9), "rest day")];
        assert_eq!(current_streak(&rest_only, &at(10, 20)), 0);
    }

    #[test]
    fn test_same_day_entries_count_once() {
        let entries = vec![entry(at(10, 9), "Chest"), entry(at(10, 18), "Chest")];
        let catalog = WorkoutCatalog::from_names(["Chest", "Back"]);

        assert_eq!(current_streak(&entries, &at(10, 20)), 1);

        let counts = counts_by_workout(&entries, &catalog);
        assert_eq!(counts.get("Chest"), Some(2));
        assert_eq!(counts.get("Back"), Some(0));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_streak_uses_time_zone_of_now() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let entries = vec![entry(at(9, 23) + Duration::minutes(30), "Legs")];
        let now = offset.with_ymd_and_hms(2025, 3, 11, 8, 0, 0).unwrap();

        assert_eq!(current_streak(&entries, &now), 1);
        assert_eq!(current_streak(&entries, &at(11, 8)), 0);
    }

    #[test]
    fn test_monthly_count_includes_rest_days() {
        let entries = vec![
            entry(at(1, 9), "Legs"),
            entry(at(2, 9), REST_DAY),
            entry(Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap(), "Back"),
            entry(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(), "Back"),
        ];
        let count = monthly_count(&entries, &at(15, 9));
        assert_eq!(count, 2);
        assert!(count <= entries.len());
    }

    #[test]
    fn test_favorite_ignores_rest_days() {
        let entries = vec![
            entry(at(1, 9), REST_DAY),
            entry(at(2, 9), REST_DAY),
            entry(at(3, 9), "Back"),
        ];
        assert_eq!(favorite_workout(&entries), Some("Back"));

        let all_rest = vec![entry(at(1, 9), REST_DAY), entry(at(2, 9), "REST DAY")];
        assert_eq!(favorite_workout(&all_rest), None);
    }

    #[test]
    fn test_favorite_tie_goes_to_first_seen() {
        let entries = vec![
            entry(at(1, 9), "Back"),
            entry(at(2, 9), "Legs"),
            entry(at(3, 9), "Legs"),
            entry(at(4, 9), "Back"),
        ];
        assert_eq!(favorite_workout(&entries), Some("Back"));

        let entries = vec![
            entry(at(1, 9), "Back"),
            entry(at(2, 9), "Legs"),
            entry(at(3, 9), "Legs"),
        ];
        assert_eq!(favorite_workout(&entries), Some("Legs"));
    }

    #[test]
    fn test_counts_ignore_unknown_workouts() {
        let entries = vec![
            entry(at(1, 9), "Yoga"),
            entry(at(2, 9), "Legs"),
            entry(at(3, 9), REST_DAY),
        ];
        let counts = counts_by_workout(&entries, &WorkoutCatalog::default());

        assert_eq!(counts.get("Yoga"), None);
        assert_eq!(counts.get(REST_DAY), None);
        assert_eq!(counts.get("Legs"), Some(1));
        assert_eq!(counts.len(), 7);
        let names: Vec<&str> = counts.iter().map(|(name, _)| name).collect();
        assert_eq!(names[0], "Legs");
    }

    #[test]
    fn test_group_by_day_sorts_newest_first() {
        let entries = vec![
            entry(at(1, 8), "Legs"),
            entry(at(2, 9), "Back"),
            entry(at(1, 19), "Abs"),
        ];
        let days = group_by_day(&entries, &Utc);

        assert_eq!(days.len(), 2);
        let first = &days[&at(1, 0).date_naive()];
        assert_eq!(first[0].workout, "Abs");
        assert_eq!(first[1].workout, "Legs");
    }

    #[test]
    fn test_entries_on_day() {
        let entries = vec![entry(at(1, 8), "Legs"), entry(at(2, 9), "Back")];
        let found = entries_on(&entries, at(2, 0).date_naive(), &Utc);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workout, "Back");
    }

    #[test]
    fn test_recent_activity_covers_previous_days() {
        let entries = vec![
            entry(at(9, 7), "Legs"),
            entry(at(9, 18), "Abs"),
            entry(at(10, 9), "Back"),
        ];
        let recent = recent_activity(&entries, &at(10, 20), 2);

        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, at(9, 0).date_naive());
        assert_eq!(recent[0].workouts, vec!["Legs".to_string(), "Abs".to_string()]);
        assert!(recent[1].workouts.is_empty());
    }

    #[test]
    fn test_choices_disable_logged_workouts() {
        let catalog = WorkoutCatalog::from_names(["Legs", "Back", REST_DAY]);
        let entries = vec![entry(at(10, 9), "Legs"), entry(at(9, 9), "Back")];
        let choices = workout_choices(&entries, &catalog, &at(10, 20));

        let disabled: Vec<&str> = choices
            .iter()
            .filter(|c| c.disabled)
            .map(|c| c.workout.as_str())
            .collect();
        assert_eq!(disabled, vec!["Legs", REST_DAY]);
    }

    #[test]
    fn test_choices_after_rest_day_are_all_disabled() {
        let catalog = WorkoutCatalog::default();
        let entries = vec![entry(at(10, 9), REST_DAY)];
        let choices = workout_choices(&entries, &catalog, &at(10, 20));
        assert!(choices.iter().all(|c| c.disabled));
    }

    #[test]
    fn test_choices_on_empty_day_are_all_enabled() {
        let catalog = WorkoutCatalog::default();
        let choices = workout_choices(&[], &catalog, &at(10, 20));
        assert!(choices.iter().all(|c| !c.disabled));
        assert!(choices.last().unwrap().rest_day);
    }

    #[test]
    fn test_dashboard_summary() {
        let entries = vec![
            entry(at(9, 9), "Legs"),
            entry(at(10, 9), "Legs"),
            entry(at(10, 10), "Back"),
        ];
        let dashboard = Dashboard::build(&entries, &WorkoutCatalog::default(), &at(10, 20));

        assert_eq!(dashboard.streak, 2);
        assert_eq!(dashboard.month_count, 3);
        assert_eq!(dashboard.favorite_label(), "Legs");
        assert_eq!(dashboard.counts.get("Back"), Some(1));
        assert_eq!(dashboard.recent[0].workouts, vec!["Legs".to_string()]);
    }
}
