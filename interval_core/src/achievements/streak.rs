//! Weekly streak bookkeeping on Monday-start weeks.

use chrono::{Datelike, Duration, NaiveDate};

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Streak after a workout on `today`
///
/// A first workout starts at 1. A gap of more than `gap_days` since the last
/// workout resets to 1, as does skipping a whole week. The same week leaves
/// the streak alone and the following week extends it. A date before the
/// last recorded one changes nothing.
pub fn next_weekly_streak(
    current: u32,
    last_workout: Option<NaiveDate>,
    today: NaiveDate,
    gap_days: i64,
) -> u32 {
    let Some(last) = last_workout else {
        return 1;
    };

    if (today - last).num_days() > gap_days {
        return 1;
    }

    let weeks = (week_start(today) - week_start(last)).num_days() / 7;
    match weeks {
        w if w <= 0 => current.max(1),
        1 => current.saturating_add(1).max(2),
        _ => 1,
    }
}
