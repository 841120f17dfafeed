use crate::alarm::types::{Alarm, RepeatRule};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// How far ahead `next_occurrence` searches before giving up.
const LOOKAHEAD_DAYS: i64 = 400;

/// Decides whether `rule` allows a firing on `today`.
///
/// `weekday` uses 0 = Sunday .. 6 = Saturday. `already_fired_today` only
/// gates one-shot alarms; recurring rules are de-duplicated by the
/// scheduler's minute key instead.
pub fn should_fire(
    rule: &RepeatRule,
    today: NaiveDate,
    weekday: u32,
    already_fired_today: bool,
) -> bool {
    match rule {
        RepeatRule::Once => !already_fired_today,
        RepeatRule::Daily => true,
        RepeatRule::Workdays => (1..=5).contains(&weekday),
        RepeatRule::MonToSat => (1..=6).contains(&weekday),
        RepeatRule::Custom { days } => u8::try_from(weekday)
            .map(|w| days.contains(&w))
            .unwrap_or(false),
        RepeatRule::Shift {
            start_date,
            work_days,
            rest_days,
        } => {
            let diff_days = (today - *start_date).num_days();
            if diff_days < 0 {
                return false;
            }
            let cycle_len = i64::from(*work_days) + i64::from(*rest_days);
            // Misconfigured cycles never fire.
            if cycle_len == 0 {
                return false;
            }
            diff_days % cycle_len < i64::from(*work_days)
        }
    }
}

/// Convenience wrapper deriving the weekday index from the date itself.
pub fn fires_on(rule: &RepeatRule, day: NaiveDate, already_fired_today: bool) -> bool {
    should_fire(
        rule,
        day,
        day.weekday().num_days_from_sunday(),
        already_fired_today,
    )
}

/// Earliest firing instant strictly after the minute containing `now`.
pub fn next_occurrence(alarm: &Alarm, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if !alarm.enabled || alarm.repeat.validate().is_err() {
        return None;
    }
    let at = NaiveTime::from_hms_opt(alarm.hour, alarm.minute, 0)?;
    let today = now.date();
    let now_minute = (now.hour(), now.minute());

    for offset in 0..LOOKAHEAD_DAYS {
        let day = today + Duration::days(offset);
        if offset == 0 && (alarm.hour, alarm.minute) <= now_minute {
            continue;
        }
        let fired = alarm.last_triggered_date == Some(day);
        if fires_on(&alarm.repeat, day, fired) {
            return Some(day.and_time(at));
        }
    }
    None
}
