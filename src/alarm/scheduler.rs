use crate::alarm::recurrence::should_fire;
use crate::alarm::types::Alarm;
use crate::notify::{DeliveryOutcome, Notifier};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::{info, warn};

/// Minute-granularity key; two ticks inside one wall-clock minute share it.
pub fn minute_key(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub alarm_id: String,
    pub outcome: DeliveryOutcome,
    /// State written back to the alarm by this firing.
    pub enabled: bool,
    pub triggered_on: NaiveDate,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub fired: Vec<Firing>,
    /// Matching alarms whose rule is misconfigured.
    pub skipped: Vec<String>,
}

/// Firing state owned by a single timer loop.
#[derive(Debug, Default)]
pub struct Scheduler {
    last_minute: Option<String>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_new_minute(&self, now: NaiveDateTime) -> bool {
        self.last_minute.as_deref() != Some(minute_key(now).as_str())
    }

    /// Runs a sweep if `now` falls in a minute not yet processed. The minute
    /// is recorded only once the sweep has completed.
    pub async fn tick(
        &mut self,
        now: NaiveDateTime,
        alarms: &mut [Alarm],
        notifier: &Notifier,
    ) -> Option<SweepReport> {
        let key = minute_key(now);
        if self.last_minute.as_deref() == Some(key.as_str()) {
            return None;
        }
        let report = sweep(now, alarms, notifier).await;
        self.last_minute = Some(key);
        Some(report)
    }
}

/// Evaluates every enabled alarm matching `now`'s hour and minute, in store
/// order, delivering and then updating state for each one that fires.
pub async fn sweep(now: NaiveDateTime, alarms: &mut [Alarm], notifier: &Notifier) -> SweepReport {
    let today = now.date();
    let weekday = today.weekday().num_days_from_sunday();
    let mut report = SweepReport::default();

    for alarm in alarms.iter_mut() {
        if !alarm.enabled || alarm.hour != now.hour() || alarm.minute != now.minute() {
            continue;
        }
        if let Err(e) = alarm.repeat.validate() {
            warn!(alarm_id = %alarm.id, error = %e, "Skipping misconfigured alarm");
            report.skipped.push(alarm.id.clone());
            continue;
        }

        let already_fired_today = alarm.last_triggered_date == Some(today);
        if !should_fire(&alarm.repeat, today, weekday, already_fired_today) {
            continue;
        }

        let (title, body) = render(alarm);
        let outcome = notifier.deliver(&title, &body).await;
        info!(
            alarm_id = %alarm.id,
            label = %alarm.label,
            outcome = %outcome,
            "Alarm fired"
        );

        // Firing counts even when delivery failed.
        if alarm.repeat.is_once() {
            alarm.enabled = false;
        }
        alarm.last_triggered_date = Some(today);

        report.fired.push(Firing {
            alarm_id: alarm.id.clone(),
            outcome,
            enabled: alarm.enabled,
            triggered_on: today,
        });
    }

    report
}

fn render(alarm: &Alarm) -> (String, String) {
    (
        alarm.label.clone(),
        format!("{} - {}", alarm.time_label(), alarm.repeat),
    )
}
