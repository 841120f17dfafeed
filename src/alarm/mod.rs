pub mod recurrence;
pub mod scheduler;
pub mod store;
pub mod types;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::notify::{DeliveryOutcome, DeliveryStyle, Notifier, NotifyError};
use anyhow::Result;
use chrono::NaiveDateTime;
use scheduler::Scheduler;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info};
use types::{Alarm, AlarmDraft, AlarmError};

const MIN_TICK_MS: u64 = 100;
const MAX_TICK_MS: u64 = 60_000;

struct AlarmInner {
    cfg: AppConfig,
    store: Mutex<store::AlarmStore>,
    scheduler: Mutex<Scheduler>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    shutdown: Notify,
}

#[derive(Clone)]
pub struct AlarmService {
    inner: Arc<AlarmInner>,
}

pub struct AlarmStatus {
    pub alarms: usize,
    pub enabled_alarms: usize,
    pub next_alarm: Option<(String, NaiveDateTime)>,
}

impl AlarmService {
    pub fn new(cfg: &AppConfig, notifier: Notifier, clock: Arc<dyn Clock>) -> Self {
        let store = store::AlarmStore::new(cfg.data_dir.clone());
        Self {
            inner: Arc::new(AlarmInner {
                cfg: cfg.clone(),
                store: Mutex::new(store),
                scheduler: Mutex::new(Scheduler::new()),
                notifier,
                clock,
                shutdown: Notify::new(),
            }),
        }
    }

    /// Loads the store and spawns the timer loop. The loop runs until
    /// [`AlarmService::stop`] is called.
    pub async fn start(&self) -> JoinHandle<()> {
        {
            let mut store = self.inner.store.lock().await;
            if let Err(e) = store.load() {
                error!("Failed to load alarms: {:#}", e);
            }
            info!(
                "Alarm service started with {} alarms ({} enabled)",
                store.alarms.len(),
                store.alarms.iter().filter(|a| a.enabled).count()
            );
        }

        let loop_service = self.clone();
        let tick = tick_interval(&self.inner.cfg);

        tokio::spawn(async move {
            let mut interval = time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_service.inner.shutdown.notified() => {
                        info!("Alarm service stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        loop_service.run_tick().await;
                    }
                }
            }
        })
    }

    pub fn stop(&self) {
        // notify_one stores a permit, so a stop issued mid-tick is not lost.
        self.inner.shutdown.notify_one();
    }

    /// One clock tick: a no-op unless the wall-clock minute changed.
    pub async fn run_tick(&self) {
        let now = self.inner.clock.now();
        let mut scheduler = self.inner.scheduler.lock().await;
        if !scheduler.is_new_minute(now) {
            return;
        }

        let mut store = self.inner.store.lock().await;
        // Pick up CLI edits made by another process; keep the in-memory
        // copy if the file is unreadable.
        if let Err(e) = store.load() {
            error!("Failed to reload alarms before sweep: {:#}", e);
        }

        if let Some(report) = scheduler
            .tick(now, &mut store.alarms, &self.inner.notifier)
            .await
        {
            if !report.fired.is_empty() || !report.skipped.is_empty() {
                let failed = report
                    .fired
                    .iter()
                    .filter(|f| f.outcome == DeliveryOutcome::Failed)
                    .count();
                debug!(
                    fired = report.fired.len(),
                    failed,
                    skipped = report.skipped.len(),
                    "Sweep finished"
                );
            }
            store.record_firings(&report.fired);
        }

        if store.has_pending() {
            // Merge onto the current file so edits made during delivery survive.
            if let Err(e) = store.load() {
                error!("Failed to reload alarms after sweep: {:#}", e);
            }
            if let Err(e) = store.save() {
                error!("Failed to save alarms after sweep, will retry: {:#}", e);
            }
        }
    }

    pub async fn create_alarm(&self, draft: AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let mut store = self.inner.store.lock().await;
        store.load()?;

        let mut id = new_id();
        while store.contains(&id) {
            id = new_id();
        }
        let alarm = Alarm {
            id,
            hour: draft.hour,
            minute: draft.minute,
            label: self.inner.cfg.label_or_default(&draft.label),
            enabled: draft.enabled,
            repeat: draft.repeat,
            last_triggered_date: None,
        };

        store.add(alarm.clone())?;
        info!(alarm_id = %alarm.id, "Added alarm at {}", alarm.time_label());
        Ok(alarm)
    }

    pub async fn list_alarms(&self) -> Result<Vec<Alarm>> {
        let mut store = self.inner.store.lock().await;
        store.load()?;
        Ok(store.alarms.clone())
    }

    pub async fn get_alarm(&self, id: &str) -> Result<Option<Alarm>> {
        let mut store = self.inner.store.lock().await;
        store.load()?;
        Ok(store.get(id).cloned())
    }

    /// Full replace of the editable fields. An edit starts a fresh schedule,
    /// so the last-triggered marker is cleared.
    pub async fn update_alarm(&self, id: &str, draft: AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let mut store = self.inner.store.lock().await;
        store.load()?;

        let alarm = Alarm {
            id: id.to_string(),
            hour: draft.hour,
            minute: draft.minute,
            label: self.inner.cfg.label_or_default(&draft.label),
            enabled: draft.enabled,
            repeat: draft.repeat,
            last_triggered_date: None,
        };
        if !store.replace(alarm.clone())? {
            return Err(AlarmError::NotFound(id.to_string()).into());
        }
        info!(alarm_id = %id, "Updated alarm");
        Ok(alarm)
    }

    pub async fn remove_alarm(&self, id: &str) -> Result<bool> {
        let mut store = self.inner.store.lock().await;
        store.load()?;
        let removed = store.remove(id)?;
        if removed {
            info!(alarm_id = %id, "Removed alarm");
        }
        Ok(removed)
    }

    /// Flips `enabled`. Re-enabling clears the last-triggered marker so a
    /// one-shot alarm can fire again the same day.
    pub async fn toggle_alarm(&self, id: &str) -> Result<Alarm> {
        let mut store = self.inner.store.lock().await;
        store.load()?;
        let alarm = store
            .get_mut(id)
            .ok_or_else(|| AlarmError::NotFound(id.to_string()))?;
        alarm.enabled = !alarm.enabled;
        if alarm.enabled {
            alarm.last_triggered_date = None;
        }
        let toggled = alarm.clone();
        store.save()?;
        info!(alarm_id = %id, enabled = toggled.enabled, "Toggled alarm");
        Ok(toggled)
    }

    pub fn delivery_style(&self) -> DeliveryStyle {
        self.inner.notifier.style()
    }

    pub fn set_delivery_style(&self, style: DeliveryStyle) {
        self.inner.notifier.set_style(style);
    }

    pub async fn send_test_notification(&self) -> Result<(), NotifyError> {
        self.inner.notifier.send_test().await
    }

    pub async fn status(&self) -> Result<AlarmStatus> {
        let mut store = self.inner.store.lock().await;
        store.load()?;
        let now = self.inner.clock.now();
        let next_alarm = store
            .alarms
            .iter()
            .filter_map(|a| recurrence::next_occurrence(a, now).map(|at| (a.id.clone(), at)))
            .min_by_key(|(_, at)| *at);
        Ok(AlarmStatus {
            alarms: store.alarms.len(),
            enabled_alarms: store.alarms.iter().filter(|a| a.enabled).count(),
            next_alarm,
        })
    }

    pub fn now(&self) -> NaiveDateTime {
        self.inner.clock.now()
    }
}

fn tick_interval(cfg: &AppConfig) -> Duration {
    Duration::from_millis(cfg.tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}
