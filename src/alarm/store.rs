use crate::alarm::scheduler::Firing;
use crate::alarm::types::{Alarm, AlarmStoreData};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const STORE_VERSION: i32 = 1;

/// Ordered alarm collection backed by `alarms.json` in the data dir.
///
/// Firing state recorded with [`AlarmStore::record_firings`] is kept until a
/// save succeeds and is re-applied on every load, so a concurrent writer or a
/// failed save cannot drop it.
pub struct AlarmStore {
    path: PathBuf,
    pub alarms: Vec<Alarm>,
    pending: Vec<Firing>,
}

impl AlarmStore {
    pub fn new(data_dir: PathBuf) -> Self {
        let path = data_dir.join("alarms.json");
        Self {
            path,
            alarms: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = fs::read_to_string(&self.path)
                .with_context(|| format!("failed to read {}", self.path.display()))?;
            let data: AlarmStoreData = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", self.path.display()))?;
            self.alarms = data.alarms;
        } else {
            self.alarms = Vec::new();
        }
        apply_firings(&mut self.alarms, &self.pending);
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let data = AlarmStoreData {
            version: STORE_VERSION,
            alarms: self.alarms.clone(),
        };
        let content = serde_json::to_string_pretty(&data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        self.pending.clear();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, alarm: Alarm) -> Result<()> {
        self.alarms.push(alarm);
        self.save()
    }

    /// Replaces the alarm with the same id in place, keeping its position.
    pub fn replace(&mut self, alarm: Alarm) -> Result<bool> {
        match self.alarms.iter_mut().find(|a| a.id == alarm.id) {
            Some(slot) => {
                *slot = alarm;
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Queues sweep results until the next successful save. Does not save.
    pub fn record_firings(&mut self, firings: &[Firing]) {
        self.pending.extend_from_slice(firings);
        apply_firings(&mut self.alarms, firings);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let len_before = self.alarms.len();
        self.alarms.retain(|a| a.id != id);
        let removed = self.alarms.len() < len_before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }
}

/// Writes fired state onto alarms by id. Alarms removed since the sweep are
/// skipped.
fn apply_firings(alarms: &mut [Alarm], firings: &[Firing]) {
    for firing in firings {
        if let Some(alarm) = alarms.iter_mut().find(|a| a.id == firing.alarm_id) {
            alarm.enabled = firing.enabled;
            alarm.last_triggered_date = Some(firing.triggered_on);
        }
    }
}
