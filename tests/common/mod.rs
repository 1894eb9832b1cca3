//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sitepush::core::notify::{DeployEvent, NotificationChannel};
use sitepush::domain::BackendError;
use std::path::Path;
use std::sync::Mutex;

/// Start time shared by every fixture run
pub fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

/// Write `files` under `dir`, each containing its own path
pub fn write_export(dir: &Path, files: &[&str]) {
    for file in files {
        let path = dir.join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, file.as_bytes()).unwrap();
    }
}

/// Notification channel that keeps every event it receives
#[derive(Default)]
pub struct RecordingChannel {
    events: Mutex<Vec<DeployEvent>>,
}

impl RecordingChannel {
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &DeployEvent) -> Result<(), BackendError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
