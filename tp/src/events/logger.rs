//! Event Logger - persists events to JSONL files
//!
//! Subscribes to the EventBus and appends every event to
//! `<events_dir>/<session-id>/events.jsonl`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::Context;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, TripEvent};

/// Event logger that writes events to per-session JSONL files
pub struct EventLogger {
    events_dir: PathBuf,
    /// Open file writers per session
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(events_dir: impl AsRef<Path>) -> Self {
        let events_dir = events_dir.as_ref().to_path_buf();
        debug!(?events_dir, "EventLogger::new: creating logger");
        Self {
            events_dir,
            writers: HashMap::new(),
        }
    }

    /// Logger under `<data_local_dir>/tripplanner/events`
    pub fn with_default_path() -> eyre::Result<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| eyre::eyre!("Could not determine data directory"))?;
        let events_dir = base.join("tripplanner").join("events");
        fs::create_dir_all(&events_dir).context("Failed to create events directory")?;
        Ok(Self::new(events_dir))
    }

    /// Append an event to its session's log file
    pub fn write_event(&mut self, event: &TripEvent) -> eyre::Result<()> {
        let session_id = event.session_id().to_string();
        debug!(%session_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(&session_id) {
            let session_dir = self.events_dir.join(&session_id);
            fs::create_dir_all(&session_dir)?;
            let log_path = session_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: creating new log file");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(session_id.clone(), BufWriter::new(file));
        }
        let writer = self
            .writers
            .get_mut(&session_id)
            .ok_or_else(|| eyre::eyre!("no writer for session {}", session_id))?;

        let json = serde_json::to_string(&EventLogEntry::new(event.clone()))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Close the writer for a session
    pub fn close_session(&mut self, session_id: &str) {
        debug!(%session_id, "EventLogger::close_session");
        if let Some(mut writer) = self.writers.remove(session_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, event_bus: Arc<EventBus>) {
        debug!("EventLogger::run: starting event logger");
        let mut rx = event_bus.subscribe();
        drop(event_bus);

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(session_id = event.session_id(), error = %e, "EventLogger: failed to write event");
                    }
                    if let TripEvent::StageReached { stage, .. } = &event
                        && stage.is_terminal()
                    {
                        self.close_session(event.session_id());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }

        for (session_id, mut writer) in self.writers.drain() {
            debug!(%session_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read the logged events of one session
pub fn read_session_events(events_dir: impl AsRef<Path>, session_id: &str) -> eyre::Result<Vec<EventLogEntry>> {
    let log_path = events_dir.as_ref().join(session_id).join("events.jsonl");
    debug!(?log_path, "read_session_events: reading log file");

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_session_events: failed to parse line"),
        }
    }
    Ok(entries)
}

/// Spawn the event logger as a background task
pub fn spawn_event_logger(event_bus: Arc<EventBus>) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::with_default_path()?;
    Ok(tokio::spawn(async move {
        logger.run(event_bus).await;
    }))
}
