//! Orchestration around the pure stage tracker.
//!
//! Every mutation is a read-modify-write: load a fresh snapshot, apply the
//! tracker operation, and save with a version check. A `VersionConflict`
//! means another writer got there first, so the whole cycle is replayed
//! against a new snapshot, up to `max_attempts` times.

use anyhow::{Context, Result};
use std::collections::HashMap;
use crate::models::{EventKind, Truck};
use crate::repo::{AuditLog, StoreError, TruckStore, UserDirectory, WorkflowCatalog};
use crate::tracker::{StageTracker, TrackerError};

/// Tracking operations over a set of storage collaborators
pub struct TrackingService<'a, S, C, D, A> {
    store: &'a S,
    catalog: &'a C,
    directory: &'a D,
    audit: &'a A,
    max_attempts: u32,
}

impl<'a, S, C, D, A> TrackingService<'a, S, C, D, A>
where
    S: TruckStore,
    C: WorkflowCatalog,
    D: UserDirectory,
    A: AuditLog,
{
    pub fn new(store: &'a S, catalog: &'a C, directory: &'a D, audit: &'a A, max_attempts: u32) -> Self {
        Self {
            store,
            catalog,
            directory,
            audit,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create a truck using `workflow`, or the catalog default when None
    pub fn create_truck(
        &self,
        tracking_number: &str,
        details: HashMap<String, String>,
        workflow: Option<&str>,
    ) -> Result<Truck> {
        let workflow = workflow.unwrap_or_else(|| self.catalog.default_workflow());
        let stages = self.catalog.get_stages(workflow)?;

        if self.store.exists(tracking_number)? {
            return Err(TrackerError::DuplicateTrackingNumber(tracking_number.to_string()).into());
        }

        let truck = StageTracker::create_truck(tracking_number, details, &stages)?;
        let saved = self.store.insert(&truck).map_err(|e| match e {
            StoreError::AlreadyExists { .. } => {
                anyhow::Error::new(TrackerError::DuplicateTrackingNumber(tracking_number.to_string()))
            }
            other => anyhow::Error::new(other),
        })?;

        log::info!(
            "Created truck {} with workflow '{}' ({} stages)",
            tracking_number,
            workflow,
            saved.stages.len()
        );
        Ok(saved)
    }

    /// Record a start or end event on behalf of `identity`
    pub fn record_event(
        &self,
        tracking_number: &str,
        stage_name: &str,
        is_start: bool,
        identity: &str,
    ) -> Result<Truck> {
        let user = self.directory.get_user(identity)?;
        let kind = EventKind::progression(is_start);

        let saved = self.apply_with_retry(tracking_number, |truck| {
            let ts = chrono::Utc::now().timestamp();
            StageTracker::record_event_at(truck, stage_name, is_start, &user, ts)
        })?;

        let ts = saved.modified_ts;
        self.audit
            .append(tracking_number, kind, stage_name, &user.identity, ts)
            .context("Failed to append audit event")?;

        log::info!(
            "Truck {}: {} '{}' by {} (position {}/{})",
            tracking_number,
            kind,
            stage_name,
            user.identity,
            saved.current_stage,
            saved.terminal_stage()
        );
        Ok(saved)
    }

    /// Administrative override of the finished flag
    pub fn set_finished(&self, tracking_number: &str, finished: bool, identity: &str) -> Result<Truck> {
        let user = self.directory.get_user(identity)?;

        let saved = self.apply_with_retry(tracking_number, |truck| {
            StageTracker::set_finished_override(truck, finished, &user)
        })?;

        let detail = if finished { "finished" } else { "unfinished" };
        self.audit
            .append(tracking_number, EventKind::Override, detail, &user.identity, saved.modified_ts)
            .context("Failed to append audit event")?;

        log::warn!(
            "Truck {}: finished flag overridden to {} by {} at position {}/{}",
            tracking_number,
            finished,
            user.identity,
            saved.current_stage,
            saved.terminal_stage()
        );
        Ok(saved)
    }

    pub fn truck(&self, tracking_number: &str) -> Result<Truck> {
        Ok(self.store.load(tracking_number)?)
    }

    pub fn trucks(&self) -> Result<Vec<Truck>> {
        Ok(self.store.list()?)
    }

    /// Load, apply `op`, save; replay on version conflicts.
    /// Tracker errors are returned immediately without retrying.
    fn apply_with_retry<F>(&self, tracking_number: &str, op: F) -> Result<Truck>
    where
        F: Fn(&Truck) -> Result<Truck, TrackerError>,
    {
        let mut attempt = 1;
        loop {
            let snapshot = self.store.load(tracking_number)?;
            let updated = op(&snapshot)?;

            match self.store.save(&updated) {
                Ok(saved) => return Ok(saved),
                Err(StoreError::VersionConflict(_)) if attempt < self.max_attempts => {
                    log::debug!(
                        "Truck {} changed during update (attempt {}/{}), reloading",
                        tracking_number,
                        attempt,
                        self.max_attempts
                    );
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to save truck {}", tracking_number));
                }
            }
        }
    }
}
