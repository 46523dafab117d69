//! Stage progression state machine.
//!
//! Every operation takes a truck snapshot and returns a new value; nothing
//! here touches storage. Persisting the result, and serializing concurrent
//! writers, is the caller's job (see [`crate::service`]).

use crate::models::{EventKind, StageRecord, Truck, User};
use std::collections::HashMap;

/// Reported by [`StageTracker::active_stage_name`] once no stage is active
pub const COMPLETED: &str = "completed";

/// Validation failures of the stage tracker. None of them mutate the truck.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("User '{identity}' is not authorized to {action}")]
    Unauthorized { identity: String, action: String },
    #[error("Stage mismatch: truck '{tracking_number}' is at '{expected}', not '{requested}'")]
    StageMismatch {
        tracking_number: String,
        expected: String,
        requested: String,
    },
    #[error("Out of order event: stage '{stage}' is not awaiting its {event}")]
    OutOfOrderEvent { stage: String, event: EventKind },
    #[error("Truck '{0}' is already finished")]
    AlreadyFinished(String),
    #[error("Workflow has no stages")]
    EmptyWorkflow,
    #[error("Truck '{0}' already exists")]
    DuplicateTrackingNumber(String),
}

/// Stage tracker operations
pub struct StageTracker;

impl StageTracker {
    /// Build a fresh truck with one empty record per stage template
    pub fn create_truck(
        tracking_number: &str,
        details: HashMap<String, String>,
        stage_templates: &[String],
    ) -> Result<Truck, TrackerError> {
        if stage_templates.is_empty() {
            return Err(TrackerError::EmptyWorkflow);
        }

        let stages = stage_templates
            .iter()
            .enumerate()
            .map(|(idx, name)| StageRecord::new(name, idx))
            .collect();

        let now = chrono::Utc::now().timestamp();
        Ok(Truck {
            tracking_number: tracking_number.to_string(),
            details,
            stages,
            current_stage: 0,
            finished: false,
            version: 0,
            created_ts: now,
            modified_ts: now,
        })
    }

    /// Record a start or end event for `stage_name`, stamped with the current time
    pub fn record_event(
        truck: &Truck,
        stage_name: &str,
        is_start: bool,
        acting_user: &User,
    ) -> Result<Truck, TrackerError> {
        let now = chrono::Utc::now().timestamp();
        Self::record_event_at(truck, stage_name, is_start, acting_user, now)
    }

    /// Record a start or end event with an explicit timestamp.
    ///
    /// Guards run in this order: authorization, finished, stage identity,
    /// event type. On success the active stage gets its timestamp and
    /// `current_stage` advances by exactly one.
    pub fn record_event_at(
        truck: &Truck,
        stage_name: &str,
        is_start: bool,
        acting_user: &User,
        ts: i64,
    ) -> Result<Truck, TrackerError> {
        let event = EventKind::progression(is_start);

        // Operators need both the requested stage and the stage the truck is at
        let active_name = if truck.finished {
            None
        } else {
            truck.active_record().map(|r| r.name())
        };
        let denied = std::iter::once(stage_name)
            .chain(active_name)
            .find(|checkpoint| !acting_user.may_operate(checkpoint));
        if let Some(checkpoint) = denied {
            return Err(TrackerError::Unauthorized {
                identity: acting_user.identity.clone(),
                action: format!("record {} at '{}'", event, checkpoint),
            });
        }

        // Checked before the stage match: at the terminal position there is
        // no active stage to compare against.
        if truck.finished {
            return Err(TrackerError::AlreadyFinished(truck.tracking_number.clone()));
        }

        let k = truck.active_index();
        let active = match truck.active_record() {
            Some(record) if record.name() == stage_name => record,
            other => {
                return Err(TrackerError::StageMismatch {
                    tracking_number: truck.tracking_number.clone(),
                    expected: other.map(|r| r.name()).unwrap_or(COMPLETED).to_string(),
                    requested: stage_name.to_string(),
                });
            }
        };

        let expected_position = if is_start { 2 * k } else { 2 * k + 1 };
        if truck.current_stage != expected_position {
            return Err(TrackerError::OutOfOrderEvent {
                stage: active.name().to_string(),
                event,
            });
        }

        let mut next = truck.clone();
        let record = &mut next.stages[k];
        if is_start {
            record.start = Some(ts);
        } else {
            record.end = Some(ts);
        }
        next.current_stage += 1;
        if next.current_stage == next.terminal_stage() {
            next.finished = true;
        }
        next.modified_ts = ts;

        Ok(next)
    }

    /// Fraction of stage events recorded, in `[0, 1]`
    pub fn progress_fraction(truck: &Truck) -> f64 {
        let terminal = truck.terminal_stage();
        if terminal == 0 {
            return 0.0;
        }
        (truck.current_stage as f64 / terminal as f64).min(1.0)
    }

    /// Name of the active stage, or [`COMPLETED`] when finished or past the last stage
    pub fn active_stage_name(truck: &Truck) -> &str {
        if truck.finished {
            return COMPLETED;
        }
        truck.active_record().map(|r| r.name()).unwrap_or(COMPLETED)
    }

    /// Administrative correction of the finished flag.
    /// Leaves `current_stage` and every stage record untouched.
    pub fn set_finished_override(
        truck: &Truck,
        finished: bool,
        acting_user: &User,
    ) -> Result<Truck, TrackerError> {
        if !acting_user.is_admin() {
            return Err(TrackerError::Unauthorized {
                identity: acting_user.identity.clone(),
                action: "override the finished flag".to_string(),
            });
        }

        let mut next = truck.clone();
        next.finished = finished;
        next.modified_ts = chrono::Utc::now().timestamp();
        Ok(next)
    }
}
