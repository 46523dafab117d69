use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use super::StageRecord;

/// A tracked truck and its position in its stage sequence.
///
/// `current_stage` encodes both the stage and the half of it the truck
/// occupies: `2k` is "awaiting start of stage k", `2k + 1` is "stage k
/// started, awaiting its end", and `2 * stages.len()` means every stage is
/// closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Truck {
    pub tracking_number: String,
    pub details: HashMap<String, String>, // Free-form metadata, opaque to the tracker
    pub stages: Vec<StageRecord>,
    pub current_stage: usize,
    pub finished: bool,
    /// Storage revision used for compare-and-swap saves
    pub version: i64,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Truck {
    /// The `current_stage` value reached once every stage is closed
    pub fn terminal_stage(&self) -> usize {
        2 * self.stages.len()
    }

    /// Index of the stage `current_stage` points into
    pub fn active_index(&self) -> usize {
        self.current_stage / 2
    }

    /// The record of the active stage, or None once all stages are closed
    pub fn active_record(&self) -> Option<&StageRecord> {
        self.stages.get(self.active_index())
    }

    /// Even position: the active stage has not been started
    pub fn awaiting_start(&self) -> bool {
        self.current_stage % 2 == 0
    }

    /// Check that stage numbering and timestamps agree with `current_stage`.
    ///
    /// The `finished` flag is not checked here since an administrative
    /// override may set it independently.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.stages.is_empty() {
            return Err(format!("Truck '{}' has no stages", self.tracking_number));
        }
        if self.current_stage > self.terminal_stage() {
            return Err(format!(
                "Truck '{}' is at position {} beyond terminal {}",
                self.tracking_number,
                self.current_stage,
                self.terminal_stage()
            ));
        }

        let active = self.active_index();
        for (idx, record) in self.stages.iter().enumerate() {
            if record.stage.stage_number != idx {
                return Err(format!(
                    "Stage '{}' has number {} at position {}",
                    record.name(),
                    record.stage.stage_number,
                    idx
                ));
            }

            let (want_start, want_end) = if idx < active {
                (true, true)
            } else if idx == active {
                (!self.awaiting_start(), false)
            } else {
                (false, false)
            };

            if record.start.is_some() != want_start || record.end.is_some() != want_end {
                return Err(format!(
                    "Stage '{}' timestamps do not match position {}",
                    record.name(),
                    self.current_stage
                ));
            }
        }
        Ok(())
    }
}
