use serde::{Deserialize, Serialize};

/// A named phase of a workflow at a fixed, 0-based position.
/// Attached to a truck at creation time and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: String,
    pub stage_number: usize,
}

/// Start/end timestamps (UTC seconds) for one stage of one truck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl StageRecord {
    /// Create an empty record for the stage at `stage_number`
    pub fn new(name: &str, stage_number: usize) -> Self {
        Self {
            stage: Stage {
                name: name.to_string(),
                stage_number,
            },
            start: None,
            end: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.stage.name
    }

    /// Both events recorded
    pub fn is_elapsed(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Time spent at the stage, if it has been both entered and left
    pub fn dwell_secs(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Stage names: non-empty, letters, digits, `_`, `-` and `.`
pub fn is_valid_stage_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_charset() {
        assert!(is_valid_stage_name("weigh_bridge_return"));
        assert!(is_valid_stage_name("qc-2.b"));
        assert!(!is_valid_stage_name(""));
        assert!(!is_valid_stage_name("entry gate"));
        assert!(!is_valid_stage_name("qc/2"));
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = StageRecord::new("entry_gate", 0);
        assert_eq!(record.name(), "entry_gate");
        assert_eq!(record.stage.stage_number, 0);
        assert!(record.start.is_none());
        assert!(record.end.is_none());
        assert!(!record.is_elapsed());
    }

    #[test]
    fn test_dwell_secs() {
        let mut record = StageRecord::new("qc", 3);
        assert_eq!(record.dwell_secs(), None);

        record.start = Some(1_704_067_200);
        assert_eq!(record.dwell_secs(), None);

        record.end = Some(1_704_067_290);
        assert_eq!(record.dwell_secs(), Some(90));
        assert!(record.is_elapsed());
    }

    #[test]
    fn test_stage_serializes_camel_case() {
        let stage = Stage { name: "qc".to_string(), stage_number: 2 };
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["stageNumber"], 2);
    }
}
