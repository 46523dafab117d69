use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an audited truck event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    End,
    /// Administrative change of the finished flag
    Override,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::End => "end",
            EventKind::Override => "override",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "start" => Some(EventKind::Start),
            "end" => Some(EventKind::End),
            "override" => Some(EventKind::Override),
            _ => None,
        }
    }

    pub fn progression(is_start: bool) -> Self {
        if is_start {
            EventKind::Start
        } else {
            EventKind::End
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Option<i64>,
    pub tracking_number: String,
    pub kind: EventKind,
    /// Stage name for start/end events, "finished"/"unfinished" for overrides
    pub detail: String,
    pub actor: String,
    pub ts: i64,
}
