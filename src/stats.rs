// Read-only reporting over truck records

use crate::models::Truck;
use serde::Serialize;
use std::collections::HashMap;

/// Average time trucks spend at one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageAverage {
    pub stage: String,
    /// Stage records with both start and end recorded
    pub samples: usize,
    pub average_secs: Option<f64>,
}

/// Average dwell time per stage name, in order of first appearance.
/// Only records with both timestamps count as samples.
pub fn average_dwell_times(trucks: &[Truck]) -> Vec<StageAverage> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (i64, usize)> = HashMap::new();

    for truck in trucks {
        for record in &truck.stages {
            let entry = totals.entry(record.name().to_string()).or_insert_with(|| {
                order.push(record.name().to_string());
                (0, 0)
            });
            if let Some(secs) = record.dwell_secs() {
                entry.0 += secs;
                entry.1 += 1;
            }
        }
    }

    order
        .into_iter()
        .map(|stage| {
            let (total, samples) = totals.get(&stage).copied().unwrap_or((0, 0));
            let average_secs = if samples > 0 {
                Some(total as f64 / samples as f64)
            } else {
                None
            };
            StageAverage { stage, samples, average_secs }
        })
        .collect()
}

/// Trucks matching a finished flag (when given) whose tracking number
/// contains `search`, ignoring case
pub fn filter_trucks<'a>(trucks: &'a [Truck], finished: Option<bool>, search: Option<&str>) -> Vec<&'a Truck> {
    let needle = search.map(|s| s.to_lowercase());
    trucks
        .iter()
        .filter(|t| finished.map_or(true, |f| t.finished == f))
        .filter(|t| {
            needle
                .as_deref()
                .map_or(true, |n| t.tracking_number.to_lowercase().contains(n))
        })
        .collect()
}
