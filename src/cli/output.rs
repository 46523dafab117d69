// Human-readable rendering of trucks, users, and reports

use chrono::{Local, TimeZone};
use crate::models::{AuditEvent, Truck, User};
use crate::stats::StageAverage;
use crate::tracker::StageTracker;

/// Format a UTC timestamp in local time, or "Pending" when absent
pub fn format_ts(ts: Option<i64>) -> String {
    match ts {
        Some(ts) => match Local.timestamp_opt(ts, 0).single() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => ts.to_string(),
        },
        None => "Pending".to_string(),
    }
}

/// Format duration for display (e.g., "2h30m", "45m", "15s")
pub fn format_duration_short(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Position and percentage, e.g. "3/8 (37%)"
pub fn format_progress(truck: &Truck) -> String {
    let percent = (StageTracker::progress_fraction(truck) * 100.0).floor() as u32;
    format!("{}/{} ({}%)", truck.current_stage, truck.terminal_stage(), percent)
}

fn status_label(truck: &Truck) -> &'static str {
    if truck.finished { "Completed" } else { "In Progress" }
}

/// Table of trucks
pub fn format_truck_table(trucks: &[&Truck]) -> String {
    if trucks.is_empty() {
        return "No trucks found.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("{:<20} {:<12} {:<14} {:<24}", "Tracking", "Status", "Progress", "Stage"));
    lines.push("-".repeat(72));
    for truck in trucks {
        lines.push(format!(
            "{:<20} {:<12} {:<14} {:<24}",
            truck.tracking_number,
            status_label(truck),
            format_progress(truck),
            StageTracker::active_stage_name(truck)
        ));
    }
    lines.join("\n")
}

/// Detailed view of one truck with per-stage timestamps
pub fn format_truck_detail(truck: &Truck) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Truck {}", truck.tracking_number));
    lines.push(format!("Status:   {}", status_label(truck)));
    lines.push(format!("Progress: {}", format_progress(truck)));
    lines.push(format!("Stage:    {}", StageTracker::active_stage_name(truck)));

    if !truck.details.is_empty() {
        lines.push(String::new());
        lines.push("Details:".to_string());
        let mut keys: Vec<&String> = truck.details.keys().collect();
        keys.sort();
        for key in keys {
            lines.push(format!("  {}: {}", key, truck.details[key]));
        }
    }

    lines.push(String::new());
    lines.push(format!("  {:<3} {:<24} {:<20} {:<20}", "#", "Checkpoint", "Start", "End"));
    let active = if truck.finished { None } else { Some(truck.active_index()) };
    for (idx, record) in truck.stages.iter().enumerate() {
        let marker = if active == Some(idx) { ">" } else if record.is_elapsed() { "*" } else { " " };
        lines.push(format!(
            "{} {:<3} {:<24} {:<20} {:<20}",
            marker,
            record.stage.stage_number,
            record.name(),
            format_ts(record.start),
            format_ts(record.end)
        ));
    }
    lines.join("\n")
}

/// Average dwell time per checkpoint
pub fn format_stage_averages(averages: &[StageAverage]) -> String {
    if averages.is_empty() {
        return "No checkpoint data.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("{:<24} {:<8} {:<10}", "Checkpoint", "Samples", "Average"));
    lines.push("-".repeat(44));
    for avg in averages {
        let average = avg
            .average_secs
            .map(|secs| format_duration_short(secs.round() as i64))
            .unwrap_or_else(|| "N/A".to_string());
        lines.push(format!("{:<24} {:<8} {:<10}", avg.stage, avg.samples, average));
    }
    lines.join("\n")
}

/// Table of users
pub fn format_user_table(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("{:<28} {:<20} {:<10} {}", "Identity", "Name", "Role", "Checkpoints"));
    lines.push("-".repeat(80));
    for user in users {
        let checkpoints = if user.is_admin() {
            "(all)".to_string()
        } else {
            user.assigned_checkpoints.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("{:<28} {:<20} {:<10} {}", user.identity, user.name, user.role.as_str(), checkpoints));
    }
    lines.join("\n")
}

/// Audit trail of one truck
pub fn format_event_log(events: &[AuditEvent]) -> String {
    if events.is_empty() {
        return "No events recorded.".to_string();
    }

    let mut lines = Vec::new();
    lines.push(format!("{:<20} {:<9} {:<24} {}", "Time", "Event", "Detail", "By"));
    lines.push("-".repeat(72));
    for event in events {
        lines.push(format!(
            "{:<20} {:<9} {:<24} {}",
            format_ts(Some(event.ts)),
            event.kind.as_str(),
            event.detail,
            event.actor
        ));
    }
    lines.join("\n")
}
