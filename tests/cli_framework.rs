// CLI test framework
// Each ledger lives in its own temp HOME with an rc file pointing at a fresh database

use assert_cmd::Command;
use std::fs;
use tempfile::TempDir;

/// Workflow used by most CLI tests
pub const SHORT_WORKFLOW: &str = "workflow.short=entry_gate,weigh_bridge\n";

pub struct TestLedger {
    temp_dir: TempDir,
}

impl TestLedger {
    /// Ledger with only the built-in workflow
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Ledger with extra rc file lines
    pub fn with_config(extra: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config_dir = temp_dir.path().join(".truckflow");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("rc"),
            format!("data.location={}\n{}", db_path.display(), extra),
        )
        .unwrap();
        Self { temp_dir }
    }

    /// Ledger with the short workflow as default and a standard set of users:
    /// admin@yard (admin), gate@yard (entry_gate), scale@yard (weigh_bridge)
    pub fn yard() -> Self {
        let ledger = Self::with_config(&format!("{}workflow.default=short\n", SHORT_WORKFLOW));
        ledger.run_ok(&["users", "add", "admin@yard", "--name", "Admin", "--role", "admin"]);
        ledger.run_ok(&["users", "add", "gate@yard", "--name", "Gate", "--checkpoint", "entry_gate"]);
        ledger.run_ok(&["users", "add", "scale@yard", "--name", "Scale", "--checkpoint", "weigh_bridge"]);
        ledger
    }

    /// Get a command instance configured for this ledger
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("truckflow").unwrap();
        cmd.env("HOME", self.temp_dir.path());
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Run a command that must succeed and return its stdout
    pub fn run_ok(&self, args: &[&str]) -> String {
        let output = self.cmd().args(args).assert().success().get_output().stdout.clone();
        String::from_utf8(output).unwrap()
    }

    /// Parse the JSON printed by a command
    pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
        serde_json::from_str(&self.run_ok(args)).unwrap()
    }

    pub fn show(&self, tracking_number: &str) -> serde_json::Value {
        self.run_json(&["show", tracking_number, "--json"])
    }
}
