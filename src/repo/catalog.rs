use std::collections::BTreeMap;
use crate::config::{Config, BUILTIN_WORKFLOW, DEFAULT_CHECKPOINTS};
use super::{StoreError, StoreResult, WorkflowCatalog};

/// Workflow catalog read from the rc file, always containing the built-in
/// checkpoint workflow unless the rc file redefines it
#[derive(Debug, Clone)]
pub struct ConfigCatalog {
    workflows: BTreeMap<String, Vec<String>>,
    default_workflow: String,
}

impl ConfigCatalog {
    pub fn from_config(config: &Config) -> Self {
        let mut workflows = config.workflows.clone();
        workflows
            .entry(BUILTIN_WORKFLOW.to_string())
            .or_insert_with(|| DEFAULT_CHECKPOINTS.iter().map(|s| s.to_string()).collect());

        Self {
            workflows,
            default_workflow: config
                .default_workflow
                .clone()
                .unwrap_or_else(|| BUILTIN_WORKFLOW.to_string()),
        }
    }

    /// All workflows ordered by name
    pub fn workflows(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.workflows.iter().map(|(name, stages)| (name.as_str(), stages.as_slice()))
    }
}

impl WorkflowCatalog for ConfigCatalog {
    fn get_stages(&self, workflow: &str) -> StoreResult<Vec<String>> {
        self.workflows
            .get(workflow)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Workflow", workflow))
    }

    fn default_workflow(&self) -> &str {
        &self.default_workflow
    }
}
