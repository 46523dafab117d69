//! Storage collaborators of the stage tracker.
//!
//! The traits are the contracts the tracking service consumes; the structs
//! in the submodules implement them over SQLite and the rc file.

pub mod truck;
pub mod user;
pub mod event;
pub mod catalog;

pub use truck::*;
pub use user::*;
pub use event::*;
pub use catalog::*;

use crate::models::{EventKind, Truck, User};

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("Truck '{0}' was modified concurrently")]
    VersionConflict(String),
    #[error("Database error")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid stored data")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: &str) -> Self {
        StoreError::NotFound { kind, key: key.to_string() }
    }

    pub fn already_exists(kind: &'static str, key: &str) -> Self {
        StoreError::AlreadyExists { kind, key: key.to_string() }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persists truck records keyed by tracking number.
///
/// `save` is a compare-and-swap on `Truck::version`: it fails with
/// `VersionConflict` when the stored record changed since it was loaded,
/// and returns the record with its new version otherwise.
pub trait TruckStore {
    fn load(&self, tracking_number: &str) -> StoreResult<Truck>;
    fn exists(&self, tracking_number: &str) -> StoreResult<bool>;
    fn insert(&self, truck: &Truck) -> StoreResult<Truck>;
    fn save(&self, truck: &Truck) -> StoreResult<Truck>;
    fn list(&self) -> StoreResult<Vec<Truck>>;
}

/// Named, ordered stage lists applied to trucks at creation time
pub trait WorkflowCatalog {
    fn get_stages(&self, workflow: &str) -> StoreResult<Vec<String>>;
    /// Workflow used when the caller names none
    fn default_workflow(&self) -> &str;
}

/// Role and checkpoint assignments of users
pub trait UserDirectory {
    fn get_user(&self, identity: &str) -> StoreResult<User>;
}

/// Append-only record of applied events
pub trait AuditLog {
    fn append(
        &self,
        tracking_number: &str,
        kind: EventKind,
        detail: &str,
        actor: &str,
        ts: i64,
    ) -> StoreResult<()>;
}
