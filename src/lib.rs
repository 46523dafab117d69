//! Truckflow - truck checkpoint tracking
//!
//! This library provides the core functionality for Truckflow, including:
//! - The stage progression state machine (`tracker`)
//! - Data models for trucks, stages, users, and audit events
//! - SQLite-backed repositories and the rc-file workflow catalog
//! - The tracking service with optimistic-concurrency retries
//! - Checkpoint statistics and the command-line interface
//!
//! # Example
//!
//! ```no_run
//! use truckflow::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod config;
pub mod db;
pub mod models;
pub mod repo;
pub mod tracker;
pub mod service;
pub mod stats;
pub mod cli;
