use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::collections::HashMap;
use anyhow::{Context, Result};
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{Role, User};
use crate::repo::{ConfigCatalog, EventRepo, StoreError, TruckRepo, UserRepo, WorkflowCatalog};
use crate::service::TrackingService;
use crate::stats::{average_dwell_times, filter_trucks};
use crate::tracker::StageTracker;
use crate::cli::error::{user_error, validate_checkpoint, validate_identity, validate_tracking_number, parse_detail};
use crate::cli::output::{
    format_event_log, format_stage_averages, format_truck_detail, format_truck_table, format_user_table,
};

#[derive(Parser)]
#[command(name = "truckflow")]
#[command(about = "Truck checkpoint tracker - records trucks moving through gate, weigh bridge and inspection stages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new truck
    Add {
        /// Unique tracking number
        tracking_number: String,
        /// Workflow to apply (defaults to workflow.default or the built-in checkpoints)
        #[arg(long)]
        workflow: Option<String>,
        /// Truck details as key=value pairs (e.g., "driver=Sam plate=KA01")
        #[arg(trailing_var_arg = true)]
        details: Vec<String>,
    },
    /// Record the start of the truck's current stage
    Start {
        tracking_number: String,
        /// Stage (checkpoint) name
        stage: String,
        /// Identity of the acting user
        #[arg(long)]
        user: String,
    },
    /// Record the end of the truck's current stage
    End {
        tracking_number: String,
        /// Stage (checkpoint) name
        stage: String,
        /// Identity of the acting user
        #[arg(long)]
        user: String,
    },
    /// Mark a truck finished (or unfinished with --undo); admin only
    Finish {
        tracking_number: String,
        /// Identity of the acting user
        #[arg(long)]
        user: String,
        /// Clear the finished flag instead of setting it
        #[arg(long)]
        undo: bool,
    },
    /// List trucks
    List {
        /// Show finished trucks instead of trucks in progress
        #[arg(long, conflicts_with = "all")]
        finished: bool,
        /// Show trucks regardless of status
        #[arg(long)]
        all: bool,
        /// Case-insensitive tracking number search
        #[arg(long)]
        search: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show a truck with its stage timestamps
    Show {
        tracking_number: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Average time spent at each checkpoint
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show the audit trail of a truck
    Log {
        tracking_number: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// User management commands
    Users {
        #[command(subcommand)]
        subcommand: UserCommands,
    },
    /// Workflow catalog commands
    Workflows {
        #[command(subcommand)]
        subcommand: WorkflowCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Add {
        /// Identity (e.g., email address)
        identity: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Role: admin or operator
        #[arg(long, default_value = "operator")]
        role: String,
        /// Checkpoint assigned to an operator (repeatable)
        #[arg(long = "checkpoint")]
        checkpoints: Vec<String>,
    },
    /// List users
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// List configured workflows
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

/// Configuration and an open ledger database
struct Ledger {
    config: Config,
    conn: Connection,
    catalog: ConfigCatalog,
}

impl Ledger {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let conn = DbConnection::connect(&config)
            .context("Failed to connect to database")?;
        let catalog = ConfigCatalog::from_config(&config);
        Ok(Self { config, conn, catalog })
    }

    fn repos(&self) -> Repos<'_> {
        Repos {
            trucks: TruckRepo::new(&self.conn),
            users: UserRepo::new(&self.conn),
            events: EventRepo::new(&self.conn),
        }
    }
}

/// Repositories over one ledger connection
struct Repos<'c> {
    trucks: TruckRepo<'c>,
    users: UserRepo<'c>,
    events: EventRepo<'c>,
}

type LedgerService<'a, 'c> = TrackingService<'a, TruckRepo<'c>, ConfigCatalog, UserRepo<'c>, EventRepo<'c>>;

impl<'c> Repos<'c> {
    fn service<'a>(&'a self, ledger: &'a Ledger) -> LedgerService<'a, 'c> {
        TrackingService::new(
            &self.trucks,
            &ledger.catalog,
            &self.users,
            &self.events,
            ledger.config.save_retries,
        )
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Add { tracking_number, workflow, details } => {
            handle_add(&tracking_number, workflow.as_deref(), &details)
        }
        Commands::Start { tracking_number, stage, user } => {
            handle_event(&tracking_number, &stage, true, &user)
        }
        Commands::End { tracking_number, stage, user } => {
            handle_event(&tracking_number, &stage, false, &user)
        }
        Commands::Finish { tracking_number, user, undo } => {
            handle_finish(&tracking_number, &user, !undo)
        }
        Commands::List { finished, all, search, json } => {
            let status = if all { None } else { Some(finished) };
            handle_list(status, search.as_deref(), json)
        }
        Commands::Show { tracking_number, json } => handle_show(&tracking_number, json),
        Commands::Stats { json } => handle_stats(json),
        Commands::Log { tracking_number, json } => handle_log(&tracking_number, json),
        Commands::Users { subcommand } => handle_users(subcommand),
        Commands::Workflows { subcommand } => handle_workflows(subcommand),
    }
}

fn handle_add(tracking_number: &str, workflow: Option<&str>, detail_args: &[String]) -> Result<()> {
    if let Err(e) = validate_tracking_number(tracking_number) {
        user_error(&e);
    }

    let mut details = HashMap::new();
    for arg in detail_args {
        match parse_detail(arg) {
            Ok((key, value)) => {
                details.insert(key, value);
            }
            Err(e) => user_error(&e),
        }
    }

    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let truck = repos.service(&ledger).create_truck(tracking_number, details, workflow)?;

    let workflow = workflow.unwrap_or_else(|| ledger.catalog.default_workflow());
    println!(
        "Added truck {} ({} stages, workflow '{}')",
        truck.tracking_number,
        truck.stages.len(),
        workflow
    );
    Ok(())
}

fn handle_event(tracking_number: &str, stage: &str, is_start: bool, identity: &str) -> Result<()> {
    if let Err(e) = validate_tracking_number(tracking_number) {
        user_error(&e);
    }
    if let Err(e) = validate_checkpoint(stage) {
        user_error(&e);
    }
    if let Err(e) = validate_identity(identity) {
        user_error(&e);
    }

    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let truck = repos.service(&ledger).record_event(tracking_number, stage, is_start, identity)?;

    let verb = if is_start { "Started" } else { "Ended" };
    println!(
        "{} {} for truck {} ({}/{})",
        verb,
        stage,
        truck.tracking_number,
        truck.current_stage,
        truck.terminal_stage()
    );
    if truck.finished {
        println!("Truck {} has completed all stages", truck.tracking_number);
    } else {
        println!("Next: {} {}", if truck.awaiting_start() { "start" } else { "end" }, StageTracker::active_stage_name(&truck));
    }
    Ok(())
}

fn handle_finish(tracking_number: &str, identity: &str, finished: bool) -> Result<()> {
    if let Err(e) = validate_identity(identity) {
        user_error(&e);
    }

    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let truck = repos.service(&ledger).set_finished(tracking_number, finished, identity)?;

    if truck.finished {
        println!("Marked truck {} finished", truck.tracking_number);
    } else {
        println!("Marked truck {} unfinished", truck.tracking_number);
    }
    Ok(())
}

fn handle_list(finished: Option<bool>, search: Option<&str>, json: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let trucks = repos.service(&ledger).trucks()
        .context("Failed to list trucks")?;
    let selected = filter_trucks(&trucks, finished, search);

    if json {
        let json_trucks: Vec<serde_json::Value> = selected.iter().map(|truck| {
            serde_json::json!({
                "trackingNumber": truck.tracking_number,
                "currentStage": truck.current_stage,
                "totalStages": truck.stages.len(),
                "finished": truck.finished,
                "progress": StageTracker::progress_fraction(truck),
                "activeStage": StageTracker::active_stage_name(truck),
            })
        }).collect();
        println!("{}", serde_json::to_string_pretty(&json_trucks)?);
    } else {
        println!("{}", format_truck_table(&selected));
    }
    Ok(())
}

fn handle_show(tracking_number: &str, json: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let truck = repos.service(&ledger).truck(tracking_number)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&truck)?);
    } else {
        println!("{}", format_truck_detail(&truck));
    }
    Ok(())
}

fn handle_stats(json: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    let trucks = repos.service(&ledger).trucks()?;
    let averages = average_dwell_times(&trucks);

    if json {
        println!("{}", serde_json::to_string_pretty(&averages)?);
    } else {
        println!("{}", format_stage_averages(&averages));
    }
    Ok(())
}

fn handle_log(tracking_number: &str, json: bool) -> Result<()> {
    let ledger = Ledger::open()?;
    let repos = ledger.repos();
    // Distinguish an unknown truck from one without events
    repos.service(&ledger).truck(tracking_number)?;
    let events = repos.events.list_for(tracking_number)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        println!("{}", format_event_log(&events));
    }
    Ok(())
}

fn handle_users(cmd: UserCommands) -> Result<()> {
    let ledger = Ledger::open()?;
    let repo = ledger.repos().users;

    match cmd {
        UserCommands::Add { identity, name, role, checkpoints } => {
            if let Err(e) = validate_identity(&identity) {
                user_error(&e);
            }
            let Some(role) = Role::from_str(&role) else {
                user_error(&format!("Invalid role: '{}'. Role must be 'admin' or 'operator'.", role));
            };
            for checkpoint in &checkpoints {
                if let Err(e) = validate_checkpoint(checkpoint) {
                    user_error(&e);
                }
            }
            if role == Role::Operator && checkpoints.is_empty() {
                log::warn!("Operator {} has no assigned checkpoints", identity);
            }

            let user = User::new(&identity, &name, role).with_checkpoints(checkpoints);
            match repo.create(&user) {
                Ok(()) => {}
                Err(StoreError::AlreadyExists { .. }) => {
                    user_error(&format!("User '{}' already exists", identity));
                }
                Err(e) => return Err(e).context("Failed to create user"),
            }

            println!("Created {} '{}'", user.role.as_str(), user.identity);
            Ok(())
        }
        UserCommands::List { json } => {
            let users = repo.list().context("Failed to list users")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                println!("{}", format_user_table(&users));
            }
            Ok(())
        }
    }
}

fn handle_workflows(cmd: WorkflowCommands) -> Result<()> {
    let config = Config::load()?;
    let catalog = ConfigCatalog::from_config(&config);

    match cmd {
        WorkflowCommands::List { json } => {
            if json {
                let json_workflows: Vec<serde_json::Value> = catalog.workflows().map(|(name, stages)| {
                    serde_json::json!({
                        "name": name,
                        "default": name == catalog.default_workflow(),
                        "stages": stages,
                    })
                }).collect();
                println!("{}", serde_json::to_string_pretty(&json_workflows)?);
            } else {
                for (name, stages) in catalog.workflows() {
                    let marker = if name == catalog.default_workflow() { " (default)" } else { "" };
                    println!("{}{}: {}", name, marker, stages.join(" -> "));
                }
            }
            Ok(())
        }
    }
}
