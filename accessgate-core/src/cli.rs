//! Operator CLI (ambient, §6/§10): configuration validation, a dry-run
//! routing check, and a local hot-swap demo — no network listener, no
//! connection pooling UI, nothing from the out-of-scope hosting surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use accessgate_config::{ElementClass, OperationKind};

#[derive(Parser, Debug)]
#[command(name = "accessgate", version)]
pub struct Cli {
    /// Path to the shard configuration TOML file.
    #[arg(short, long, default_value = "accessgate.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Validate a shard configuration document without installing it.
    Configcheck,

    /// Dry-run a routing decision: which shard would own this value?
    ShowRouting {
        class: CliElementClass,
        kind: CliOperationKind,
        value: String,
    },

    /// Load a configuration document and hot-swap it in as the active
    /// configuration for this process.
    Refresh {
        /// Path to the replacement configuration document.
        path: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CliElementClass {
    User,
    Group,
    GroupToGroupMapping,
    Entity,
}

impl From<CliElementClass> for ElementClass {
    fn from(value: CliElementClass) -> Self {
        match value {
            CliElementClass::User => ElementClass::User,
            CliElementClass::Group => ElementClass::Group,
            CliElementClass::GroupToGroupMapping => ElementClass::GroupToGroupMapping,
            CliElementClass::Entity => ElementClass::Entity,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum CliOperationKind {
    Event,
    Query,
}

impl From<CliOperationKind> for OperationKind {
    fn from(value: CliOperationKind) -> Self {
        match value {
            CliOperationKind::Event => OperationKind::Event,
            CliOperationKind::Query => OperationKind::Query,
        }
    }
}
