use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use accessgate_core::cli::{Cli, Commands};
use accessgate_core::hash::HashGenerator;

fn main() -> ExitCode {
    accessgate_core::logger::init();
    let cli = Cli::parse();

    let result = match cli.command.clone() {
        Commands::Configcheck => configcheck(&cli.config),
        Commands::ShowRouting { class, kind, value } => show_routing(&cli.config, class, kind, &value),
        Commands::Refresh { path } => refresh(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn configcheck(path: &std::path::Path) -> Result<(), accessgate_config::Error> {
    let shards = accessgate_config::load_path(path)?;
    for class in [
        accessgate_config::ElementClass::User,
        accessgate_config::ElementClass::Group,
        accessgate_config::ElementClass::GroupToGroupMapping,
        accessgate_config::ElementClass::Entity,
    ] {
        for kind in [
            accessgate_config::OperationKind::Event,
            accessgate_config::OperationKind::Query,
        ] {
            let count = shards.all_segments(class, kind).len();
            info!(%class, %kind, count, "routing group");
        }
    }
    println!("{}: configuration is valid", path.display());
    Ok(())
}

fn show_routing(
    path: &std::path::Path,
    class: accessgate_core::cli::CliElementClass,
    kind: accessgate_core::cli::CliOperationKind,
    value: &str,
) -> Result<(), accessgate_config::Error> {
    let shards = accessgate_config::load_path(path)?;
    let class: accessgate_config::ElementClass = class.into();
    let kind: accessgate_config::OperationKind = kind.into();
    let hashers = accessgate_core::Hashers::default();

    let hash = match class {
        accessgate_config::ElementClass::User => hashers.user.hash(value),
        accessgate_config::ElementClass::Group
        | accessgate_config::ElementClass::GroupToGroupMapping => hashers.group.hash(value),
        accessgate_config::ElementClass::Entity => {
            println!("Entity routing is unsharded; every shard of User/Group is fanned out to.");
            return Ok(());
        }
    };

    let owners = shards.lookup(class, kind, hash);
    if owners.is_empty() {
        println!("no shard configured for {class}/{kind}");
        return Ok(());
    }
    for segment in owners {
        println!(
            "{class}/{kind} hash={hash} -> {} ({})",
            segment.description, segment.endpoint_uri
        );
    }
    Ok(())
}

fn refresh(path: &std::path::Path) -> Result<(), accessgate_config::Error> {
    let config = accessgate_config::load(path)?;
    println!("installed {} as the active configuration", config.path.display());
    Ok(())
}
