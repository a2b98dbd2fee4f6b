//! neurotrack - Companion CLI for the MLP training engine

use clap::Parser;
use neurotrack::cli::{
    cmd_eval, cmd_export, cmd_import, cmd_info, cmd_show, cmd_train, Cli, Commands,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neurotrack=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            container,
            group,
            config,
            method,
            samples,
            workdir,
            prefix,
            seed,
            force,
        } => {
            cmd_train(
                &container, &group, &method, &config, &samples, &workdir, &prefix, seed, force,
            )?;
        }
        Commands::Import {
            data,
            container,
            target,
            key,
        } => {
            cmd_import(&data, &container, &target, &key)?;
        }
        Commands::Export {
            container,
            output,
            key,
        } => {
            cmd_export(&container, &key, &output)?;
        }
        Commands::Info { container } => {
            cmd_info(&container)?;
        }
        Commands::Eval {
            container,
            group,
            samples,
        } => {
            cmd_eval(&container, &group, &samples)?;
        }
        Commands::Show { container, group } => {
            cmd_show(&container, &group)?;
        }
    }

    Ok(())
}
