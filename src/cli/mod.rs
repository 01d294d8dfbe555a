pub mod daemon_path;
pub mod export;
pub mod process;
pub mod report;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use export::{process_export_command, ExportCommand};
use process::{kill_previous_daemons, restart_daemon};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{config::TrackerConfig, start_daemon},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

use daemon_path::to_daemon_path;

#[derive(Parser, Debug)]
#[command(name = "Idletrack", version, long_about = None)]
#[command(about = "Tracker of daily active and idle time", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Show tracked active/idle totals for a day")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Export the session log to CSV")]
    Export {
        #[command(flatten)]
        command: ExportCommand,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init {} => {
            restart_daemon()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe().expect("Can't operate without an executable");
            kill_previous_daemons(&to_daemon_path(process_name));
            Ok(())
        }
        Commands::Serve { dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            let config = TrackerConfig::load_or_default(&app_dir)?;
            start_daemon(app_dir, config).await?;
            Ok(())
        }
        Commands::Report { command } => process_report_command(command).await,
        Commands::Export { command } => process_export_command(command).await,
    }
}
