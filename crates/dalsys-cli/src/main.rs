mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, drone::DroneSubcommand, operator::OperatorSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dalsys",
    about = "Drone allocation and localisation: track drones, operators and who flies what",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .dalsys/)
    #[arg(long, global = true, env = "DALSYS_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config and database in the project root
    Init,

    /// Manage drones and their allocation
    Drone {
        #[command(subcommand)]
        subcommand: DroneSubcommand,
    },

    /// Manage operators
    Operator {
        #[command(subcommand)]
        subcommand: OperatorSubcommand,
    },

    /// Inspect the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Drone { subcommand } => cmd::drone::run(&root, subcommand, cli.json),
        Commands::Operator { subcommand } => cmd::operator::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
