use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use plugins_core::config::DISCOVERY_URL;
use plugins_core::{Error, Paths, PluginManager};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod plugins;
mod skills;
mod ui;

use plugins::ConfigCommands;
use skills::SkillsCommands;

#[derive(Parser)]
#[command(name = "claude-plugins")]
#[command(version, about = "Install and manage Claude Code plugins and agent skills", long_about = None)]
struct Cli {
    /// Log core operations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, fetch and enable a plugin or marketplace
    Install { identifier: String },
    /// Re-enable an installed plugin
    Enable { name: String },
    /// Disable a plugin, cleaning up the local marketplace when it empties
    Disable {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete a plugin from settings, its marketplace and the cache
    Remove {
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List installed plugins by marketplace
    List,
    /// List known marketplaces
    Marketplaces,
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage agent skills
    Skills {
        #[command(subcommand)]
        command: SkillsCommands,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("plugins_core=debug,claude_plugins=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

async fn run(command: Commands) -> Result<()> {
    let paths = Paths::discover();
    tracing::debug!(root = %paths.root().display(), "using config directory");

    match command {
        Commands::Skills { command } => skills::handle_command(&paths, command).await,
        command => {
            let manager = PluginManager::connect(paths).await?;
            run_plugin_command(&manager, command).await
        }
    }
}

async fn run_plugin_command(manager: &PluginManager, command: Commands) -> Result<()> {
    match command {
        Commands::Install { identifier } => plugins::install(manager, &identifier).await,
        Commands::Enable { name } => plugins::enable(manager, &name).await,
        Commands::Disable { name, yes } => plugins::disable(manager, &name, yes).await,
        Commands::Remove { name, yes } => plugins::remove(manager, &name, yes).await,
        Commands::List => plugins::list(manager).await,
        Commands::Marketplaces => plugins::marketplaces(manager).await,
        Commands::Config { command } => plugins::configure(manager, command).await,
        Commands::Skills { command } => skills::handle_command(manager.paths(), command).await,
    }
}

fn report_error(err: &anyhow::Error, skills: bool) {
    eprintln!("{} {}", style("✗").red().bold(), err);
    for cause in err.chain().skip(1) {
        eprintln!("  {} {}", style("caused by:").dim(), cause);
    }

    let unresolved = err
        .chain()
        .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_resolution));
    if unresolved {
        let url = if skills {
            format!("{DISCOVERY_URL}/skills")
        } else {
            DISCOVERY_URL.to_string()
        };
        eprintln!();
        eprintln!("  Not found in the registry. Visit {} to discover what is available.", style(url).cyan());
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let skills = matches!(cli.command, Commands::Skills { .. });
    if let Err(err) = run(cli.command).await {
        report_error(&err, skills);
        std::process::exit(1);
    }
}
