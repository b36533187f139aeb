use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groundwiki::cli::CommandContext;
use groundwiki::cli::commands::{self, bootstrap::BootstrapOptions, update::UpdateOptions};

#[derive(Parser)]
#[command(name = "groundwiki")]
#[command(
    version,
    about = "Evidence-grounded documentation generator driven by structured LLM output"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra TOML config file, merged over global and project config
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the initial documentation tree for a local checkout
    Bootstrap {
        #[arg(long, default_value = ".", help = "Repository checkout to document")]
        repo_dir: PathBuf,
        #[arg(long, help = "Commit the checkout is at (shown in the repo context)")]
        head: Option<String>,
        #[arg(long, help = "Directory whose modules each get an API page (relative to repo)")]
        api_dir: Option<String>,
    },

    /// Update the docs for one commit
    Update {
        #[arg(long, short, conflicts_with = "message_file", help = "Commit message")]
        message: Option<String>,
        #[arg(long, help = "File holding the commit message")]
        message_file: Option<PathBuf>,
        #[arg(long, short, help = "File holding the unified diff")]
        diff_file: PathBuf,
        #[arg(long, help = "Skip the path filter and relevance gate")]
        force: bool,
    },

    /// Print directory chunks without calling the model
    Chunk {
        #[arg(long, default_value = ".", help = "Repository checkout")]
        repo_dir: PathBuf,
        #[arg(long, help = "Only this directory (relative to repo)")]
        dir: Option<String>,
    },

    /// Check connectivity to the configured endpoint
    Ping,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mGroundWiki encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Bootstrap {
            repo_dir,
            head,
            api_dir,
        } => {
            let ctx = CommandContext::load(config_path)?;
            commands::bootstrap::run(
                ctx,
                BootstrapOptions {
                    repo_dir,
                    head,
                    api_dir,
                },
            )?;
        }
        Commands::Update {
            message,
            message_file,
            diff_file,
            force,
        } => {
            let ctx = CommandContext::load(config_path)?;
            commands::update::run(
                ctx,
                UpdateOptions {
                    message,
                    message_file,
                    diff_file,
                    force,
                },
            )?;
        }
        Commands::Chunk { repo_dir, dir } => {
            let ctx = CommandContext::load(config_path)?;
            commands::chunk::run(ctx, &repo_dir, dir.as_deref())?;
        }
        Commands::Ping => {
            let ctx = CommandContext::load(config_path)?;
            commands::ping::run(ctx)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                let ctx = CommandContext::load(config_path)?;
                commands::config::show(&ctx, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project()?;
                }
            }
        },
    }

    Ok(())
}
