mod config;
mod config_cmds;
mod generate_cmd;
mod init_cmd;
mod serve_cmd;
mod status_cmd;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};

use stepgen_core::StepId;

use config::CliOverrides;
use generate_cmd::GenerateOptions;
use serve_cmd::{AppState, ModelSource};

#[derive(Parser)]
#[command(
    name = "stepgen",
    version,
    about = "Scaffold a multi-step project with an LLM, one step at a time"
)]
struct Cli {
    /// Model provider: claude, gemini, codex, or custom (overrides STEPGEN_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name passed to the provider (overrides STEPGEN_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Project root (overrides STEPGEN_PROJECT_ROOT; defaults to the current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .stepgen/ with step templates customized for a problem
    Init {
        /// High-level description of what to build
        problem: String,
        /// Directory of source templates (defaults to ./spec if present)
        #[arg(long)]
        template_dir: Option<PathBuf>,
        /// Replace an existing .stepgen/ directory
        #[arg(long)]
        force: bool,
    },
    /// Generate the plan for a step and act on its file actions
    Generate {
        /// Step to generate, e.g. step3 (defaults to the step after the current one)
        step: Option<StepId>,
        /// Write new files to disk (otherwise every action is flagged for review)
        #[arg(long)]
        apply: bool,
        /// Print the full plan text
        #[arg(long)]
        show_plan: bool,
        /// Print the content of flagged actions
        #[arg(long)]
        show_content: bool,
    },
    /// Show which steps have templates and outputs
    Status,
    /// Read and change project configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Serve step status, outputs, and generation over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Print a shell completion script
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show every config value
    List,
    /// Show one config value
    Get { key: String },
    /// Change a config value (`none` removes it)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let layout = config::resolve_layout(cli.project_root.as_deref());
    let overrides = CliOverrides {
        provider: cli.provider,
        model: cli.model,
    };

    match cli.command {
        Commands::Init {
            problem,
            template_dir,
            force,
        } => {
            let user = config::load_user_config();
            let spec = config::resolve_model_spec(None, user.as_ref().and_then(|u| u.model.as_ref()), &overrides);
            init_cmd::run_init(&layout, &problem, template_dir.as_deref(), force, spec).await?;
        }
        Commands::Generate {
            step,
            apply,
            show_plan,
            show_content,
        } => {
            let options = GenerateOptions {
                apply,
                show_plan,
                show_content,
            };
            generate_cmd::run_generate(&layout, step, options, &overrides).await?;
        }
        Commands::Status => {
            status_cmd::run_status(&layout)?;
        }
        Commands::Config { command } => {
            config_cmds::run_config_command(command, &layout)?;
        }
        Commands::Serve { host, port } => {
            config::load_config(&layout)?;
            let state = AppState::new(layout, ModelSource::Configured(overrides));
            serve_cmd::run_serve(state, &host, port).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "stepgen", &mut std::io::stdout());
        }
    }

    Ok(())
}
