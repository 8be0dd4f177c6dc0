use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fastapi_maker::config::Config;
use fastapi_maker::generators::entity::create_entity;
use fastapi_maker::generators::project::init_project;
use fastapi_maker::registry::list_entities;
use fastapi_maker::relation::executor::apply_relationship;
use fastapi_maker::relation::wizard::{DialoguerPrompter, Preset, RelationWizard, WizardOutcome};
use fastapi_maker::relation::{RelationType, Side};
use fastapi_maker::tools::lint::{LintMode, run_lint};
use fastapi_maker::tools::migration::run_migrations;
use fastapi_maker::tools::process::{CommandOutput, CommandSpec};

#[derive(Parser)]
#[command(name = "fam")]
#[command(about = "FastAPI Maker - scaffold FastAPI + SQLAlchemy projects and relate entities", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./fam.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the project skeleton in the current directory
    Init,

    /// Scaffold an entity and register it in main.py and alembic/env.py
    Create {
        /// Entity name, snake_case
        name: String,
    },

    /// Add a relationship between two existing entities
    Relation(RelationArgs),

    /// Autogenerate an alembic revision and upgrade to head
    Migrate {
        /// Revision message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run ruff over the project
    Lint(LintArgs),
}

#[derive(Args)]
struct RelationArgs {
    /// Origin entity
    #[arg(long)]
    origin: Option<String>,

    /// Target entity
    #[arg(long)]
    target: Option<String>,

    /// one-to-many, many-to-one, many-to-many or one-to-one
    #[arg(long)]
    kind: Option<RelationType>,

    /// Entity holding the foreign key of a one-to-one relationship
    #[arg(long)]
    fk_side: Option<Side>,

    /// Apply without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
#[group(multiple = false)]
struct LintArgs {
    /// Report problems only
    #[arg(long)]
    check: bool,

    /// Apply safe fixes
    #[arg(long)]
    fix: bool,

    /// Format only
    #[arg(long)]
    format: bool,

    /// Fix, then format
    #[arg(long)]
    all: bool,
}

impl LintArgs {
    fn mode(&self) -> LintMode {
        match (self.check, self.fix, self.format, self.all) {
            (true, ..) => LintMode::Check,
            (_, true, ..) => LintMode::Fix,
            (_, _, true, _) => LintMode::Format,
            (.., true) => LintMode::All,
            _ => LintMode::Default,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project = std::env::current_dir().context("Failed to read the current directory")?;
    let config_path = Config::resolve_path(&project, cli.config.as_deref());

    match cli.command {
        Commands::Init => {
            let config = Config::load(&config_path).context("Failed to load configuration")?;
            let summary = init_project(&project, &config, &config_path)
                .context("Failed to initialize the project")?;
            for line in summary.render(&project) {
                println!("{line}");
            }
            println!("Project ready. Next: fam create <entity>");
        }

        Commands::Create { name } => {
            let config = Config::load(&config_path).context("Failed to load configuration")?;
            let report = create_entity(&project, &config, &name)
                .with_context(|| format!("Failed to create entity `{name}`"))?;
            for line in report.render(&project) {
                println!("{line}");
            }
        }

        Commands::Relation(args) => {
            let config = Config::load(&config_path).context("Failed to load configuration")?;
            relation(&project, &config, args)?;
        }

        Commands::Migrate { message } => {
            let config = Config::load_or_default(&config_path);
            run_migrations(&project, &config, message.as_deref(), &mut relay)
                .context("Migration failed")?;
        }

        Commands::Lint(args) => {
            let config = Config::load_or_default(&config_path);
            run_lint(&project, &config, args.mode(), &mut relay).context("Lint failed")?;
        }
    }

    Ok(())
}

fn relation(project: &Path, config: &Config, args: RelationArgs) -> Result<()> {
    let entities = list_entities(&config.entities_dir(project))?;
    let preset = Preset {
        origin: args.origin,
        target: args.target,
        kind: args.kind,
        fk_side: args.fk_side,
        assume_yes: args.yes,
    };

    let wizard = RelationWizard::new(&entities, preset, DialoguerPrompter::default())?;
    let outcome = wizard.run(|rel| apply_relationship(rel, config, project))?;

    match outcome {
        WizardOutcome::Cancelled => println!("Cancelled, no files were changed."),
        WizardOutcome::Done(report) if args.json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
        WizardOutcome::Done(report) => print!("{}", report.render(project)),
    }
    Ok(())
}

/// Pass a tool's output through untouched.
fn relay(_spec: &CommandSpec, output: &CommandOutput) {
    print!("{}", output.stdout);
    let _ = std::io::stdout().flush();
    eprint!("{}", output.stderr);
}
