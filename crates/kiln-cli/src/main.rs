//! Kiln CLI - validate dataset recipes against the registered pipeline steps

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_recipe::{load_document, OutputMode, RecipeSchema};
use kiln_registry::{load_manifest, StaticRegistry, StepCategory, StepRegistry};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Validate dataset recipes against the registered pipeline steps")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Registry manifest listing sources and filters (overrides KILN_REGISTRY)
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a recipe file
    Validate {
        /// Path to the recipe (JSON or YAML)
        recipe: PathBuf,

        /// Print the composed schema instead of the normalized recipe
        #[arg(long)]
        schema: bool,
    },

    /// Print the recipe schema composed from the registry
    Schema,

    /// List the registered sources and filters
    Steps,

    /// Print the dates a recipe covers
    Dates {
        /// Path to the recipe (JSON or YAML)
        recipe: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries validation output only.
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = CliConfig::from_env()?;
    if let Some(path) = cli.registry {
        config.registry_path = Some(path);
    }
    let registry = load_registry(&config)?;

    match cli.command {
        Commands::Validate { recipe, schema } => {
            validate_recipe_file(&registry, &config, &recipe, schema.into())?;
        }
        Commands::Schema => {
            print_schema(&registry, &config)?;
        }
        Commands::Steps => {
            list_steps(&registry)?;
        }
        Commands::Dates { recipe } => {
            show_dates(&registry, &config, &recipe)?;
        }
    }

    Ok(())
}

fn load_registry(config: &CliConfig) -> Result<StaticRegistry> {
    match &config.registry_path {
        Some(path) => {
            let registry = load_manifest(path)
                .with_context(|| format!("Failed to load registry {}", path.display()))?;
            info!("Loaded {} steps from {:?}", registry.len(), path);
            Ok(registry)
        }
        None => {
            warn!("No registry configured; recipes may not reference any step");
            Ok(StaticRegistry::new())
        }
    }
}

fn build_schema(registry: &StaticRegistry, config: &CliConfig) -> Result<RecipeSchema> {
    RecipeSchema::build(registry, config.schema_options())
        .context("Failed to compose the recipe schema from the registry")
}

fn validate_recipe_file(
    registry: &StaticRegistry,
    config: &CliConfig,
    path: &Path,
    mode: OutputMode,
) -> Result<()> {
    info!("Validating recipe: {:?}", path);

    let document = load_document(path)?;
    let schema = build_schema(registry, config)?;

    let stdout = std::io::stdout();
    let valid = schema.report(&document, mode, &mut stdout.lock())?;
    if !valid {
        anyhow::bail!("Recipe {} is invalid", path.display());
    }
    Ok(())
}

fn print_schema(registry: &StaticRegistry, config: &CliConfig) -> Result<()> {
    let schema = build_schema(registry, config)?;
    println!("{}", serde_json::to_string_pretty(schema.json_schema())?);
    Ok(())
}

fn list_steps(registry: &StaticRegistry) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for category in StepCategory::ALL {
        let steps = registry.function_schemas(category)?;
        writeln!(out, "{} ({}):", category, steps.len())?;
        for step in steps {
            let shape = if step.shape.is_some() { "" } else { " (any mapping)" };
            writeln!(out, "  - {}{}", step.name, shape)?;
        }
    }
    Ok(())
}

fn show_dates(registry: &StaticRegistry, config: &CliConfig, path: &Path) -> Result<()> {
    let document = load_document(path)?;
    let schema = build_schema(registry, config)?;
    let validated = schema
        .parse(&document)
        .map_err(|report| anyhow::anyhow!("Recipe {} is invalid:\n{}", path.display(), report))?;

    let dates = validated
        .recipe
        .dates
        .resolve()
        .with_context(|| format!("Cannot resolve the dates of {}", path.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for date in &dates {
        writeln!(out, "{date}")?;
    }
    info!("{} dates", dates.len());
    Ok(())
}
