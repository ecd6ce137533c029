mod host;
mod modules;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patchkit::{Discovery, ModuleStatus, PatchRuntime, PatchkitConfig, UiKind};

/// Patchkit demo - a simulated editor with pluggable behavior overrides
#[derive(Parser)]
#[command(name = "patchkit-demo")]
#[command(about = "Simulated editor host for patchkit behavior modules")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the settings file location
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List modules by category
    List,
    /// Show one module in detail
    Describe { name: String },
    /// Enable a module and install its hooks
    Enable { name: String },
    /// Disable a module and remove its hooks
    Disable { name: String },
    /// Pick the option of a single-choice module
    Select { name: String, index: usize },
    /// Flip one option of a multi-choice module
    ToggleOption { name: String, index: usize },
    /// Global switch for all modules
    KillSwitch {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// Run a module's action button
    Action { name: String },
    /// Print every settings key in use
    Keys,
    /// Forget all persisted choices
    Reset,
    /// Render the sample scene through the engine (default)
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !Path::new(path).is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    let mut config = PatchkitConfig::load(cli.config.as_deref())?;
    if let Some(settings) = &cli.settings {
        config.settings_path = settings.to_string_lossy().into_owned();
    }
    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_owned(),
        _ => config.logging.level = "trace".to_owned(),
    }

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if !patchkit::telemetry::init_logging(&config.logging) {
        tracing::debug!("Subscriber already installed, keeping it");
    }

    let mut runtime = PatchRuntime::from_config(&config, Arc::new(host::catalog()), Discovery::Linked)?;
    let boot = runtime.boot();
    for failure in &boot.discovery_failures {
        eprintln!("warning: {failure}");
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::List => list(&runtime),
        Commands::Describe { name } => describe(&runtime, &name)?,
        Commands::Enable { name } => {
            runtime.registry_mut().apply(&name)?;
            println!("{name}: enabled");
        }
        Commands::Disable { name } => {
            runtime.registry_mut().remove(&name)?;
            println!("{name}: disabled");
        }
        Commands::Select { name, index } => {
            runtime.registry_mut().update_single_choice(&name, index)?;
            describe(&runtime, &name)?;
        }
        Commands::ToggleOption { name, index } => {
            runtime.registry_mut().toggle_option(&name, index)?;
            describe(&runtime, &name)?;
        }
        Commands::KillSwitch { state } => {
            let report = runtime.registry_mut().set_global_enabled(state == "on")?;
            for (module, err) in &report.failed {
                eprintln!("warning: {module}: {err}");
            }
            println!("all modules: {state}");
        }
        Commands::Action { name } => {
            if !runtime.registry().run_action(&name)? {
                println!("{name} has no action");
            }
        }
        Commands::Keys => {
            for key in runtime.registry().all_settings_keys() {
                println!("{key}");
            }
        }
        Commands::Reset => {
            runtime.registry_mut().reset_all()?;
            println!("all settings reset");
        }
        Commands::Run => {
            runtime.tick();
            let lines = host::render(runtime.engine(), &host::Scene::sample())
                .context("editor crashed while rendering")?;
            for line in lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn status_label(status: ModuleStatus) -> &'static str {
    match status {
        ModuleStatus::Active => "on",
        ModuleStatus::Inactive => "off",
        ModuleStatus::Unresolved => "unavailable",
    }
}

fn list(runtime: &PatchRuntime) {
    let registry = runtime.registry();
    let kill = if registry.global_enabled() { "" } else { " (kill-switch off)" };
    println!("Modules{kill}");
    for (category, names) in registry.list_by_category() {
        println!("{category}");
        for name in names {
            let status = registry.status(&name).map_or("?", status_label);
            println!("  {name:<20} {status}");
        }
    }
}

fn describe(runtime: &PatchRuntime, name: &str) -> Result<()> {
    let view = runtime
        .registry()
        .describe(name)
        .with_context(|| format!("unknown module '{name}'"))?;
    let d = &view.descriptor;
    println!("{} [{}] - {}", d.name, d.category, status_label(view.status));
    if !d.description.is_empty() {
        println!("  {}", d.description);
    }
    if let Some(target) = &view.target {
        println!("  target: {target} ({} hooks)", view.hooks);
    }
    match d.ui {
        UiKind::Binary => {}
        UiKind::SingleChoice | UiKind::MultiChoice => {
            for (i, option) in d.options.iter().enumerate() {
                let mark = if view.config.is_selected(i) { "x" } else { " " };
                println!("  [{mark}] {i}: {option}");
            }
        }
    }
    if let Some(action) = &d.action {
        println!("  action: {}", action.label);
    }
    if let Some(err) = &view.last_error {
        println!("  last error: {err}");
    }
    Ok(())
}
