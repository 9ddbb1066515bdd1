use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maestro_engine::{
  LogNotifier, Orchestrator, OrchestratorConfig, ProcessLaunch, StaticDirectory, ValidationReport,
};
use maestro_plugin::TaskPluginRegistry;
use maestro_store::{MemoryStore, SqliteStore, Store};
use maestro_template::Template;

/// Maestro - a workflow process orchestrator
#[derive(Parser)]
#[command(name = "maestro")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.maestro)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Emit logs as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a template file without storing it
  Validate {
    /// Path to the template file (JSON)
    template_file: PathBuf,
  },

  /// Validate a template and store it in the database
  Import {
    template_file: PathBuf,

    /// SQLite database (default: <data-dir>/maestro.db)
    #[arg(long)]
    database: Option<PathBuf>,
  },

  /// Start a process from a stored template
  Start {
    template_id: String,

    #[arg(long)]
    database: Option<PathBuf>,

    /// Who starts the process
    #[arg(long, default_value = "maestro")]
    initiator: String,
  },

  /// Run a template to completion in memory
  Run {
    template_file: PathBuf,

    /// Complete interactive tasks automatically instead of stopping at them
    #[arg(long)]
    auto_complete: bool,
  },

  /// Run the periodic advance pass until interrupted
  Orchestrate {
    #[arg(long)]
    database: Option<PathBuf>,

    /// Orchestrator configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// User and role directory file (JSON)
    #[arg(long)]
    directory: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.json);

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".maestro"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Validate { template_file }) => validate(&template_file),
    Some(Commands::Import {
      template_file,
      database,
    }) => rt.block_on(import(&template_file, &database_path(database, &data_dir))),
    Some(Commands::Start {
      template_id,
      database,
      initiator,
    }) => rt.block_on(start(
      &template_id,
      &initiator,
      &database_path(database, &data_dir),
    )),
    Some(Commands::Run {
      template_file,
      auto_complete,
    }) => rt.block_on(run(&template_file, auto_complete)),
    Some(Commands::Orchestrate {
      database,
      config,
      directory,
    }) => rt.block_on(orchestrate(
      &database_path(database, &data_dir),
      config.as_deref(),
      directory.as_deref(),
    )),
    None => {
      println!("maestro - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(json: bool) {
  let filter =
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
  let registry = tracing_subscriber::registry().with(filter);
  if json {
    registry
      .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
      .init();
  } else {
    registry
      .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
      .init();
  }
}

fn database_path(database: Option<PathBuf>, data_dir: &Path) -> PathBuf {
  database.unwrap_or_else(|| data_dir.join("maestro.db"))
}

fn load_template(path: &Path) -> Result<Template> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read template file: {}", path.display()))?;
  Template::from_json(&content)
    .with_context(|| format!("failed to parse template file: {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
  let Some(path) = path else {
    return Ok(OrchestratorConfig::default());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn load_directory(path: Option<&Path>) -> Result<StaticDirectory> {
  let Some(path) = path else {
    return Ok(StaticDirectory::new());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read directory file: {}", path.display()))?;
  StaticDirectory::from_json(&content)
    .with_context(|| format!("failed to parse directory file: {}", path.display()))
}

async fn open_store(database: &Path) -> Result<SqliteStore> {
  if let Some(parent) = database.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory: {}", parent.display()))?;
  }
  SqliteStore::open(database)
    .await
    .with_context(|| format!("failed to open database: {}", database.display()))
}

fn print_report(report: &ValidationReport) {
  for issue in &report.failures {
    eprintln!("failure: {}", issue);
  }
  for issue in &report.warnings {
    eprintln!("warning: {}", issue);
  }
}

fn validate(template_file: &Path) -> Result<()> {
  let template = load_template(template_file)?;
  let report = maestro_engine::validate(&template, &TaskPluginRegistry::with_builtins());
  print_report(&report);
  if !report.is_valid() {
    bail!("template '{}' is invalid", template.id);
  }
  eprintln!("Template '{}' is valid", template.id);
  Ok(())
}

async fn import(template_file: &Path, database: &Path) -> Result<()> {
  let template = load_template(template_file)?;
  let store = open_store(database).await?;
  let orchestrator = Orchestrator::new(Arc::new(store), TaskPluginRegistry::with_builtins());

  let template_id = template.id.clone();
  let report = orchestrator
    .save_template(template)
    .await
    .context("failed to store template")?;
  print_report(&report);
  eprintln!(
    "Imported template '{}' (validated: {})",
    template_id,
    report.is_valid()
  );
  Ok(())
}

async fn start(template_id: &str, initiator: &str, database: &Path) -> Result<()> {
  let store = open_store(database).await?;
  let orchestrator = Orchestrator::new(Arc::new(store), TaskPluginRegistry::with_builtins());

  match orchestrator
    .new_process(template_id, initiator)
    .await
    .context("failed to start process")?
  {
    ProcessLaunch::Started(process_id) => {
      println!("{}", process_id);
      Ok(())
    }
    ProcessLaunch::Rejected(report) => {
      print_report(&report);
      bail!("template '{}' is not validated", template_id)
    }
  }
}

async fn run(template_file: &Path, auto_complete: bool) -> Result<()> {
  let template = load_template(template_file)?;
  let template_id = template.id.clone();
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let orchestrator = Orchestrator::new(store, TaskPluginRegistry::with_builtins())
    .with_notifier(Arc::new(LogNotifier));

  let report = orchestrator.save_template(template).await?;
  print_report(&report);
  let process_id = match orchestrator.new_process(&template_id, "maestro").await? {
    ProcessLaunch::Started(process_id) => process_id,
    ProcessLaunch::Rejected(_) => bail!("template '{}' is invalid", template_id),
  };
  eprintln!("Started process {}", process_id);

  loop {
    let report = orchestrator.advance().await.context("advance pass failed")?;
    if report.has_fatal_errors() {
      bail!("process {} is stalled: {}", process_id, report.errors[0].source);
    }
    if !orchestrator.process(process_id).await?.is_running() {
      break;
    }
    if report.completed() > 0 {
      continue;
    }

    let waiting: Vec<_> = orchestrator
      .queue_entries(process_id)
      .await?
      .into_iter()
      .filter(|e| e.is_interactive && e.is_open())
      .collect();
    if waiting.is_empty() {
      bail!("process {} made no progress", process_id);
    }
    if !auto_complete {
      for entry in &waiting {
        eprintln!("Waiting on interactive task '{}' ({})", entry.task_id, entry.id);
      }
      break;
    }
    for entry in waiting {
      orchestrator.complete_task(entry.id, "maestro").await?;
      eprintln!("Completed interactive task '{}'", entry.task_id);
    }
  }

  let process = orchestrator.process(process_id).await?;
  let entries = orchestrator.queue_entries(process_id).await?;
  let variables = orchestrator.process_variables(process_id).await?;
  let output = serde_json::json!({
    "process": process,
    "queue": entries,
    "variables": variables,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn orchestrate(
  database: &Path,
  config: Option<&Path>,
  directory: Option<&Path>,
) -> Result<()> {
  let config = load_config(config)?;
  let directory = load_directory(directory)?;
  let store = open_store(database).await?;

  let orchestrator = Orchestrator::new(Arc::new(store), TaskPluginRegistry::with_builtins())
    .with_identities(Arc::new(directory))
    .with_notifier(Arc::new(LogNotifier))
    .with_config(config);
  tracing::info!(database = %database.display(), "database_opened");

  let cancel = CancellationToken::new();
  let shutdown = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      shutdown.cancel();
    }
  });

  orchestrator.run(cancel).await;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_config_uses_defaults() {
    assert_eq!(load_config(None).unwrap(), OrchestratorConfig::default());
  }

  #[test]
  fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "send_reminders": false, "advance_interval_secs": 5 }"#).unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert!(!config.send_reminders);
    assert!(config.send_escalations);
    assert_eq!(config.advance_interval_secs, 5);
  }

  #[test]
  fn test_unreadable_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
  }

  #[test]
  fn test_directory_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("directory.json");
    std::fs::write(
      &path,
      r#"{ "users": [{ "name": "alice" }], "roles": { "managers": ["alice"] } }"#,
    )
    .unwrap();

    let directory = load_directory(Some(&path)).unwrap();
    assert_eq!(directory.users[0].name, "alice");
    assert!(directory.roles["managers"].contains("alice"));
  }

  #[test]
  fn test_database_defaults_to_data_dir() {
    let data_dir = PathBuf::from("/tmp/maestro");
    assert_eq!(database_path(None, &data_dir), data_dir.join("maestro.db"));
    assert_eq!(
      database_path(Some(PathBuf::from("other.db")), &data_dir),
      PathBuf::from("other.db")
    );
  }
}
