//! dfdrift CLI
//!
//! Validate a table file against the recorded history of a checkpoint,
//! compare two files ad hoc, or print what has been recorded.
//!
//! Backend flags take precedence over `DFDRIFT_*` environment variables,
//! `.env`, and `dfdrift.toml`.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dfdrift::{
    store, CheckpointId, CsvTable, DiffEngine, DriftDetector, JsonTable, SchemaSnapshot, Settings,
    SettingsOverrides, SnapshotStore, TableAdapter,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dfdrift", version, about = "Detect schema drift between pipeline runs")]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct BackendArgs {
    /// Directory holding the local history document
    #[arg(long, global = true)]
    storage_path: Option<String>,

    /// Keep history in this GCS bucket instead of a local file
    #[arg(long, global = true)]
    gcs_bucket: Option<String>,

    #[arg(long, global = true)]
    gcs_prefix: Option<String>,

    /// Storage API base URL, for emulators
    #[arg(long, global = true)]
    gcs_endpoint: Option<String>,

    #[arg(long, global = true)]
    gcs_access_token: Option<String>,

    #[arg(long, global = true)]
    slack_webhook_url: Option<String>,

    #[arg(long, global = true)]
    slack_bot_token: Option<String>,

    #[arg(long, global = true)]
    slack_channel: Option<String>,

    #[arg(long, global = true)]
    http_timeout_secs: Option<u64>,
}

impl From<BackendArgs> for SettingsOverrides {
    fn from(args: BackendArgs) -> Self {
        SettingsOverrides {
            storage_path: args.storage_path,
            gcs_bucket: args.gcs_bucket,
            gcs_prefix: args.gcs_prefix,
            gcs_endpoint: args.gcs_endpoint,
            gcs_access_token: args.gcs_access_token,
            slack_webhook_url: args.slack_webhook_url,
            slack_bot_token: args.slack_bot_token,
            slack_channel: args.slack_channel,
            http_timeout_secs: args.http_timeout_secs,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a table file under a checkpoint and record its snapshot
    Validate {
        #[arg(long, short, env = "DFDRIFT_CHECKPOINT")]
        checkpoint: String,

        #[arg(long, value_enum, default_value_t = Format::Auto)]
        format: Format,

        file: PathBuf,
    },

    /// Compare two table files without touching the history (exit 1 on drift)
    Diff {
        #[arg(long, value_enum, default_value_t = Format::Auto)]
        format: Format,

        /// Print the structured summary instead of the message
        #[arg(long)]
        json: bool,

        old: PathBuf,
        new: PathBuf,
    },

    /// Print recorded snapshots as JSON
    Show {
        #[arg(long, short)]
        checkpoint: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Pick from the file extension
    Auto,
    Csv,
    /// JSON array of records or NDJSON
    Json,
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let overrides = SettingsOverrides::from(cli.backend);

    match cli.command {
        Command::Validate {
            checkpoint,
            format,
            file,
        } => {
            let settings = Settings::load_with(overrides).context("loading configuration")?;
            let detector = DriftDetector::from_settings(&settings)?;
            let table = open_table(&file, format)?;

            let outcome = detector.validate_table(&CheckpointId::new(checkpoint), table.as_ref())?;
            println!("{}", serde_json::to_string(&outcome)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Diff {
            format,
            json,
            old,
            new,
        } => {
            let before = SchemaSnapshot::build(open_table(&old, format)?.as_ref())?;
            let after = SchemaSnapshot::build(open_table(&new, format)?.as_ref())?;
            let label = CheckpointId::new(format!("{} → {}", old.display(), new.display()));

            match DiffEngine::diff(&label, &before, &after) {
                None => {
                    info!(
                        "No drift: {} columns, fingerprint {}",
                        after.column_count(),
                        after.fingerprint()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Some(report) if json => {
                    println!("{}", serde_json::to_string_pretty(&report.summary())?);
                    Ok(ExitCode::from(1))
                }
                Some(report) => {
                    println!("{}", report);
                    Ok(ExitCode::from(1))
                }
            }
        }

        Command::Show { checkpoint } => {
            let settings = Settings::load_with(overrides).context("loading configuration")?;
            let store = store::from_settings(&settings)?;
            let history = store.fetch()?.unwrap_or_default();
            debug!("Read {} checkpoints from {}", history.len(), store.location());

            match checkpoint {
                None => println!("{}", history.to_json()?),
                Some(id) => {
                    let id = CheckpointId::new(id);
                    let Some(snapshot) = history.get(&id) else {
                        bail!("no snapshot recorded for '{}' at {}", id, store.location());
                    };
                    println!("{}", serde_json::to_string_pretty(snapshot)?);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_table(path: &Path, format: Format) -> anyhow::Result<Box<dyn TableAdapter>> {
    let format = match format {
        Format::Auto => match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Format::Csv,
            Some("json") | Some("jsonl") | Some("ndjson") => Format::Json,
            _ => bail!(
                "cannot tell the format of {} from its extension; pass --format",
                path.display()
            ),
        },
        explicit => explicit,
    };

    let table: Box<dyn TableAdapter> = match format {
        Format::Csv => Box::new(CsvTable::from_path(path)?),
        _ => Box::new(JsonTable::from_path(path)?),
    };
    Ok(table)
}

/// Initialize tracing with environment-based filtering
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dfdrift=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}
