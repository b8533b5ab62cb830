use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use config::{FileConfig, Overrides, Settings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use svc_aggregator::Aggregator;
use svc_auditor::{write_markdown, write_report, Auditor};
use svc_facts::{Catalog, ContactFacts, Period, ProvidedService, Scope, Synchronizer};
use svc_store::{Amendment, ContactId, ContactWriter, JsonFileStore};

mod config;
mod output;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "svc-facts")]
#[command(about = "Keep contact service lists, flags and monthly summaries consistent", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: ./svc-facts.toml when present)
    #[arg(long, global = true, env = "SVC_FACTS_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory holding contacts.json and monthly_summary.json
    #[arg(long, global = true, env = "SVC_FACTS_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new contact from JSON (file or stdin)
    Record(RecordArgs),

    /// Replace a contact's requested and/or provided lists from JSON
    Amend(AmendArgs),

    /// Mark a service as provided on an existing contact
    Provide(ProvideArgs),

    /// Re-derive flags for every contact from its lists
    Resync(JsonArgs),

    /// Recompute the monthly summary table
    Aggregate(AggregateArgs),

    /// Audit lists, flags and the summary table for discrepancies
    Audit(AuditArgs),

    /// Print the service catalog
    Catalog(JsonArgs),
}

#[derive(Args)]
struct JsonArgs {
    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct RecordArgs {
    /// Path to a contact JSON document (reads stdin when omitted)
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct AmendArgs {
    /// Contact id
    id: ContactId,

    /// Path to an amendment JSON document (reads stdin when omitted)
    #[arg(long)]
    file: Option<PathBuf>,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct ProvideArgs {
    /// Contact id
    id: ContactId,

    /// Service name as written in the catalog
    service: String,

    /// Who provided the service
    #[arg(long)]
    provider: Option<String>,

    /// RFC 3339 completion timestamp
    #[arg(long)]
    completed_at: Option<DateTime<Utc>>,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct AggregateArgs {
    /// Year of the single period to aggregate (requires --month)
    #[arg(long, requires = "month", conflicts_with_all = ["period", "history"])]
    year: Option<i32>,

    /// Month of the single period to aggregate (requires --year)
    #[arg(long, requires = "year")]
    month: Option<u32>,

    /// Single period as YYYY-MM
    #[arg(long, conflicts_with = "history")]
    period: Option<Period>,

    /// Aggregate every month from the earliest to the latest contact
    #[arg(long)]
    history: bool,

    /// With --history: print the planned months without writing
    #[arg(long, requires = "history")]
    dry_run: bool,

    #[command(flatten)]
    output: JsonArgs,
}

#[derive(Args)]
struct AuditArgs {
    /// Directory for the JSON report (overrides [audit] report_dir)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write a Markdown rendering next to the JSON report
    #[arg(long)]
    markdown: bool,

    #[command(flatten)]
    output: JsonArgs,
}

/// Amendment document accepted by `amend`; absent lists are left untouched
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AmendPayload {
    #[serde(default, rename = "requested_services", alias = "requested")]
    requested: Option<Vec<String>>,

    #[serde(default, rename = "provided_services", alias = "provided")]
    provided: Option<Vec<ProvidedService>>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let (file_config, origin) = FileConfig::load(cli.config.as_deref())?;
    let audit_overrides = match &cli.command {
        Commands::Audit(args) => (args.out.clone(), args.markdown),
        _ => (None, false),
    };
    let settings = file_config.resolve(
        origin.as_deref(),
        Overrides {
            data_dir: cli.data_dir.clone(),
            report_dir: audit_overrides.0,
            markdown: audit_overrides.1,
        },
    );
    log::debug!("Using data dir {}", settings.data_dir.display());

    match cli.command {
        Commands::Record(args) => run_record(args, &settings).await?,
        Commands::Amend(args) => run_amend(args, &settings).await?,
        Commands::Provide(args) => run_provide(args, &settings).await?,
        Commands::Resync(args) => run_resync(args, &settings).await?,
        Commands::Aggregate(args) => run_aggregate(args, &settings).await?,
        Commands::Audit(args) => run_audit(args, &settings).await?,
        Commands::Catalog(args) => run_catalog(&args)?,
    }
    Ok(())
}

async fn open_store(settings: &Settings) -> Result<JsonFileStore> {
    JsonFileStore::open(&settings.data_dir)
        .await
        .with_context(|| format!("Failed to open store at {}", settings.data_dir.display()))
}

fn read_document(file: Option<&PathBuf>, what: &str) -> Result<String> {
    if let Some(path) = file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read {what} from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .with_context(|| format!("Failed to read {what} from stdin"))?;

    if buffer.trim().is_empty() {
        anyhow::bail!("The {what} is empty. Provide --file or pipe JSON via stdin.");
    }
    Ok(buffer)
}

async fn run_record(args: RecordArgs, settings: &Settings) -> Result<()> {
    let raw = read_document(args.file.as_ref(), "contact")?;
    let facts: ContactFacts = serde_json::from_str(&raw).context("Invalid contact JSON")?;

    let store = open_store(settings).await?;
    let sync = Synchronizer::default();
    let record = ContactWriter::new(&store, &sync)
        .record(facts)
        .await
        .context("Failed to record contact")?;
    print_json(&record)
}

async fn run_amend(args: AmendArgs, settings: &Settings) -> Result<()> {
    let raw = read_document(args.file.as_ref(), "amendment")?;
    let payload: AmendPayload = serde_json::from_str(&raw).context("Invalid amendment JSON")?;
    if payload.requested.is_none() && payload.provided.is_none() {
        anyhow::bail!("Amendment must contain requested_services and/or provided_services");
    }

    let store = open_store(settings).await?;
    let sync = Synchronizer::default();
    let outcome = ContactWriter::new(&store, &sync)
        .amend(
            args.id,
            Amendment {
                requested: payload.requested,
                provided: payload.provided,
            },
        )
        .await
        .with_context(|| format!("Failed to amend contact {}", args.id))?;

    if args.output.json {
        print_json(&outcome)
    } else {
        print_stdout(&output::render_amend(&outcome))
    }
}

async fn run_provide(args: ProvideArgs, settings: &Settings) -> Result<()> {
    let mut service = ProvidedService::new(args.service);
    if let Some(provider) = args.provider {
        service = service.provider(provider);
    }
    if let Some(at) = args.completed_at {
        service = service.completed_at(at);
    }

    let store = open_store(settings).await?;
    let sync = Synchronizer::default();
    let outcome = ContactWriter::new(&store, &sync)
        .mark_provided(args.id, service)
        .await
        .with_context(|| format!("Failed to update contact {}", args.id))?;

    if args.output.json {
        print_json(&outcome)
    } else {
        print_stdout(&output::render_amend(&outcome))
    }
}

async fn run_resync(args: JsonArgs, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    let sync = Synchronizer::default();
    let summary = ContactWriter::new(&store, &sync)
        .resync_all()
        .await
        .context("Re-synchronization failed")?;

    if args.json {
        print_json(&summary)
    } else {
        print_stdout(&output::render_resync(&summary))
    }
}

fn scope_from_args(args: &AggregateArgs) -> Result<Scope> {
    if let (Some(year), Some(month)) = (args.year, args.month) {
        return Ok(Scope::Period(Period::new(year, month)?));
    }
    Ok(Scope::from(args.period))
}

async fn run_aggregate(args: AggregateArgs, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    let catalog = Catalog::standard();
    let aggregator = Aggregator::new(&store, &catalog);

    if args.history {
        if args.dry_run {
            let plan = aggregator.plan_history().await?;
            return if args.output.json {
                print_json(&plan)
            } else {
                print_stdout(&output::render_plan(&plan))
            };
        }

        let history = aggregator.run_history().await?;
        if args.output.json {
            print_json(&history)?;
        } else {
            print_stdout(&output::render_history(&history))?;
        }
        if history.is_partial() {
            anyhow::bail!(
                "Historical sweep partially failed: {} month(s) failed",
                history.failed_months
            );
        }
        return Ok(());
    }

    let scope = scope_from_args(&args)?;
    let summary = aggregator.aggregate(scope).await?;
    if args.output.json {
        print_json(&summary)?;
    } else {
        print_stdout(&output::render_aggregate(&summary))?;
    }
    if summary.is_partial() {
        anyhow::bail!(
            "Aggregation of {} partially failed: {} service(s) not written",
            summary.scope,
            summary.failures.len()
        );
    }
    Ok(())
}

async fn run_audit(args: AuditArgs, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;
    let catalog = Catalog::standard();
    let report = Auditor::new(&store, &catalog)
        .audit()
        .await
        .context("Audit failed; no report written")?;

    let path = write_report(&report, &settings.report_dir).await?;
    if settings.markdown {
        write_markdown(&report, &path)
            .await
            .context("Failed to write Markdown report")?;
    }

    if args.output.json {
        print_json(&report)
    } else {
        print_stdout(&format!(
            "{}\nReport: {}",
            output::render_audit(&report),
            path.display()
        ))
    }
}

fn run_catalog(args: &JsonArgs) -> Result<()> {
    let catalog = Catalog::standard();
    if args.json {
        print_json(&catalog.all())
    } else {
        print_stdout(&output::render_catalog(&catalog))
    }
}
