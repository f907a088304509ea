//! loadctl - Command-line interface for athlete load analytics
//!
//! Commands:
//! - normalize: Coerce raw risk points into canonical form
//! - summarize: Window averages over a local points file
//! - fetch: Fetch and summarize a remote risk series
//! - validate-csv: Check a raw-metrics file before upload
//! - import: Upload a raw-metrics file for a session
//! - export: Write psychoemotional answers as semicolon CSV
//! - metrics: List metric keys and their display rules

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use load_analytics::formatter::FormatRule;
use load_analytics::query::{parse_calendar_date, points_from_value};
use load_analytics::{
    AggregationEngine, AnalyticsError, AnswerRow, ClientConfig, CsvExportPipeline,
    CsvImportPipeline, FetchOutcome, HttpTransport, ImportFile, LoadAnalytics, MetricFormatter,
    MetricKey, MetricSelection, RiskPoint, TimeWindow, TimeWindowQuery, WindowSummary, VERSION,
};

/// loadctl - Training-load analytics from the command line
#[derive(Parser)]
#[command(name = "loadctl")]
#[command(version = VERSION)]
#[command(about = "Normalize, summarize and transcode training-load data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coerce raw risk points (array or {"points": [...]}) into canonical form
    Normalize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
    },

    /// Average selected metrics over a local points file
    Summarize {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Window start (YYYY-MM-DD); points outside the window are skipped
        #[arg(long, requires = "to")]
        from: Option<String>,

        /// Window end (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,

        /// Comma-separated metrics
        #[arg(long, default_value = "ca,cc,pctqwup,acwr,monotony,strain")]
        metrics: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch an athlete's risk series and summarize it
    Fetch {
        /// Athlete identifier
        #[arg(long)]
        athlete: String,

        /// Window start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Window end (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Comma-separated metrics
        #[arg(long, default_value = "ca,cc,pctqwup,acwr,monotony,strain")]
        metrics: String,

        /// Include the normalized points in the output
        #[arg(long)]
        points: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Check that a file would be accepted for import
    ValidateCsv {
        /// File to check
        #[arg(short, long)]
        input: PathBuf,

        /// Declared content type
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Upload a raw-metrics CSV for a session
    Import {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// File to upload
        #[arg(short, long)]
        input: PathBuf,

        /// Declared content type
        #[arg(long)]
        content_type: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Export psychoemotional answers as semicolon-delimited CSV
    Export {
        /// Fetch answers for this session
        #[arg(long, conflicts_with = "answers", required_unless_present = "answers")]
        session: Option<String>,

        /// Read answers from a local JSON array instead
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List metric keys with their labels and display rules
    Metrics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RemoteArgs {
    /// Client configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long)]
    token: Option<String>,

    /// Request timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

impl RemoteArgs {
    fn client_config(&self) -> Result<ClientConfig, CliFailure> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json(&fs::read_to_string(path)?)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.api_token = Some(token.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config.validate()?;
        Ok(config)
    }

    fn analytics(&self) -> Result<LoadAnalytics<HttpTransport>, CliFailure> {
        let transport = HttpTransport::new(&self.client_config()?)?;
        Ok(LoadAnalytics::new(transport))
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one point per line)
    Ndjson,
    /// JSON array of points
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliFailure> {
    match cli.command {
        Commands::Normalize {
            input,
            output,
            output_format,
        } => cmd_normalize(&input, &output, output_format),

        Commands::Summarize {
            input,
            from,
            to,
            metrics,
            json,
        } => cmd_summarize(&input, from.as_deref().zip(to.as_deref()), &metrics, json),

        Commands::Fetch {
            athlete,
            from,
            to,
            metrics,
            points,
            json,
            remote,
        } => cmd_fetch(&athlete, &from, &to, &metrics, points, json, &remote).await,

        Commands::ValidateCsv {
            input,
            content_type,
        } => cmd_validate_csv(&input, content_type).await,

        Commands::Import {
            session,
            input,
            content_type,
            remote,
        } => cmd_import(&session, &input, content_type, &remote).await,

        Commands::Export {
            session,
            answers,
            output,
            remote,
        } => cmd_export(session.as_deref(), answers.as_deref(), output.as_deref(), &remote).await,

        Commands::Metrics { json } => cmd_metrics(json),
    }
}

fn cmd_normalize(
    input: &Path,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), CliFailure> {
    let points = read_points(input)?;
    write_output(output, format_points(&points, &output_format)?.as_bytes())
}

fn cmd_summarize(
    input: &Path,
    window: Option<(&str, &str)>,
    metrics: &str,
    json: bool,
) -> Result<(), CliFailure> {
    let selection = MetricSelection::parse(metrics)?;
    let mut points = read_points(input)?;

    if let Some((from, to)) = window {
        let window = TimeWindow::parse(from, to)?;
        points.retain(|p| point_in_window(p, &window));
    }

    let summary = AggregationEngine::summarize(&points, selection.keys());
    print_summary(&summary, None, json)
}

async fn cmd_fetch(
    athlete: &str,
    from: &str,
    to: &str,
    metrics: &str,
    include_points: bool,
    json: bool,
    remote: &RemoteArgs,
) -> Result<(), CliFailure> {
    let window = TimeWindow::parse(from, to)?;
    let selection = MetricSelection::parse(metrics)?;
    let query = TimeWindowQuery::build(window.from, window.to, &selection);

    let analytics = remote.analytics()?;
    let fetched = match analytics.fetch_latest(athlete, &query).await? {
        FetchOutcome::Fresh(fetched) => fetched,
        // single fetch per invocation, cannot be superseded
        FetchOutcome::Stale => return Ok(()),
    };

    if include_points && (json || !atty::is(atty::Stream::Stdout)) {
        println!("{}", serde_json::to_string_pretty(&fetched)?);
        return Ok(());
    }
    if include_points {
        for point in &fetched.series.points {
            println!("{}", format_point_row(point, selection.keys()));
        }
        println!();
    }
    print_summary(&fetched.summary, Some(&fetched.window), json)
}

async fn cmd_validate_csv(input: &Path, content_type: Option<String>) -> Result<(), CliFailure> {
    let mut file = ImportFile::from_path(input).await?;
    file.content_type = content_type;

    CsvImportPipeline::validate(&file).map_err(AnalyticsError::from)?;
    println!("{}: accepted for import", file.upload_name());
    Ok(())
}

async fn cmd_import(
    session: &str,
    input: &Path,
    content_type: Option<String>,
    remote: &RemoteArgs,
) -> Result<(), CliFailure> {
    let mut file = ImportFile::from_path(input).await?;
    file.content_type = content_type;

    // validate before building a client so a wrong file never needs a config
    CsvImportPipeline::validate(&file).map_err(AnalyticsError::from)?;

    let receipt = remote.analytics()?.import_metrics(session, &file).await?;
    println!("{}", serde_json::to_string(&receipt)?);
    Ok(())
}

async fn cmd_export(
    session: Option<&str>,
    answers: Option<&Path>,
    output: Option<&Path>,
    remote: &RemoteArgs,
) -> Result<(), CliFailure> {
    let blob = match (answers, session) {
        (Some(path), _) => {
            let rows: Vec<AnswerRow> = serde_json::from_str(&read_input(path)?)?;
            CsvExportPipeline::export_rows(&rows)?
        }
        (None, Some(session)) => remote.analytics()?.export_answers(session).await?,
        (None, None) => {
            return Err(CliFailure::Usage(
                "either --session or --answers is required".to_string(),
            ))
        }
    };

    let default_path = PathBuf::from(&blob.file_name);
    let output = output.unwrap_or(default_path.as_path());
    write_output(output, &blob.bytes)?;

    if output.to_string_lossy() != "-" {
        eprintln!("wrote {}", output.display());
    }
    Ok(())
}

fn cmd_metrics(json: bool) -> Result<(), CliFailure> {
    #[derive(Serialize)]
    struct MetricInfo {
        key: MetricKey,
        label: &'static str,
        color: &'static str,
        decimals: usize,
        suffix: &'static str,
    }

    let infos: Vec<MetricInfo> = MetricKey::ALL
        .iter()
        .map(|&key| {
            let rule = FormatRule::for_metric(key);
            MetricInfo {
                key,
                label: key.label(),
                color: key.color(),
                decimals: rule.decimals,
                suffix: rule.suffix,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
    } else {
        for info in &infos {
            println!(
                "{:<10} {:<14} {}  {} dp{}",
                info.key.as_str(),
                info.label,
                info.color,
                info.decimals,
                if info.suffix.is_empty() {
                    String::new()
                } else {
                    format!(", suffix {}", info.suffix)
                }
            );
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String, CliFailure> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliFailure> {
    if path.to_string_lossy() == "-" {
        use std::io::Write;
        io::stdout().write_all(bytes)?;
    } else {
        fs::write(path, bytes)?;
    }
    Ok(())
}

fn read_points(input: &Path) -> Result<Vec<RiskPoint>, CliFailure> {
    let value: serde_json::Value = serde_json::from_str(&read_input(input)?)?;
    Ok(points_from_value(&value))
}

/// Points without a parseable date cannot be placed in a window
fn point_in_window(point: &RiskPoint, window: &TimeWindow) -> bool {
    parse_calendar_date(&point.date)
        .map(|date| window.contains(date))
        .unwrap_or(false)
}

fn format_points(points: &[RiskPoint], format: &OutputFormat) -> Result<String, CliFailure> {
    Ok(match format {
        OutputFormat::Ndjson => {
            let mut lines = Vec::with_capacity(points.len());
            for point in points {
                lines.push(serde_json::to_string(point)?);
            }
            lines.join("\n") + "\n"
        }
        OutputFormat::Json => serde_json::to_string(points)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(points)?,
    })
}

fn format_point_row(point: &RiskPoint, keys: &[MetricKey]) -> String {
    let cells: Vec<String> = keys
        .iter()
        .map(|&key| {
            format!(
                "{}={}",
                key,
                MetricFormatter::format(key, point.get(key))
            )
        })
        .collect();
    let date = if point.date.is_empty() { "?" } else { point.date.as_str() };
    format!("{:<12} {}", date, cells.join("  "))
}

fn print_summary(
    summary: &WindowSummary,
    window: Option<&TimeWindow>,
    json: bool,
) -> Result<(), CliFailure> {
    if json || !atty::is(atty::Stream::Stdout) {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    if let Some(window) = window {
        println!("Window {} .. {} ({} days)", window.from_day(), window.to_day(), window.days());
    }
    println!("{} points", summary.point_count);
    for metric in &summary.metrics {
        println!(
            "  {:<14} {:>10}  ({} samples)",
            metric.key.label(),
            metric.display,
            metric.samples
        );
    }
    Ok(())
}

#[derive(Debug)]
enum CliFailure {
    Io(io::Error),
    Analytics(AnalyticsError),
    Json(serde_json::Error),
    Usage(String),
}

impl From<io::Error> for CliFailure {
    fn from(e: io::Error) -> Self {
        CliFailure::Io(e)
    }
}

impl From<AnalyticsError> for CliFailure {
    fn from(e: AnalyticsError) -> Self {
        CliFailure::Analytics(e)
    }
}

impl From<serde_json::Error> for CliFailure {
    fn from(e: serde_json::Error) -> Self {
        CliFailure::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliFailure> for CliError {
    fn from(e: CliFailure) -> Self {
        match e {
            CliFailure::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliFailure::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CliFailure::Usage(message) => CliError {
                code: "USAGE".to_string(),
                message,
                hint: Some("Run with --help".to_string()),
            },
            CliFailure::Analytics(e) => {
                let (code, hint) = match &e {
                    AnalyticsError::Rejected(_) => {
                        ("IMPORT_REJECTED", Some("Only .csv files or text/csv uploads are accepted"))
                    }
                    AnalyticsError::Transport(_) | AnalyticsError::Service { .. } => {
                        ("TRANSPORT_ERROR", Some("Check --base-url, --token and service status"))
                    }
                    AnalyticsError::EmptyExport => ("NO_ANSWERS", Some("No answers were submitted for this session")),
                    AnalyticsError::EmptyMetricSelection | AnalyticsError::UnknownMetric(_) => {
                        ("BAD_METRICS", Some("Run 'loadctl metrics' for valid names"))
                    }
                    AnalyticsError::DateParse(_) => ("BAD_DATE", Some("Use YYYY-MM-DD")),
                    AnalyticsError::Config(_) => ("CONFIG_ERROR", None),
                    _ => ("ANALYTICS_ERROR", None),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}
