//! Retail ETL CLI
//!
//! Generate, clean and summarize batches of sales transactions.
//!
//! # Usage
//!
//! ```bash
//! retail-etl generate --count 1000 --seed 42 --output raw.csv
//! retail-etl clean --input raw.csv --output cleaned.csv --report report.json
//! retail-etl report --input raw.csv --region North --group-by category
//! retail-etl report --synthetic --category Books --category Sports --format json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 2: Configuration or validation error
//! - 3: Runtime error (I/O, CSV)

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use retail_etl_backend::analytics::{
    aggregate, Aggregation, DashboardView, DateRange, Dimension, DimensionCatalog, FilterSet,
    Predicate,
};
use retail_etl_backend::export::{write_aggregation, write_cleaned, write_transactions};
use retail_etl_backend::ingest::{CsvRecordSource, RecordSource, SyntheticSource};
use retail_etl_backend::models::from_amount;
use retail_etl_backend::{EtlOutcome, EtlPipeline, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "retail-etl")]
#[command(about = "Clean retail sales transactions and summarize them")]
struct Cli {
    /// Path to TOML configuration file (defaults to ETL_CONFIG_PATH or etl_config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a seeded synthetic raw batch as CSV
    Generate {
        /// Number of base records (duplicates are added on top)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the cleaning pipeline and write the cleaned set
    Clean {
        #[command(flatten)]
        input: InputArgs,

        /// Cleaned CSV output (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the ETL report as JSON to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Filter the cleaned set and print KPIs and aggregates
    Report {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Only print one aggregation
        #[arg(short, long)]
        group_by: Option<Dimension>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Raw transactions CSV
    #[arg(short, long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
    input: Option<PathBuf>,

    /// Use the synthetic source from the config instead of a file
    #[arg(long)]
    synthetic: bool,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Region filter (repeatable; "All" matches everything)
    #[arg(long)]
    region: Vec<String>,

    /// Category filter (repeatable)
    #[arg(long)]
    category: Vec<String>,

    /// Channel filter (repeatable)
    #[arg(long)]
    channel: Vec<String>,

    /// Customer segment filter (repeatable)
    #[arg(long)]
    segment: Vec<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Reject filter values that never occur in the cleaned set
    #[arg(long)]
    strict: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            let config_error = err
                .downcast_ref::<PipelineError>()
                .is_some_and(PipelineError::is_config_error);
            ExitCode::from(if config_error { 2 } else { 3 })
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "retail_etl_backend=info,retail_etl=info".into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path).map_err(|e| {
            PipelineError::config(format!("failed to load {}: {:#}", path.display(), e))
        })?,
        None => PipelineConfig::from_env(),
    };
    config.validate()?;

    match cli.command {
        Commands::Generate {
            count,
            seed,
            output,
        } => generate(config, count, seed, output),
        Commands::Clean {
            input,
            output,
            report,
        } => clean(&config, &input, output, report),
        Commands::Report {
            input,
            filters,
            group_by,
            format,
        } => report(&config, &input, &filters, group_by, format),
    }
}

fn generate(
    config: PipelineConfig,
    count: Option<usize>,
    seed: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut synthetic = config.synthetic;
    if let Some(count) = count {
        synthetic.records = count;
    }
    if let Some(seed) = seed {
        synthetic.seed = seed;
    }
    let records = SyntheticSource::new(synthetic)?.generate();
    write_transactions(&records, open_output(output.as_ref())?)?;
    info!(records = records.len(), "raw batch written");
    Ok(())
}

fn load_outcome(config: &PipelineConfig, input: &InputArgs) -> Result<EtlOutcome> {
    let pipeline = EtlPipeline::new(config)?;
    let mut source: Box<dyn RecordSource> = match &input.input {
        Some(path) => Box::new(CsvRecordSource::new(path)),
        None => Box::new(SyntheticSource::new(config.synthetic.clone())?),
    };
    Ok(pipeline.run_source(source.as_mut())?)
}

fn clean(
    config: &PipelineConfig,
    input: &InputArgs,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<()> {
    let outcome = load_outcome(config, input)?;
    write_cleaned(outcome.records(), open_output(output.as_ref())?)?;

    if let Some(path) = report {
        let body = serde_json::json!({
            "report": outcome.report,
            "malformedRecords": outcome.malformed_records,
            "rejected": outcome.rejected,
        });
        let file = File::create(&path)
            .with_context(|| format!("Failed to create report: {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &body)?;
    }

    eprintln!("{}", outcome.report);
    eprintln!("Malformed records:      {}", outcome.malformed_records);
    Ok(())
}

fn build_filters(config: &PipelineConfig, args: &FilterArgs) -> Result<FilterSet> {
    let sentinel = config.match_all_sentinel.as_str();
    let mut filters = FilterSet::all()
        .with_region(Predicate::from_values(&args.region, sentinel))
        .with_category(Predicate::from_values(&args.category, sentinel))
        .with_channel(Predicate::from_values(&args.channel, sentinel))
        .with_customer_segment(Predicate::from_values(&args.segment, sentinel));
    if let (Some(from), Some(to)) = (args.from, args.to) {
        filters = filters.with_date_range(DateRange::new(from, to)?);
    }
    Ok(filters)
}

fn report(
    config: &PipelineConfig,
    input: &InputArgs,
    filter_args: &FilterArgs,
    group_by: Option<Dimension>,
    format: OutputFormat,
) -> Result<()> {
    let outcome = load_outcome(config, input)?;
    let filters = build_filters(config, filter_args)?;
    if filter_args.strict {
        filters.validate(&DimensionCatalog::from_records(outcome.records()))?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(dimension) = group_by {
        let working = filters.apply(outcome.records());
        let aggregation = aggregate(dimension, working.iter().copied());
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, &aggregation)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => write_aggregation(&aggregation, &mut out)?,
            OutputFormat::Table => print_aggregation(&mut out, dimension, &aggregation)?,
        }
        return Ok(());
    }

    let view = DashboardView::build(outcome.records(), &filters);
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "report": outcome.report,
                "malformedRecords": outcome.malformed_records,
                "view": view,
            });
            serde_json::to_writer_pretty(&mut out, &body)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let working = filters.apply(outcome.records());
            write_cleaned(working.iter().copied(), &mut out)?;
        }
        OutputFormat::Table => print_view(&mut out, &outcome, &view)?,
    }
    Ok(())
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    })
}

fn print_view(out: &mut impl Write, outcome: &EtlOutcome, view: &DashboardView) -> Result<()> {
    writeln!(out, "╔════════════════════════════════════════════════════════════════╗")?;
    writeln!(out, "║              RETAIL SALES ANALYTICS REPORT                     ║")?;
    writeln!(out, "╚════════════════════════════════════════════════════════════════╝")?;
    writeln!(out)?;
    writeln!(out, "=== ETL ===\n")?;
    writeln!(out, "{}", outcome.report)?;
    writeln!(out, "Malformed records:      {}", outcome.malformed_records)?;
    writeln!(out)?;

    let info = &view.info;
    writeln!(out, "=== Dataset ===\n")?;
    writeln!(out, "  Records:    {}", info.records)?;
    match (info.first_date, info.last_date) {
        (Some(first), Some(last)) => writeln!(
            out,
            "  Date range: {} - {}",
            first.format("%b %d, %Y"),
            last.format("%b %d, %Y")
        )?,
        _ => writeln!(out, "  Date range: -")?,
    }
    writeln!(out, "  Categories: {}", info.categories)?;
    writeln!(out, "  Regions:    {}", info.regions)?;
    writeln!(out)?;

    let kpis = &view.kpis;
    writeln!(out, "=== KPIs ===\n")?;
    writeln!(out, "  Total revenue:       ${:>14.2}", kpis.total_revenue_f64())?;
    writeln!(out, "  Total profit:        ${:>14.2}", kpis.total_profit_f64())?;
    writeln!(out, "  Transactions:         {:>14}", kpis.total_transactions)?;
    writeln!(out, "  Avg order value:     ${:>14.2}", kpis.avg_order_value)?;
    writeln!(out, "  Profit margin:        {:>13.1}%", kpis.profit_margin_percent)?;
    writeln!(out, "  Avg quantity/order:   {:>14.1}", kpis.avg_quantity)?;
    writeln!(out, "  Customer segments:    {:>14}", kpis.customer_segments)?;
    match kpis.avg_satisfaction {
        Some(score) => writeln!(out, "  Avg satisfaction:     {:>12.1}/5", score)?,
        None => writeln!(out, "  Avg satisfaction:     {:>14}", "-")?,
    }
    writeln!(out)?;

    for dimension in Dimension::ALL {
        let aggregation = match dimension {
            Dimension::Category => Aggregation::Rows(view.by_category.clone()),
            Dimension::Region => Aggregation::Rows(view.by_region.clone()),
            Dimension::Month => Aggregation::Rows(view.by_month.clone()),
            Dimension::Channel => Aggregation::Shares(view.by_channel.clone()),
            Dimension::CustomerSegment => Aggregation::Rows(view.by_segment.clone()),
        };
        print_aggregation(out, dimension, &aggregation)?;
    }

    writeln!(out, "=== Avg profit margin by category ===\n")?;
    for row in &view.margin_by_category {
        writeln!(out, "  {:<20} {:>8.2}%  ({} records)", row.key, row.avg_margin, row.count)?;
    }
    writeln!(out)?;

    writeln!(out, "=== Payment methods ===\n")?;
    writeln!(out, "  {:<20} {:>14} {:>8} {:>12}", "Method", "Revenue", "Count", "Satisfaction")?;
    writeln!(out, "  {}", "-".repeat(57))?;
    for row in &view.by_payment_method {
        let score = row
            .avg_satisfaction
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "  {:<20} {:>14.2} {:>8} {:>12}",
            row.method,
            from_amount(row.revenue),
            row.transaction_count,
            score
        )?;
    }
    writeln!(out)?;

    writeln!(out, "=== Monthly revenue ===\n")?;
    for bucket in &view.monthly_revenue {
        writeln!(out, "  {:<10} {:>14.2}", bucket.label, from_amount(bucket.revenue))?;
    }
    writeln!(out)?;
    Ok(())
}

fn print_aggregation(
    out: &mut impl Write,
    dimension: Dimension,
    aggregation: &Aggregation,
) -> Result<()> {
    writeln!(out, "=== Revenue by {} ===\n", dimension)?;
    match aggregation {
        Aggregation::Rows(rows) => {
            writeln!(
                out,
                "  {:<20} {:>14} {:>14} {:>8} {:>12}",
                "Key", "Revenue", "Profit", "Count", "Avg value"
            )?;
            writeln!(out, "  {}", "-".repeat(72))?;
            for row in rows {
                let avg = row
                    .avg_value
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "-".to_string());
                writeln!(
                    out,
                    "  {:<20} {:>14.2} {:>14.2} {:>8} {:>12}",
                    row.key,
                    from_amount(row.revenue),
                    from_amount(row.profit),
                    row.count,
                    avg
                )?;
            }
        }
        Aggregation::Shares(slices) => {
            writeln!(out, "  {:<20} {:>14} {:>8}", "Name", "Revenue", "Share")?;
            writeln!(out, "  {}", "-".repeat(44))?;
            for slice in slices {
                writeln!(
                    out,
                    "  {:<20} {:>14.2} {:>7.1}%",
                    slice.name,
                    from_amount(slice.value),
                    slice.share_pct
                )?;
            }
        }
    }
    writeln!(out)?;
    Ok(())
}
