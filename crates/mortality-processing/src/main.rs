//! CLI entry point for the mortality rate pipeline.

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use mortality_processing::{
    AgeBand, CountryPopulation, DerivedTable, Pipeline, PipelineConfig, PipelineSummary,
    RateRecord, Selection, Sex, View, dashboard_spec,
};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// CLI-compatible sex enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliSex {
    /// Males
    M,
    /// Females
    F,
}

impl From<CliSex> for Sex {
    fn from(cli: CliSex) -> Self {
        match cli {
            CliSex::M => Sex::M,
            CliSex::F => Sex::F,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Cancer mortality rate preparation and exploration",
    long_about = "Builds mortality rates per 100,000 from the age-banded cancer death and \
                  population tables, then shows one dashboard selection.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  MORTALITY_SOURCE      Path or URL of the mortality table\n  \
                  POPULATION_SOURCE     Path or URL of the population table\n\n\
                  EXAMPLES:\n  \
                  # Default selection over the published tables\n  \
                  mortality-processing\n\n  \
                  # Local files, one country, females in 2010\n  \
                  mortality-processing --mortality cancer_ICD10.csv --population population.csv \\\n      \
                  --country Iceland --sex f --year 2010\n\n  \
                  # Write the linked chart specification\n  \
                  mortality-processing --chart-out dashboard.vl.json"
)]
struct Args {
    /// Mortality table (path or URL)
    #[arg(long)]
    mortality: Option<String>,

    /// Population table (path or URL)
    #[arg(long)]
    population: Option<String>,

    /// Year to show (defaults to the earliest available)
    #[arg(short, long)]
    year: Option<i64>,

    /// Sex to show
    #[arg(short, long, value_enum)]
    sex: Option<CliSex>,

    /// Country to show; repeat for several
    #[arg(short, long = "country")]
    countries: Vec<String>,

    /// Cancer type to show
    #[arg(long)]
    cancer: Option<String>,

    /// Restrict the population breakdown to one age band, e.g. "Age 45-54"
    #[arg(long)]
    age: Option<String>,

    /// Output JSON to stdout instead of human-readable tables
    ///
    /// Disables all logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write the Vega-Lite dashboard specification to this file
    #[arg(long)]
    chart_out: Option<PathBuf>,

    /// List available years, countries and cancers, then exit
    #[arg(long)]
    list: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Machine-readable output of one run.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    generated_at: String,
    mortality_source: String,
    population_source: String,
    summary: &'a PipelineSummary,
    selection: Option<&'a Selection>,
    title: Option<String>,
    empty_state: Option<String>,
    rows: &'a [RateRecord],
    population_by_country: Vec<CountryPopulation>,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let age = args
        .age
        .as_deref()
        .map(|label| AgeBand::parse(label).ok_or_else(|| anyhow!("Unknown age band: {}", label)))
        .transpose()?;

    let config = build_config(&args)?;
    let pipeline = build_pipeline(&args, config)?;

    info!("{}", "=".repeat(80));
    info!("Starting mortality pipeline...");
    info!("{}", "=".repeat(80));

    let output = pipeline.run().map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if args.list {
        print_options(&output.table);
        return Ok(());
    }

    let view = match Selection::initial(&output.table, pipeline.config()) {
        Some(initial) => {
            let selection = apply_overrides(initial, &args);
            selection.validate(&output.table)?;
            Some(selection.apply(&output.table))
        }
        None => None,
    };

    if let (Some(path), Some(view)) = (&args.chart_out, &view) {
        let spec = dashboard_spec(view)?;
        std::fs::write(path, serde_json::to_string_pretty(&spec)?)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
        info!("Chart specification written to {}", path.display());
    }

    if args.json {
        let report = RunReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            mortality_source: pipeline.config().mortality_source.identifier(),
            population_source: pipeline.config().population_source.identifier(),
            summary: &output.summary,
            selection: view.as_ref().map(View::selection),
            title: view.as_ref().map(View::title),
            empty_state: empty_state(view.as_ref()),
            rows: view.as_ref().map(View::records).unwrap_or_default(),
            population_by_country: view
                .as_ref()
                .map(|v| v.population_by_country(age))
                .unwrap_or_default(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_summary(&output.summary);
    match &view {
        Some(view) => print_view(view, age),
        None => println!("{}", NO_DATA),
    }

    Ok(())
}

const NO_DATA: &str = "No data available for given subset.";

fn empty_state(view: Option<&View>) -> Option<String> {
    match view {
        Some(view) => view.empty_state(),
        None => Some(NO_DATA.to_string()),
    }
}

/// Sources come from flags first, then the environment, then the defaults.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder();

    if let Some(source) = args
        .mortality
        .clone()
        .or_else(|| env::var("MORTALITY_SOURCE").ok())
    {
        debug!("Mortality source: {}", source);
        builder = builder.mortality_source(source.as_str());
    }
    if let Some(source) = args
        .population
        .clone()
        .or_else(|| env::var("POPULATION_SOURCE").ok())
    {
        debug!("Population source: {}", source);
        builder = builder.population_source(source.as_str());
    }

    Ok(builder.build()?)
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

fn apply_overrides(mut selection: Selection, args: &Args) -> Selection {
    if let Some(year) = args.year {
        selection = selection.with_year(year);
    }
    if let Some(sex) = args.sex {
        selection = selection.with_sex(sex.into());
    }
    if !args.countries.is_empty() {
        selection = selection.with_countries(args.countries.iter().cloned());
    }
    if let Some(ref cancer) = args.cancer {
        selection = selection.with_cancer(cancer);
    }
    selection
}

fn print_options(table: &DerivedTable) {
    match table.year_range() {
        Some((min, max)) => println!("Years: {}-{}", min, max),
        None => println!("Years: none"),
    }
    println!();
    println!("Countries:");
    for country in table.countries() {
        println!("  {}", country);
    }
    println!();
    println!("Cancers:");
    for cancer in table.cancers() {
        println!("  {}", cancer);
    }
}

fn print_summary(summary: &PipelineSummary) {
    println!();
    println!("{}", "=".repeat(80));
    println!("MORTALITY RATES READY");
    println!("{}", "=".repeat(80));
    println!();
    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Source rows: {} mortality, {} population",
        summary.mortality_rows, summary.population_rows
    );
    println!(
        "  Joined: {} rows ({} with population, {} filled)",
        summary.joined_rows, summary.matched_rows, summary.filled_values
    );
    println!(
        "  Dropped: {} incomplete rows, {} zero-population groups",
        summary.dropped_rows, summary.zero_population_groups
    );
    println!("  Derived: {} rows", summary.output_rows);
    println!();

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  ! {}", warning);
        }
        println!();
    }
}

/// Print the heatmap as a country x age-band grid, then the population bars.
fn print_view(view: &View, age: Option<AgeBand>) {
    println!("{}", view.title());
    println!("{}", "-".repeat(80));

    if let Some(message) = view.empty_state() {
        println!("{}", message);
        if view.is_empty() {
            return;
        }
        println!();
    }

    let bands = AgeBand::all();
    print!("{:<20}", "Country");
    for band in &bands {
        print!("{:>11}", band.label().trim_start_matches("Age "));
    }
    println!();

    let mut countries: Vec<&str> = view.records().iter().map(|r| r.country.as_str()).collect();
    countries.dedup();
    for country in countries {
        print!("{:<20}", truncate_str(country, 19));
        for band in bands {
            match view.rate(country, band) {
                Some(rate) => print!("{:>11.2}", rate),
                None => print!("{:>11}", "-"),
            }
        }
        println!();
    }
    println!();

    match age {
        Some(band) => println!("Population size ({}):", band.label()),
        None => println!("Population size (all ages):"),
    }
    for CountryPopulation { country, pop } in view.population_by_country(age) {
        println!("  {:<20}{:>15.0}", truncate_str(&country, 19), pop);
    }
    println!("{}", "=".repeat(80));
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_age_help_example_is_a_band() {
        let command = Args::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_id() == "age")
            .and_then(|arg| arg.get_help())
            .map(ToString::to_string)
            .unwrap();

        let example = help.split('"').nth(1).unwrap();
        assert_eq!(AgeBand::parse(example), Some(AgeBand::From45To54));

        let args = Args::try_parse_from(["mortality-processing", "--age", example]).unwrap();
        assert_eq!(args.age.as_deref(), Some("Age 45-54"));
    }
}
