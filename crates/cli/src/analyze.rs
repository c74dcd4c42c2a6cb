//! `lscope household` / `lscope area`: scorecards over CSV ledgers.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args};
use serde::Serialize;

use ledgerscope_scorecard::config::MAX_WORKERS;
use ledgerscope_scorecard::request::{parse_date_bound, BoundSide};
use ledgerscope_scorecard::{
    analyze_household, cancel_token, AreaAnalysisReport, AreaRequest, AreaSelector, BatchOrchestrator,
    HouseholdAnalysisReport, HouseholdRequest, InMemoryLedger, ScorecardConfig,
};

use crate::settings::load_config;
use crate::CliError;

/// Ledger and registry inputs shared by both analysis commands.
#[derive(Args)]
pub struct InputArgs {
    /// Ledger CSV (record_id, household_code, date, category_code, item_name, amount, direction, coded)
    #[arg(long, env = "LSCOPE_LEDGER")]
    ledger: PathBuf,

    /// Household registry CSV (household_code, head_name, village_name, town_name, population)
    #[arg(long, env = "LSCOPE_REGISTRY")]
    registry: PathBuf,

    /// Scorecard settings (TOML); built-in defaults when omitted
    #[arg(long, env = "LSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Window start, YYYY-MM-DD or YYYY-MM (default: January 1 of the end year)
    #[arg(long)]
    start: Option<String>,

    /// Window end, YYYY-MM-DD or YYYY-MM (default: today)
    #[arg(long)]
    end: Option<String>,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Print the JSON report to stdout
    #[arg(long)]
    json: bool,

    /// Write the JSON report to a file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args)]
pub struct HouseholdArgs {
    /// Household code from the registry
    code: String,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
#[command(group(ArgGroup::new("area").required(true).args(["village", "town"])))]
pub struct AreaArgs {
    /// Analyze every household registered in this village
    #[arg(long)]
    village: Option<String>,

    /// Analyze every household registered in this town
    #[arg(long)]
    town: Option<String>,

    /// Worker threads (overrides batch.workers)
    #[arg(long)]
    workers: Option<usize>,

    /// Stop starting new households after this many seconds
    #[arg(long, value_name = "SECS")]
    time_limit: Option<u64>,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    out: OutputArgs,
}

// ============================================================================
// Inputs
// ============================================================================

fn read_input(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| {
            CliError::io(format!("cannot read {what} {}: {e}", path.display()))
                .with_hint(format!("pass an existing CSV file to --{what}"))
        })
}

fn load_ledger(input: &InputArgs) -> Result<InMemoryLedger, CliError> {
    let ledger = read_input(&input.ledger, "ledger")?;
    let registry = read_input(&input.registry, "registry")?;
    let source = InMemoryLedger::from_csv(&ledger, &registry)?;
    log::info!(
        "loaded {} records for {} registered households",
        source.record_count(),
        source.household_count()
    );
    Ok(source)
}

fn window_bounds(input: &InputArgs) -> Result<(Option<NaiveDate>, Option<NaiveDate>), CliError> {
    let start = input
        .start
        .as_deref()
        .map(|s| parse_date_bound(s, BoundSide::Start))
        .transpose()?;
    let end = input
        .end
        .as_deref()
        .map(|s| parse_date_bound(s, BoundSide::End))
        .transpose()?;
    Ok((start, end))
}

fn config_for(input: &InputArgs) -> Result<ScorecardConfig, CliError> {
    match &input.config {
        Some(path) => load_config(path),
        None => Ok(ScorecardConfig::default()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================================
// Output
// ============================================================================

fn emit<T: Serialize>(report: &T, out: &OutputArgs) -> Result<(), CliError> {
    if !out.json && out.output.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::other(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = out.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if out.json {
        println!("{json_str}");
    }
    Ok(())
}

fn print_household_summary(report: &HouseholdAnalysisReport) {
    let info = &report.household_basic_info;
    let q = &report.quality_assessment;
    let a = &report.anomaly_detection.stats;
    let c = &report.comprehensive_assessment;
    eprintln!(
        "household {} ({}, {}): {} records over {}",
        info.household_code, info.head_name, info.village_name, info.record_count, report.report_metadata.window
    );
    eprintln!(
        "  composite {:.2} ({}), quality {:.2} ({}), {} anomalies (score {:.2})",
        c.score, c.grade, q.total_score, q.grade, a.count, a.score
    );
    let p = &report.consumption_profile;
    let tags: Vec<String> = p
        .level_tags
        .iter()
        .map(ToString::to_string)
        .chain(p.structure_tags.iter().map(ToString::to_string))
        .chain(p.lifestyle_tags.iter().map(ToString::to_string))
        .chain(p.preference_tags.iter().map(ToString::to_string))
        .collect();
    if !tags.is_empty() {
        eprintln!("  tags: {}", tags.join(", "));
    }
    eprintln!("  {}", c.description);
}

fn print_area_summary(report: &AreaAnalysisReport) {
    let meta = &report.report_metadata;
    let info = &meta.area_info;
    eprintln!(
        "{} over {}: {} households, {} analyzed, {} skipped{}",
        info.area,
        meta.window,
        info.requested_households,
        info.analyzed_households,
        info.skipped_households,
        if meta.cancelled { " (stopped early)" } else { "" }
    );
    let stats = &report.batch_statistics;
    if let Some(score) = &stats.comprehensive_stats.score {
        eprintln!(
            "  composite score: min {:.2}, mean {:.2}, max {:.2}",
            score.min, score.mean, score.max
        );
    }
    eprintln!("  anomalies flagged: {}", stats.anomaly_stats.total_anomalies);
    for skip in &report.skipped {
        eprintln!("  skipped {} ({}): {}", skip.household_code, skip.kind, skip.reason);
    }
}

// ============================================================================
// Commands
// ============================================================================

pub fn cmd_household(args: HouseholdArgs) -> Result<(), CliError> {
    let (start, end) = window_bounds(&args.input)?;
    let config = config_for(&args.input)?;
    let source = load_ledger(&args.input)?;

    let mut request = HouseholdRequest::new(args.code);
    request.start = start;
    request.end = end;

    let report = analyze_household(&source, &request, today(), &config)?;
    emit(&report, &args.out)?;
    print_household_summary(&report);
    Ok(())
}

pub fn cmd_area(args: AreaArgs) -> Result<(), CliError> {
    let (start, end) = window_bounds(&args.input)?;
    let mut config = config_for(&args.input)?;
    if let Some(workers) = args.workers {
        if workers == 0 || workers > MAX_WORKERS {
            return Err(CliError::args(format!(
                "--workers must be between 1 and {MAX_WORKERS}, got {workers}"
            )));
        }
        config.batch.workers = workers;
    }

    let area = match (args.village, args.town) {
        (Some(village), _) => AreaSelector::Village(village),
        (None, Some(town)) => AreaSelector::Town(town),
        (None, None) => return Err(CliError::args("one of --village or --town is required")),
    };
    let source = load_ledger(&args.input)?;

    let mut request = AreaRequest::new(area);
    request.start = start;
    request.end = end;

    let cancel = cancel_token();
    if let Some(secs) = args.time_limit {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            cancel.store(true, Ordering::Relaxed);
        });
    }

    let report = BatchOrchestrator::new(&source, &config).run(&request, today(), Some(&*cancel))?;
    emit(&report, &args.out)?;
    print_area_summary(&report);
    Ok(())
}
