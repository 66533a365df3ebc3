//! fwaudit: CLI tool for analyzing exported firewall rule sets.

use clap::{Args, Parser, Subcommand};
use fwaudit::{
    AddressSet, AnalysisConfig, FilterCriteria, FilterSummary, MatchMode, NormalizeOutcome,
    Normalizer, PolicyAnalyzer, RawRule, ResolveOptions, ServiceSet, StaticResolver,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "fwaudit")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Find redundant and shadowed firewall rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Rule rows (JSON or YAML list)
    #[arg(short, long)]
    rules: PathBuf,

    /// Named address/service objects (YAML or JSON)
    #[arg(short, long)]
    objects: Option<PathBuf>,

    /// Analysis config (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report rules covered by another rule with the same action
    Redundancy {
        #[command(flatten)]
        input: Input,
    },

    /// Report rules pre-empted by earlier rules
    Shadow {
        #[command(flatten)]
        input: Input,
    },

    /// Run both redundancy and shadow analysis
    Analyze {
        #[command(flatten)]
        input: Input,
    },

    /// Select rules touching the given addresses or services
    Filter {
        #[command(flatten)]
        input: Input,

        /// Source tokens, comma-separated
        #[arg(long)]
        source: Option<String>,

        /// Destination tokens, comma-separated
        #[arg(long)]
        destination: Option<String>,

        /// Service tokens, comma-separated
        #[arg(long)]
        service: Option<String>,

        /// Combine fields with "and" or "or"
        #[arg(long, default_value = "and")]
        mode: String,

        /// Let wildcard rule fields match narrow queries
        #[arg(long)]
        include_any: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Redundancy { input } => run_redundancy(&input),
        Commands::Shadow { input } => run_shadow(&input),
        Commands::Analyze { input } => run_analyze(&input),
        Commands::Filter {
            input,
            source,
            destination,
            service,
            mode,
            include_any,
        } => run_filter(
            &input,
            Query {
                source,
                destination,
                service,
                mode,
                include_any,
            },
        ),
    };

    match result {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

struct Loaded {
    config: AnalysisConfig,
    resolver: StaticResolver,
    outcome: NormalizeOutcome,
}

fn load(input: &Input) -> CliResult<Loaded> {
    let config = match &input.config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    let resolver = match &input.objects {
        Some(path) => StaticResolver::from_path(path)?,
        None => StaticResolver::new(),
    };

    let rows = read_rows(&input.rules)?;
    log::info!("Read {} rows from {:?}", rows.len(), input.rules);

    let outcome = Normalizer::from_config(&resolver, &config).normalize_batch(&rows);
    Ok(Loaded {
        config,
        resolver,
        outcome,
    })
}

fn read_rows(path: &Path) -> CliResult<Vec<RawRule>> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let rows = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(rows)
}

fn run_redundancy(input: &Input) -> CliResult<String> {
    let loaded = load(input)?;
    let rules = &loaded.outcome.rules;
    let report = PolicyAnalyzer::new(loaded.config)?.redundancy(rules)?;

    Ok(serde_json::to_string_pretty(&json!({
        "redundancy": report.edges,
        "groups": report.groups(rules),
        "skipped": report.skipped,
        "diagnostics": loaded.outcome.diagnostics,
    }))?)
}

fn run_shadow(input: &Input) -> CliResult<String> {
    let loaded = load(input)?;
    let rules = &loaded.outcome.rules;
    let report = PolicyAnalyzer::new(loaded.config)?.shadowing(rules)?;

    Ok(serde_json::to_string_pretty(&json!({
        "shadow": report.edges,
        "effective": report.effective_shadowers(),
        "summary": report.summary(rules),
        "skipped": report.skipped,
        "diagnostics": loaded.outcome.diagnostics,
    }))?)
}

fn run_analyze(input: &Input) -> CliResult<String> {
    let loaded = load(input)?;
    let report = PolicyAnalyzer::new(loaded.config)?.analyze(&loaded.outcome.rules)?;

    Ok(serde_json::to_string_pretty(&json!({
        "redundancy": report.redundancy,
        "shadow": report.shadow,
        "skipped": report.skipped,
        "diagnostics": loaded.outcome.diagnostics,
    }))?)
}

struct Query {
    source: Option<String>,
    destination: Option<String>,
    service: Option<String>,
    mode: String,
    include_any: bool,
}

fn run_filter(input: &Input, query: Query) -> CliResult<String> {
    let loaded = load(input)?;
    let mode = MatchMode::parse(&query.mode)
        .ok_or_else(|| format!("invalid mode {:?}, expected and/or", query.mode))?;

    let options = ResolveOptions {
        deadline: std::time::Instant::now() + loaded.config.resolver_timeout(),
        max_depth: loaded.config.max_group_depth,
    };

    let mut criteria = FilterCriteria::new()
        .mode(mode)
        .include_any(query.include_any);
    if let Some(tokens) = &query.source {
        criteria = criteria.source(AddressSet::resolve(&split(tokens), &loaded.resolver, options)?);
    }
    if let Some(tokens) = &query.destination {
        criteria =
            criteria.destination(AddressSet::resolve(&split(tokens), &loaded.resolver, options)?);
    }
    if let Some(tokens) = &query.service {
        let tokens: Vec<String> = split(tokens)
            .iter()
            .map(|t| loaded.config.vendor.preprocess_service(t))
            .collect();
        criteria = criteria.service(ServiceSet::resolve(&tokens, &loaded.resolver, options)?);
    }

    let rules = &loaded.outcome.rules;
    let matched = fwaudit::filter(rules, &criteria);
    let summary = FilterSummary::new(rules, &matched);
    let ids: Vec<&str> = matched.iter().map(|r| r.id()).collect();

    Ok(serde_json::to_string_pretty(&json!({
        "rules": ids,
        "summary": summary,
        "diagnostics": loaded.outcome.diagnostics,
    }))?)
}

fn split(tokens: &str) -> Vec<&str> {
    tokens
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}
