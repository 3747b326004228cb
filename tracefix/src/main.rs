//! tracefix - rewrite recorded OLTP benchmark traces
//!
//! Exactly one rewrite runs per invocation. Without a mode flag the trace is
//! renumbered; `--expand-suffix`, `--sigma` and `--paired` select the other
//! rewriters.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use tracefix::{AffinityTarget, RewriteConfig, RewriteJob, RewriteMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AffinityArg {
    Partition,
    Warehouse,
}

impl From<AffinityArg> for AffinityTarget {
    fn from(arg: AffinityArg) -> Self {
        match arg {
            AffinityArg::Partition => AffinityTarget::Partition,
            AffinityArg::Warehouse => AffinityTarget::Warehouse,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "tracefix", version, about = "Rewrite recorded OLTP benchmark traces")]
struct Cli {
    /// Procedure/statement catalog (JSON or YAML)
    #[arg(long)]
    catalog: PathBuf,

    /// Input trace (JSON Lines)
    #[arg(long)]
    input: PathBuf,

    /// Output trace, replaced atomically on success
    #[arg(long)]
    output: PathBuf,

    /// Optional configuration file (YAML, TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for every random draw
    #[arg(long)]
    seed: Option<u64>,

    /// Number of partitions in the target database
    #[arg(long)]
    partitions: Option<u32>,

    /// Directory receiving the `.hist` files
    #[arg(long)]
    histogram_dir: Option<PathBuf>,

    /// Also export every histogram to this CSV file
    #[arg(long)]
    summary_csv: Option<PathBuf>,

    /// Write every pass summary to this JSON file
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Expand partitioning parameters whose name ends with this suffix
    #[arg(
        long,
        requires_all = ["min_id", "max_id"],
        conflicts_with_all = ["sigma", "paired", "start_id"]
    )]
    expand_suffix: Option<String>,

    /// Lowest id handed out by the expander (inclusive)
    #[arg(long, requires = "expand_suffix", allow_negative_numbers = true)]
    min_id: Option<i64>,

    /// Upper bound of expanded ids (exclusive)
    #[arg(long, requires = "expand_suffix", allow_negative_numbers = true)]
    max_id: Option<i64>,

    /// Add zipfian affinity with this skew
    #[arg(long, conflicts_with_all = ["paired", "start_id"])]
    sigma: Option<f64>,

    /// Level the zipfian affinity is applied at
    #[arg(long, value_enum, requires = "sigma", default_value_t = AffinityArg::Partition)]
    affinity: AffinityArg,

    /// Pair contiguous partitions with flat affinity
    #[arg(long, conflicts_with = "start_id")]
    paired: bool,

    /// First id assigned when renumbering
    #[arg(long)]
    start_id: Option<u64>,

    /// Swap the first two parameters of the legacy procedure before rewriting
    #[arg(long)]
    fix_legacy_swap: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn mode(&self) -> RewriteMode {
        if let Some(ref suffix) = self.expand_suffix {
            // clap enforces both bounds alongside the suffix
            RewriteMode::Expand {
                suffix: suffix.clone(),
                min_id: self.min_id.unwrap_or_default(),
                max_id: self.max_id.unwrap_or_default(),
            }
        } else if let Some(sigma) = self.sigma {
            RewriteMode::ZipfianAffinity {
                sigma,
                target: self.affinity.into(),
            }
        } else if self.paired {
            RewriteMode::PairedAffinity
        } else {
            RewriteMode::Reindex {
                start_id: self.start_id.unwrap_or(1),
            }
        }
    }

    fn apply_overrides(&self, config: &mut RewriteConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(partitions) = self.partitions {
            config.partitions.count = partitions;
        }
        if let Some(ref dir) = self.histogram_dir {
            config.output.histogram_dir = Some(dir.clone());
        }
        if let Some(ref path) = self.summary_csv {
            config.output.summary_csv = Some(path.clone());
        }
        if let Some(ref path) = self.report_json {
            config.output.report_json = Some(path.clone());
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config =
        RewriteConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let job = RewriteJob {
        catalog: cli.catalog.clone(),
        input: cli.input.clone(),
        output: cli.output.clone(),
        mode: cli.mode(),
        fix_legacy_swap: cli.fix_legacy_swap,
        config,
    };
    info!(mode = ?job.mode, input = %job.input.display(), "starting rewrite");

    let report = tracefix::run(&job)
        .with_context(|| format!("Failed to rewrite {}", job.input.display()))?;
    for pass in &report.passes {
        info!(
            pass = pass.kind.as_str(),
            changed = pass.changed,
            total = pass.total,
            "done"
        );
    }
    Ok(())
}
