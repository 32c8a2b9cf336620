//! TBK CLI

mod table;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use table::CountTable;
use tbk_core::{ModelKind, ParametricModel};
use tbk_inference::{MaximumLikelihoodEstimator, OptimizerConfig, ProfileConfig};
use tbk_sim::KineticRates;

#[derive(Parser)]
#[command(name = "tbk")]
#[command(about = "TBK - transcriptional bursting kinetics from single-cell counts")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Threads (0 = auto)
    #[arg(long, global = true, default_value = "0")]
    threads: usize,

    /// JSON file with `optimizer` and `profile` settings; missing keys take defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a Beta-Poisson model to every gene
    Infer {
        /// Count table (CSV, genes x cells)
        input: PathBuf,

        /// Model to fit
        #[arg(long, default_value = "BP3")]
        model: ModelKind,

        /// Output table. Defaults to `<stem>_params.csv` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// BP3 fit plus burst frequency / burst size confidence intervals
    Confidence {
        /// Count table (CSV, genes x cells)
        input: PathBuf,

        /// Output table. Defaults to `<stem>_confidence.csv` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-parameter two-sample test between two count tables
    Compare {
        /// First count table
        first: PathBuf,

        /// Second count table (same genes, same order)
        second: PathBuf,

        /// Test statistic
        #[arg(long, value_enum, default_value = "lrt")]
        test: TestKind,

        /// Model to fit
        #[arg(long, default_value = "BP3")]
        model: ModelKind,

        /// Output table
        #[arg(short, long, default_value = "likelihood_ratio_test.csv")]
        output: PathBuf,
    },

    /// Simulate a count table
    Simulate {
        /// Activation rate
        #[arg(long)]
        k_on: f64,

        /// Deactivation rate
        #[arg(long)]
        k_off: f64,

        /// Synthesis rate
        #[arg(long)]
        k_syn: f64,

        /// Degradation rate
        #[arg(long, default_value = "1.0")]
        k_deg: f64,

        /// Simulated time per cell (markov source only)
        #[arg(long, default_value = "5000.0")]
        time: f64,

        /// Cells per gene
        #[arg(long)]
        cells: usize,

        /// Genes (rows)
        #[arg(long, default_value = "1")]
        genes: usize,

        /// Base seed; gene `g` uses `seed + g`
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Count generator
        #[arg(long, value_enum, default_value = "markov")]
        source: SimSource,

        /// Output table
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TestKind {
    /// Likelihood-ratio test
    Lrt,
    /// Wald test
    Wald,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SimSource {
    /// Two-state gene, next-event simulation
    Markov,
    /// Direct draws from the BP3 distribution in degradation time units
    Bp3,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    optimizer: OptimizerConfig,
    profile: ProfileConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    if cli.threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(cli.threads).build_global();
    }
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Infer { input, model, output } => cmd_infer(&input, model, output, &config),
        Commands::Confidence { input, output } => cmd_confidence(&input, output, &config),
        Commands::Compare { first, second, test, model, output } => {
            cmd_compare(&first, &second, test, model, &output, &config)
        }
        Commands::Simulate { k_on, k_off, k_syn, k_deg, time, cells, genes, seed, source, output } => {
            let rates = KineticRates { k_on, k_off, k_syn, k_deg };
            cmd_simulate(rates, time, cells, genes, seed, source, &output)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: RunConfig =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    config.profile.validate()?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    input.with_file_name(format!("{stem}_{suffix}.csv"))
}

fn header(first: &str, columns: impl IntoIterator<Item = String>) -> Vec<String> {
    std::iter::once(first.to_string()).chain(columns).collect()
}

fn load_counts(path: &Path) -> Result<CountTable> {
    let table = CountTable::read(path)?;
    tracing::info!(path = %path.display(), genes = table.genes.len(), cells = table.cells.len(), "counts loaded");
    Ok(table)
}

fn cmd_infer(input: &Path, model: ModelKind, output: Option<PathBuf>, config: &RunConfig) -> Result<()> {
    let table = load_counts(input)?;
    let mle = MaximumLikelihoodEstimator::with_config(config.optimizer.clone());

    let fits = tbk_inference::fit_batch(&mle, &table.rows, model);
    let failed = fits.iter().filter(|f| !f.is_fit()).count();
    tracing::info!(%model, genes = fits.len(), failed, "inference complete");

    let arity = model.n_parameters();
    let output = output.unwrap_or_else(|| default_output(input, "params"));
    table::write_rows(
        &output,
        &header(&table.id_column, model.column_names().iter().map(|c| c.to_string())),
        table.genes.iter().zip(&fits).map(|(g, f)| (g.as_str(), f.to_row(arity))),
    )
}

fn cmd_confidence(input: &Path, output: Option<PathBuf>, config: &RunConfig) -> Result<()> {
    let table = load_counts(input)?;
    let mle = MaximumLikelihoodEstimator::with_config(config.optimizer.clone());

    let results = tbk_inference::confidence_batch(&mle, &table.rows, &config.profile)?;
    tracing::info!(
        genes = results.len(),
        with_intervals = results.iter().filter(|(_, ci)| ci.is_some()).count(),
        "confidence intervals complete"
    );

    let mut columns: Vec<String> = ModelKind::Bp3.column_names().iter().map(|c| c.to_string()).collect();
    for name in ["burst_freq", "burst_size"] {
        columns.extend([name.to_string(), format!("{name}_low"), format!("{name}_high")]);
    }

    let rows = table.genes.iter().zip(&results).map(|(gene, (fit, intervals))| {
        let mut row = fit.to_row(3);
        match intervals {
            Some(ci) => {
                row.extend(ci.burst_frequency.interval.to_row());
                row.extend(ci.burst_size.interval.to_row());
            }
            None => row.extend([f64::NAN; 6]),
        }
        (gene.as_str(), row)
    });

    let output = output.unwrap_or_else(|| default_output(input, "confidence"));
    table::write_rows(&output, &header(&table.id_column, columns), rows)
}

fn cmd_compare(
    first: &Path,
    second: &Path,
    test: TestKind,
    model: ModelKind,
    output: &Path,
    config: &RunConfig,
) -> Result<()> {
    let a = load_counts(first)?;
    let b = load_counts(second)?;
    if a.genes != b.genes {
        bail!(
            "{} and {} must list the same genes in the same order",
            first.display(),
            second.display()
        );
    }

    let mle = MaximumLikelihoodEstimator::with_config(config.optimizer.clone());
    let tests = match test {
        TestKind::Lrt => tbk_inference::likelihood_ratio_batch(&mle, &a.rows, &b.rows, model)?,
        TestKind::Wald => tbk_inference::wald_batch(&mle, &a.rows, &b.rows, model)?,
    };
    tracing::info!(?test, genes = tests.len(), "comparison complete");

    let names = model.column_names();
    let columns = ["1", "2", "p"]
        .iter()
        .flat_map(|prefix| names.iter().map(move |n| format!("{prefix} {n}")));

    let arity = model.n_parameters();
    table::write_rows(
        output,
        &header(&a.id_column, columns),
        a.genes.iter().zip(&tests).map(|(g, t)| (g.as_str(), t.to_row(arity))),
    )
}

fn cmd_simulate(
    rates: KineticRates,
    time: f64,
    cells: usize,
    genes: usize,
    seed: u64,
    source: SimSource,
    output: &Path,
) -> Result<()> {
    rates.validate()?;
    if cells == 0 || genes == 0 {
        bail!("--cells and --genes must be >= 1");
    }

    let rows = (0..genes)
        .into_par_iter()
        .map(|g| -> tbk_core::Result<Vec<f64>> {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(g as u64));
            let counts: Vec<f64> = match source {
                SimSource::Markov => tbk_sim::simulate_cells(rates, time, cells, &mut rng)?
                    .into_iter()
                    .map(|c| c as f64)
                    .collect(),
                SimSource::Bp3 => tbk_prob::sample(
                    rates.k_on / rates.k_deg,
                    rates.k_off / rates.k_deg,
                    rates.k_syn / rates.k_deg,
                    cells,
                    &mut rng,
                )?,
            };
            Ok(counts)
        })
        .collect::<tbk_core::Result<Vec<_>>>()?;
    tracing::info!(?source, genes, cells, seed, "simulation complete");

    let table = CountTable {
        id_column: "gene".to_string(),
        cells: (0..cells).map(|c| format!("cell_{c}")).collect(),
        genes: (0..genes).map(|g| format!("gene_{g}")).collect(),
        rows,
    };
    table.write(output)
}
