//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::model::SegmentationParams;

/// Customer lookalike matching and spend segmentation over transaction CSVs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customers CSV file
    #[arg(long, default_value = "Customers.csv")]
    pub customers: String,

    /// Path to the products CSV file
    #[arg(long, default_value = "Products.csv")]
    pub products: String,

    /// Path to the transactions CSV file
    #[arg(long, default_value = "Transactions.csv")]
    pub transactions: String,

    /// Output path for the lookalike table
    #[arg(long, default_value = "lookalikes.csv")]
    pub lookalike_out: String,

    /// Output path for the cluster assignment table
    #[arg(long, default_value = "segments.csv")]
    pub segments_out: String,

    /// Output path for the cluster scatter plot
    #[arg(short, long, default_value = "segment_plot.png")]
    pub plot: String,

    /// How many customers, in customer-table order, receive a lookalike row
    #[arg(short = 'n', long, default_value = "20")]
    pub lookalike_targets: usize,

    /// Smallest candidate cluster count
    #[arg(long, default_value = "2")]
    pub k_min: usize,

    /// Largest candidate cluster count
    #[arg(long, default_value = "10")]
    pub k_max: usize,

    /// Maximum iterations for each K-Means fit
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Random restarts per K-Means fit; the lowest-inertia run is kept
    #[arg(long, default_value = "10")]
    pub n_runs: usize,

    /// Seed for the clustering RNG
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Skip chart generation
    #[arg(long)]
    pub skip_plots: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Validate the clustering knobs into [`SegmentationParams`].
    pub fn segmentation_params(&self) -> crate::Result<SegmentationParams> {
        if self.k_min < 2 {
            anyhow::bail!("--k-min must be at least 2, got {}", self.k_min);
        }
        if self.k_min > self.k_max {
            anyhow::bail!("--k-min ({}) must not exceed --k-max ({})", self.k_min, self.k_max);
        }
        if self.tolerance <= 0.0 {
            anyhow::bail!("--tolerance must be positive, got {}", self.tolerance);
        }
        if self.n_runs == 0 {
            anyhow::bail!("--n-runs must be at least 1");
        }
        Ok(SegmentationParams {
            k_min: self.k_min,
            k_max: self.k_max,
            max_iterations: self.max_iters,
            tolerance: self.tolerance,
            n_runs: self.n_runs,
            seed: self.seed,
        })
    }
}
