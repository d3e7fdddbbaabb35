//! Segmentation: seeded K-Means with Davies-Bouldin model selection

use linfa::prelude::*;
use linfa::Dataset;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use crate::features::{SpendProfile, StandardScaler};

/// Knobs for the model-selection search. Every fit is seeded from `seed`,
/// so repeated runs on identical input produce identical assignments.
#[derive(Debug, Clone)]
pub struct SegmentationParams {
    /// Smallest candidate cluster count (inclusive).
    pub k_min: usize,
    /// Largest candidate cluster count (inclusive).
    pub k_max: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
    /// Random restarts per fit; the lowest-inertia run is kept.
    pub n_runs: usize,
    pub seed: u64,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: 42,
        }
    }
}

/// One evaluated candidate from the search loop.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub k: usize,
    pub davies_bouldin: f64,
    pub inertia: f64,
}

/// Final segmentation: the chosen cluster count, its validity score, the
/// per-customer assignment, and the fitted transform used throughout.
#[derive(Debug)]
pub struct Segmentation {
    pub chosen_k: usize,
    pub davies_bouldin: f64,
    /// Cluster label in `[0, chosen_k)` per profile row.
    pub labels: Array1<usize>,
    /// Centroids in scaled feature space.
    pub centroids: Array2<f64>,
    pub inertia: f64,
    /// Every candidate evaluated during the search, in increasing-k order.
    pub candidates: Vec<CandidateScore>,
    pub scaler: StandardScaler,
    /// Features after standardization, row-aligned with the profile.
    pub scaled: Array2<f64>,
}

impl Segmentation {
    /// Customers per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.chosen_k];
        for &label in self.labels.iter() {
            if label < self.chosen_k {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Partition the retained customers into behaviorally coherent clusters,
/// choosing the cluster count automatically.
///
/// The scaler is fitted once on the full retained population and every
/// candidate k is evaluated on the same scaled features. Candidates with
/// `k >= population` are skipped; the k with the lowest Davies-Bouldin index
/// wins, ties keeping the lowest k. The definitive assignment comes from a
/// fresh fit at the chosen k, which reproduces the search-loop fit exactly
/// because both start from the same seed.
pub fn segment_customers(
    profile: &SpendProfile,
    params: &SegmentationParams,
) -> crate::Result<Segmentation> {
    let n = profile.len();
    if n == 0 {
        anyhow::bail!("segmentation requires at least one customer with positive spend");
    }
    if params.k_min < 2 || params.k_min > params.k_max {
        anyhow::bail!(
            "invalid cluster count range {}..={}",
            params.k_min,
            params.k_max
        );
    }

    let scaler = StandardScaler::fit(&profile.raw);
    let scaled = scaler.transform(&profile.raw);

    let mut candidates = Vec::new();
    let mut best: Option<CandidateScore> = None;
    for k in params.k_min..=params.k_max {
        if k >= n {
            debug!("skipping k={}: population of {} cannot support it", k, n);
            continue;
        }
        let fit = fit_kmeans(&scaled, k, params)?;
        let score = CandidateScore {
            k,
            davies_bouldin: davies_bouldin_index(&scaled, &fit.labels, &fit.centroids),
            inertia: fit.inertia,
        };
        debug!(
            "k={} davies-bouldin={:.4} inertia={:.4}",
            k, score.davies_bouldin, score.inertia
        );
        if best
            .as_ref()
            .map_or(true, |b| score.davies_bouldin < b.davies_bouldin)
        {
            best = Some(score.clone());
        }
        candidates.push(score);
    }
    let best = best.ok_or_else(|| {
        anyhow::anyhow!(
            "no valid cluster count in {}..={} for a population of {}",
            params.k_min,
            params.k_max,
            n
        )
    })?;

    // definitive fit at the chosen k, from the same seed as the search fit
    let fit = fit_kmeans(&scaled, best.k, params)?;

    Ok(Segmentation {
        chosen_k: best.k,
        davies_bouldin: best.davies_bouldin,
        labels: fit.labels,
        centroids: fit.centroids,
        inertia: fit.inertia,
        candidates,
        scaler,
        scaled,
    })
}

struct KMeansFit {
    labels: Array1<usize>,
    centroids: Array2<f64>,
    inertia: f64,
}

fn fit_kmeans(scaled: &Array2<f64>, k: usize, params: &SegmentationParams) -> crate::Result<KMeansFit> {
    let n_samples = scaled.nrows();
    let targets: Array1<usize> = Array1::zeros(n_samples); // Dummy targets for unsupervised learning
    let dataset = Dataset::new(scaled.clone(), targets);

    let rng = Xoshiro256Plus::seed_from_u64(params.seed);
    let model = KMeans::params_with(k, rng, L2Dist)
        .max_n_iterations(params.max_iterations)
        .n_runs(params.n_runs)
        .tolerance(params.tolerance)
        .fit(&dataset)?;

    let labels = model.predict(&dataset);
    let centroids = model.centroids().clone();
    let inertia = compute_inertia(scaled, &labels, &centroids);

    Ok(KMeansFit {
        labels,
        centroids,
        inertia,
    })
}

/// Davies-Bouldin index: average over clusters of the worst-case
/// `(scatter_i + scatter_j) / centroid_distance(i, j)`. Scatter is the mean
/// distance of a cluster's members to its centroid. Lower is better;
/// coincident centroids make the pair ratio infinite.
pub fn davies_bouldin_index(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    centroids: &Array2<f64>,
) -> f64 {
    let k = centroids.nrows();
    if k < 2 {
        return 0.0;
    }

    let mut scatter = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (i, &label) in labels.iter().enumerate() {
        if label < k {
            scatter[label] += euclidean_distance(&features.row(i), &centroids.row(label));
            counts[label] += 1;
        }
    }
    for cluster in 0..k {
        if counts[cluster] > 0 {
            scatter[cluster] /= counts[cluster] as f64;
        }
    }

    let mut total = 0.0;
    for i in 0..k {
        let mut worst = 0.0f64;
        for j in 0..k {
            if i == j {
                continue;
            }
            let separation = euclidean_distance(&centroids.row(i), &centroids.row(j));
            let ratio = if separation > 0.0 {
                (scatter[i] + scatter[j]) / separation
            } else {
                f64::INFINITY
            };
            worst = worst.max(ratio);
        }
        total += worst;
    }
    total / k as f64
}

/// Assemble the cluster assignment table:
/// `CustomerID, TotalSpend, TransactionCount, Cluster`.
pub fn segment_table(profile: &SpendProfile, segmentation: &Segmentation) -> crate::Result<DataFrame> {
    let ids: Vec<&str> = profile.customer_ids.iter().map(String::as_str).collect();
    let spend: Vec<f64> = profile.raw.column(0).to_vec();
    let counts: Vec<i64> = profile.raw.column(1).iter().map(|&v| v as i64).collect();
    let clusters: Vec<i64> = segmentation.labels.iter().map(|&l| l as i64).collect();

    let df = df!(
        "CustomerID" => ids,
        "TotalSpend" => spend,
        "TransactionCount" => counts,
        "Cluster" => clusters,
    )?;
    Ok(df)
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;
    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            let point = features.row(i);
            let centroid = centroids.row(cluster);
            let distance_sq = point
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            inertia += distance_sq;
        }
    }
    inertia
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
