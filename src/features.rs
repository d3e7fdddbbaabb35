//! Per-customer spend features and the fitted scale transform

use log::debug;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;

use crate::data::{CUSTOMER_KEY, TRANSACTION_KEY};

/// Behavioral features derived from the transaction log, one row per
/// retained customer, sorted by customer id.
///
/// Customers with non-positive total spend are excluded by contract: with
/// non-negative quantities and prices that only removes customers whose
/// transactions are all worthless, but the filter holds even if refunds are
/// ever allowed upstream.
#[derive(Debug)]
pub struct SpendProfile {
    pub customer_ids: Vec<String>,
    /// (n, 2) raw feature matrix: column 0 = TotalSpend, column 1 =
    /// TransactionCount.
    pub raw: Array2<f64>,
}

impl SpendProfile {
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

/// Aggregate the cleaned transaction log into spend profiles.
pub fn build_spend_profiles(transactions: &DataFrame) -> crate::Result<SpendProfile> {
    let agg = transactions
        .clone()
        .lazy()
        .group_by([col(CUSTOMER_KEY)])
        .agg([
            col("TotalValue").sum().alias("TotalSpend"),
            col(TRANSACTION_KEY)
                .count()
                .cast(DataType::Int64)
                .alias("TransactionCount"),
        ])
        .filter(col("TotalSpend").gt(lit(0.0)))
        .sort(CUSTOMER_KEY, SortOptions::default())
        .collect()?;

    let customer_ids: Vec<String> = agg
        .column(CUSTOMER_KEY)?
        .str()?
        .into_no_null_iter()
        .map(str::to_owned)
        .collect();
    let spend: Vec<f64> = agg
        .column("TotalSpend")?
        .f64()?
        .into_no_null_iter()
        .collect();
    let counts: Vec<i64> = agg
        .column("TransactionCount")?
        .i64()?
        .into_no_null_iter()
        .collect();

    let n = customer_ids.len();
    let mut raw = Array2::zeros((n, 2));
    for i in 0..n {
        raw[[i, 0]] = spend[i];
        raw[[i, 1]] = counts[i] as f64;
    }
    debug!("spend profiles: {} customers retained", n);

    Ok(SpendProfile { customer_ids, raw })
}

/// Explicit fitted standardization transform: per-feature mean and standard
/// deviation captured once on the full retained population and passed by
/// reference wherever scaling is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Array1<f64>,
    pub stds: Array1<f64>,
}

impl StandardScaler {
    /// Fit on the full population. A constant feature gets unit deviation so
    /// transforming maps it to zero instead of dividing by zero.
    pub fn fit(features: &Array2<f64>) -> Self {
        let n = features.nrows().max(1) as f64;
        let means = features.sum_axis(Axis(0)) / n;
        let mut stds = Array1::zeros(features.ncols());
        for j in 0..features.ncols() {
            let variance = features
                .column(j)
                .iter()
                .map(|&v| (v - means[j]).powi(2))
                .sum::<f64>()
                / n;
            stds[j] = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        }
        StandardScaler { means, stds }
    }

    /// Standardize features with the fitted parameters.
    pub fn transform(&self, features: &Array2<f64>) -> Array2<f64> {
        let mut scaled = features.clone();
        for mut row in scaled.rows_mut() {
            for j in 0..row.len() {
                row[j] = (row[j] - self.means[j]) / self.stds[j];
            }
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transactions_fixture() -> DataFrame {
        df!(
            TRANSACTION_KEY => &["T1", "T2", "T3", "T4"],
            CUSTOMER_KEY => &["C0002", "C0001", "C0001", "C0003"],
            "ProductID" => &["P001", "P001", "P002", "P003"],
            "Quantity" => &[3.0, 2.0, 1.0, 4.0],
            "Price" => &[10.0, 10.0, 4.0, 0.0],
            "TotalValue" => &[30.0, 20.0, 4.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_total_spend_is_exact_sum() {
        let profile = build_spend_profiles(&transactions_fixture()).unwrap();

        assert_eq!(profile.customer_ids, vec!["C0001", "C0002"]);
        assert_relative_eq!(profile.raw[[0, 0]], 24.0);
        assert_eq!(profile.raw[[0, 1]], 2.0);
        assert_relative_eq!(profile.raw[[1, 0]], 30.0);
        assert_eq!(profile.raw[[1, 1]], 1.0);
    }

    #[test]
    fn test_non_positive_spend_is_excluded() {
        let profile = build_spend_profiles(&transactions_fixture()).unwrap();

        // C0003's only transaction has zero value
        assert!(!profile.customer_ids.contains(&"C0003".to_string()));
    }

    #[test]
    fn test_scaler_standardizes_to_zero_mean_unit_variance() {
        let features = ndarray::array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let scaler = StandardScaler::fit(&features);
        let scaled = scaler.transform(&features);

        for j in 0..2 {
            let mean = scaled.column(j).sum() / 3.0;
            let variance = scaled.column(j).iter().map(|v| v * v).sum::<f64>() / 3.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(variance, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scaler_fit_is_idempotent() {
        let features = ndarray::array![[58.0, 2.0], [17.5, 1.0], [20.5, 2.0], [12.0, 3.0]];
        let first = StandardScaler::fit(&features);
        let second = StandardScaler::fit(&features);

        assert_eq!(first, second);
        assert_eq!(first.transform(&features), second.transform(&features));
    }

    #[test]
    fn test_scaler_constant_feature_maps_to_zero() {
        let features = ndarray::array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(&features);
        let scaled = scaler.transform(&features);

        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }
}
