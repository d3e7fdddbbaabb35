//! Lookalike ranking: exact nearest-neighbor search over the interaction matrix

use std::cmp::Ordering;

use log::debug;
use ndarray::ArrayView1;
use polars::prelude::*;

use crate::matrix::InteractionMatrix;

/// Neighbors returned per scored customer, fixed by the output schema
/// (`Lookalike1..3` / `Score1..3`).
pub const LOOKALIKE_COUNT: usize = 3;

/// Ranked neighbors for one scored customer.
#[derive(Debug, Clone)]
pub struct Lookalike {
    pub customer_id: String,
    /// Exactly [`LOOKALIKE_COUNT`] (neighbor id, cosine distance) pairs,
    /// ascending by distance.
    pub neighbors: Vec<(String, f64)>,
}

/// Cosine distance (1 - cosine similarity) between two quantity vectors.
///
/// A zero-magnitude vector has no direction, so any comparison involving one
/// is assigned the maximal distance 1.0 instead of letting NaN propagate.
pub fn cosine_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    let dot = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    // clamp: fused multiplies can push an exact match slightly negative
    (1.0 - dot / (norm_a * norm_b)).max(0.0)
}

/// Rank each target customer against every other matrix row.
///
/// Targets without a matrix row (no surviving transactions) are skipped and
/// produce no record. Ties are broken by matrix enumeration order: the scan
/// visits rows in ascending index order and the sort is stable.
pub fn rank_lookalikes(
    matrix: &InteractionMatrix,
    targets: &[String],
) -> crate::Result<Vec<Lookalike>> {
    if matrix.n_customers() < LOOKALIKE_COUNT + 1 {
        anyhow::bail!(
            "lookalike ranking needs at least {} customers with transactions, found {}",
            LOOKALIKE_COUNT + 1,
            matrix.n_customers()
        );
    }

    let mut records = Vec::with_capacity(targets.len());
    for target in targets {
        let query_row = match matrix.row_of(target) {
            Some(row) => row,
            None => {
                debug!("customer {} has no transactions, skipping", target);
                continue;
            }
        };
        let query = matrix.row(query_row);

        let mut scored: Vec<(usize, f64)> = (0..matrix.n_customers())
            .filter(|&row| row != query_row)
            .map(|row| (row, cosine_distance(query, matrix.row(row))))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(LOOKALIKE_COUNT);

        records.push(Lookalike {
            customer_id: target.clone(),
            neighbors: scored
                .into_iter()
                .map(|(row, distance)| (matrix.customer_ids[row].clone(), distance))
                .collect(),
        });
    }
    Ok(records)
}

/// Assemble the flat lookalike result table:
/// `CustomerID, Lookalike1, Score1, Lookalike2, Score2, Lookalike3, Score3`.
pub fn lookalike_table(records: &[Lookalike]) -> crate::Result<DataFrame> {
    let ids: Vec<&str> = records.iter().map(|r| r.customer_id.as_str()).collect();
    let mut neighbors: Vec<Vec<&str>> = vec![Vec::with_capacity(records.len()); LOOKALIKE_COUNT];
    let mut scores: Vec<Vec<f64>> = vec![Vec::with_capacity(records.len()); LOOKALIKE_COUNT];
    for record in records {
        for (slot, (neighbor, score)) in record.neighbors.iter().enumerate() {
            neighbors[slot].push(neighbor.as_str());
            scores[slot].push(*score);
        }
    }

    let df = df!(
        "CustomerID" => ids,
        "Lookalike1" => neighbors[0].clone(),
        "Score1" => scores[0].clone(),
        "Lookalike2" => neighbors[1].clone(),
        "Score2" => scores[1].clone(),
        "Lookalike3" => neighbors[2].clone(),
        "Score3" => scores[2].clone(),
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CUSTOMER_KEY, PRODUCT_KEY};
    use crate::matrix::build_interaction_matrix;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_cosine_distance_identical_vectors() {
        let a = array![2.0, 0.0, 5.0];
        assert_relative_eq!(cosine_distance(a.view(), a.view()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_distance_is_magnitude_independent() {
        let a = array![1.0, 2.0, 3.0];
        let b = array![10.0, 20.0, 30.0];
        assert_relative_eq!(cosine_distance(a.view(), b.view()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_distance_orthogonal_vectors() {
        let a = array![1.0, 0.0];
        let b = array![0.0, 3.0];
        assert_relative_eq!(cosine_distance(a.view(), b.view()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_distance_zero_vector_policy() {
        let zero = array![0.0, 0.0];
        let a = array![1.0, 2.0];
        assert_eq!(cosine_distance(zero.view(), a.view()), 1.0);
        assert_eq!(cosine_distance(zero.view(), zero.view()), 1.0);
    }

    fn fixture() -> InteractionMatrix {
        // C0001 and C0002 have identical purchase vectors, C0003 is
        // disjoint, C0004 overlaps both
        let customers =
            df!(CUSTOMER_KEY => &["C0001", "C0002", "C0003", "C0004", "C0005"]).unwrap();
        let products = df!(PRODUCT_KEY => &["P001", "P002", "P003"]).unwrap();
        let transactions = df!(
            "TransactionID" => &["T1", "T2", "T3", "T4", "T5", "T6", "T7"],
            CUSTOMER_KEY => &["C0001", "C0001", "C0002", "C0002", "C0003", "C0004", "C0004"],
            PRODUCT_KEY => &["P001", "P002", "P001", "P002", "P003", "P001", "P003"],
            "Quantity" => &[5.0, 2.0, 5.0, 2.0, 7.0, 1.0, 4.0],
        )
        .unwrap();
        build_interaction_matrix(&transactions, &customers, &products).unwrap()
    }

    #[test]
    fn test_identical_vectors_are_mutual_nearest_neighbors() {
        let matrix = fixture();
        let records =
            rank_lookalikes(&matrix, &["C0001".to_string(), "C0002".to_string()]).unwrap();

        assert_eq!(records[0].neighbors[0].0, "C0002");
        assert_relative_eq!(records[0].neighbors[0].1, 0.0, epsilon = 1e-12);
        assert_eq!(records[1].neighbors[0].0, "C0001");
        assert_relative_eq!(records[1].neighbors[0].1, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_query_customer_never_its_own_neighbor() {
        let matrix = fixture();
        let targets: Vec<String> = matrix.customer_ids.clone();
        for record in rank_lookalikes(&matrix, &targets).unwrap() {
            assert!(record.neighbors.iter().all(|(id, _)| *id != record.customer_id));
        }
    }

    #[test]
    fn test_scores_are_non_decreasing() {
        let matrix = fixture();
        let targets: Vec<String> = matrix.customer_ids.clone();
        for record in rank_lookalikes(&matrix, &targets).unwrap() {
            assert_eq!(record.neighbors.len(), LOOKALIKE_COUNT);
            for pair in record.neighbors.windows(2) {
                assert!(pair[0].1 <= pair[1].1);
            }
        }
    }

    #[test]
    fn test_customer_without_transactions_is_skipped() {
        let matrix = fixture();
        let records =
            rank_lookalikes(&matrix, &["C0005".to_string(), "C0001".to_string()]).unwrap();

        // C0005 never appears in the transaction log: no record at all
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer_id, "C0001");
    }

    #[test]
    fn test_too_few_customers_is_a_precondition_error() {
        let customers = df!(CUSTOMER_KEY => &["C0001", "C0002"]).unwrap();
        let products = df!(PRODUCT_KEY => &["P001"]).unwrap();
        let transactions = df!(
            "TransactionID" => &["T1", "T2"],
            CUSTOMER_KEY => &["C0001", "C0002"],
            PRODUCT_KEY => &["P001", "P001"],
            "Quantity" => &[1.0, 2.0],
        )
        .unwrap();
        let matrix = build_interaction_matrix(&transactions, &customers, &products).unwrap();

        assert!(rank_lookalikes(&matrix, &["C0001".to_string()]).is_err());
    }

    #[test]
    fn test_lookalike_table_schema() {
        let matrix = fixture();
        let records = rank_lookalikes(&matrix, &["C0001".to_string()]).unwrap();
        let table = lookalike_table(&records).unwrap();

        assert_eq!(
            table.get_column_names(),
            vec!["CustomerID", "Lookalike1", "Score1", "Lookalike2", "Score2", "Lookalike3", "Score3"]
        );
        assert_eq!(table.height(), 1);
    }
}
