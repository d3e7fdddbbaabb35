//! Interaction matrix construction from the joined transaction log

use std::collections::{BTreeSet, HashMap};

use log::debug;
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;

use crate::data::{CUSTOMER_KEY, PRODUCT_KEY};

/// Customer×product matrix of summed purchase quantities.
///
/// Rows and columns cover exactly the customers and products appearing in at
/// least one surviving transaction; all other cells are zero. Enumeration
/// order is sorted-id order and fixed for the run, so neighbor indices map
/// back to identifiers consistently. Immutable after construction.
#[derive(Debug)]
pub struct InteractionMatrix {
    /// (customers × products) quantity matrix.
    pub quantities: Array2<f64>,
    /// Row ids, sorted.
    pub customer_ids: Vec<String>,
    /// Column ids, sorted.
    pub product_ids: Vec<String>,
    row_index: HashMap<String, usize>,
}

impl InteractionMatrix {
    pub fn n_customers(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn n_products(&self) -> usize {
        self.product_ids.len()
    }

    /// Matrix row for a customer, or `None` if the customer had no
    /// surviving transactions.
    pub fn row_of(&self, customer_id: &str) -> Option<usize> {
        self.row_index.get(customer_id).copied()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.quantities.row(index)
    }
}

/// Build the interaction matrix from cleaned transactions and the two
/// reference tables.
///
/// Transactions referencing a customer or product absent from the reference
/// tables are silently dropped (inner-join policy, not an error). Surviving
/// quantities are summed per (customer, product) pair.
pub fn build_interaction_matrix(
    transactions: &DataFrame,
    customers: &DataFrame,
    products: &DataFrame,
) -> crate::Result<InteractionMatrix> {
    let known_customers = customers.clone().lazy().select([col(CUSTOMER_KEY)]);
    let known_products = products.clone().lazy().select([col(PRODUCT_KEY)]);

    let joined = transactions
        .clone()
        .lazy()
        .inner_join(known_customers, col(CUSTOMER_KEY), col(CUSTOMER_KEY))
        .inner_join(known_products, col(PRODUCT_KEY), col(PRODUCT_KEY))
        .group_by([col(CUSTOMER_KEY), col(PRODUCT_KEY)])
        .agg([col("Quantity").sum().alias("Quantity")])
        .collect()?;

    let customer_col = joined.column(CUSTOMER_KEY)?.str()?;
    let product_col = joined.column(PRODUCT_KEY)?.str()?;
    let quantity_col = joined.column("Quantity")?.f64()?;

    let customer_ids: Vec<String> = customer_col
        .into_no_null_iter()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let product_ids: Vec<String> = product_col
        .into_no_null_iter()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_owned)
        .collect();

    let row_index: HashMap<String, usize> = customer_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();
    let col_index: HashMap<&str, usize> = product_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut quantities = Array2::zeros((customer_ids.len(), product_ids.len()));
    for ((customer, product), quantity) in customer_col
        .into_no_null_iter()
        .zip(product_col.into_no_null_iter())
        .zip(quantity_col.into_no_null_iter())
    {
        quantities[[row_index[customer], col_index[product]]] += quantity;
    }

    debug!(
        "interaction matrix: {} customers x {} products from {} aggregated pairs",
        customer_ids.len(),
        product_ids.len(),
        joined.height()
    );

    Ok(InteractionMatrix {
        quantities,
        customer_ids,
        product_ids,
        row_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers_fixture() -> DataFrame {
        df!(CUSTOMER_KEY => &["C0001", "C0002", "C0003"]).unwrap()
    }

    fn products_fixture() -> DataFrame {
        df!(PRODUCT_KEY => &["P001", "P002"]).unwrap()
    }

    fn transactions_fixture() -> DataFrame {
        df!(
            "TransactionID" => &["T0001", "T0002", "T0003", "T0004", "T0005"],
            CUSTOMER_KEY => &["C0001", "C0001", "C0002", "C0999", "C0003"],
            PRODUCT_KEY => &["P001", "P001", "P002", "P001", "P999"],
            "Quantity" => &[2.0, 3.0, 4.0, 7.0, 9.0],
        )
        .unwrap()
    }

    #[test]
    fn test_aggregates_quantities_per_pair() {
        let matrix = build_interaction_matrix(
            &transactions_fixture(),
            &customers_fixture(),
            &products_fixture(),
        )
        .unwrap();

        let c1 = matrix.row_of("C0001").unwrap();
        let p1 = matrix.product_ids.iter().position(|p| p == "P001").unwrap();
        assert_eq!(matrix.quantities[[c1, p1]], 5.0);
    }

    #[test]
    fn test_join_mismatches_are_excluded() {
        let matrix = build_interaction_matrix(
            &transactions_fixture(),
            &customers_fixture(),
            &products_fixture(),
        )
        .unwrap();

        // T0004 references an unknown customer, T0005 an unknown product;
        // neither contributes to any total
        assert_eq!(matrix.row_of("C0999"), None);
        assert!(!matrix.product_ids.contains(&"P999".to_string()));
        assert_eq!(matrix.quantities.sum(), 9.0);
    }

    #[test]
    fn test_customers_without_transactions_have_no_row() {
        let matrix = build_interaction_matrix(
            &transactions_fixture(),
            &customers_fixture(),
            &products_fixture(),
        )
        .unwrap();

        // C0003's only transaction failed the product join
        assert_eq!(matrix.row_of("C0003"), None);
        assert_eq!(matrix.n_customers(), 2);
    }

    #[test]
    fn test_enumeration_order_is_sorted() {
        let matrix = build_interaction_matrix(
            &transactions_fixture(),
            &customers_fixture(),
            &products_fixture(),
        )
        .unwrap();

        assert_eq!(matrix.customer_ids, vec!["C0001", "C0002"]);
        assert_eq!(matrix.product_ids, vec!["P001", "P002"]);
    }
}
