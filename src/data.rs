//! CSV ingestion and egress for the three source tables using Polars

use log::debug;
use polars::prelude::*;

/// Key column of the customers table, also the transaction foreign key.
pub const CUSTOMER_KEY: &str = "CustomerID";
/// Key column of the products table, also the transaction foreign key.
pub const PRODUCT_KEY: &str = "ProductID";
/// Key column of the transactions table.
pub const TRANSACTION_KEY: &str = "TransactionID";

fn read_csv(path: &str) -> crate::Result<DataFrame> {
    let df = CsvReader::from_path(path)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", path, e))?
        .has_header(true)
        .finish()
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path, e))?;
    Ok(df)
}

fn require_columns(df: &DataFrame, columns: &[&str], table: &str) -> crate::Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| df.column(c).is_err())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("{} table is missing required columns: {}", table, missing.join(", "));
    }
    Ok(())
}

/// Load the customers table. Rows without a customer id are dropped; the key
/// column is normalized to string. Descriptive columns (name, region, signup
/// date) pass through untouched.
pub fn load_customers(path: &str) -> crate::Result<DataFrame> {
    let df = read_csv(path)?;
    require_columns(&df, &[CUSTOMER_KEY], "customers")?;
    let total = df.height();
    let df = df
        .lazy()
        .filter(col(CUSTOMER_KEY).is_not_null())
        .with_columns([col(CUSTOMER_KEY).cast(DataType::String)])
        .collect()?;
    debug!("customers: kept {} of {} rows", df.height(), total);
    Ok(df)
}

/// Load the products table. Same cleaning policy as [`load_customers`].
pub fn load_products(path: &str) -> crate::Result<DataFrame> {
    let df = read_csv(path)?;
    require_columns(&df, &[PRODUCT_KEY], "products")?;
    let total = df.height();
    let df = df
        .lazy()
        .filter(col(PRODUCT_KEY).is_not_null())
        .with_columns([col(PRODUCT_KEY).cast(DataType::String)])
        .collect()?;
    debug!("products: kept {} of {} rows", df.height(), total);
    Ok(df)
}

/// Load and clean the transaction log.
///
/// Rows with null keys, null amounts, or negative quantity/price are
/// dropped. Zero-quantity rows are kept. The derived `TotalValue`
/// (`Quantity × Price`) column is materialized here so every downstream
/// consumer sees the same values.
pub fn load_transactions(path: &str) -> crate::Result<DataFrame> {
    let df = read_csv(path)?;
    require_columns(
        &df,
        &[TRANSACTION_KEY, CUSTOMER_KEY, PRODUCT_KEY, "Quantity", "Price"],
        "transactions",
    )?;
    let total = df.height();
    let df = df
        .lazy()
        .filter(
            col(CUSTOMER_KEY)
                .is_not_null()
                .and(col(PRODUCT_KEY).is_not_null())
                .and(col("Quantity").is_not_null())
                .and(col("Price").is_not_null())
                .and(col("Quantity").gt_eq(lit(0)))
                .and(col("Price").gt_eq(lit(0.0))),
        )
        .with_columns([
            col(CUSTOMER_KEY).cast(DataType::String),
            col(PRODUCT_KEY).cast(DataType::String),
            col("Quantity").cast(DataType::Float64),
            col("Price").cast(DataType::Float64),
        ])
        .with_columns([(col("Quantity") * col("Price")).alias("TotalValue")])
        .collect()?;
    debug!("transactions: kept {} of {} rows after cleaning", df.height(), total);
    Ok(df)
}

/// Extract a string key column in table row order.
pub fn key_column(df: &DataFrame, key: &str) -> crate::Result<Vec<String>> {
    let ids = df
        .column(key)?
        .str()?
        .into_no_null_iter()
        .map(str::to_owned)
        .collect();
    Ok(ids)
}

/// Write a result table as CSV, the pipeline's only persistence format.
pub fn write_csv(df: &mut DataFrame, path: &str) -> crate::Result<()> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| anyhow::anyhow!("failed to create {}: {}", path, e))?;
    CsvWriter::new(&mut file).finish(df)?;
    Ok(())
}
