//! SegMatch: customer lookalike matching and spend-based segmentation
//!
//! The pipeline joins three transaction-log tables (customers, products,
//! transactions) and produces two artifacts: a per-customer top-3 lookalike
//! ranking over a customer×product interaction matrix, and a behavioral
//! segmentation whose cluster count is selected automatically by the
//! Davies-Bouldin index.

pub mod cli;
pub mod data;
pub mod features;
pub mod matrix;
pub mod model;
pub mod similarity;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use features::{build_spend_profiles, SpendProfile, StandardScaler};
pub use matrix::{build_interaction_matrix, InteractionMatrix};
pub use model::{segment_customers, segment_table, Segmentation, SegmentationParams};
pub use similarity::{cosine_distance, lookalike_table, rank_lookalikes, Lookalike, LOOKALIKE_COUNT};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
