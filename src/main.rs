//! SegMatch: customer lookalike matching and spend segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, lookalike
//! ranking, cluster-count selection, and reporting.

use anyhow::Result;
use clap::Parser;
use segmatch::{
    build_interaction_matrix, build_spend_profiles, data, lookalike_table, rank_lookalikes,
    segment_customers, segment_table, viz, Args,
};
use std::time::Instant;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    if args.verbose {
        println!("SegMatch - Customer Lookalikes and Segmentation");
        println!("===============================================\n");
    }

    run_pipeline(&args)
}

/// Run the full pipeline: both branches consume the same cleaned snapshot
/// and neither reads the other's output.
fn run_pipeline(args: &Args) -> Result<()> {
    println!("=== Customer Analytics Pipeline ===\n");

    let start_time = Instant::now();

    // Step 1: Load the three source tables
    if args.verbose {
        println!("Step 1: Loading source tables");
        println!("  Customers: {}", args.customers);
        println!("  Products: {}", args.products);
        println!("  Transactions: {}", args.transactions);
    }

    let load_start = Instant::now();
    let customers = data::load_customers(&args.customers)?;
    let products = data::load_products(&args.products)?;
    let transactions = data::load_transactions(&args.transactions)?;
    let load_time = load_start.elapsed();

    println!(
        "✓ Data loaded: {} customers, {} products, {} transactions",
        customers.height(),
        products.height(),
        transactions.height()
    );
    if args.verbose {
        println!("  Loading time: {:.2}s", load_time.as_secs_f64());
    }

    // Step 2: Lookalike branch
    if args.verbose {
        println!("\nStep 2: Lookalike ranking");
        println!("  Scored customers: first {}", args.lookalike_targets);
    }

    let lookalike_start = Instant::now();
    let matrix = build_interaction_matrix(&transactions, &customers, &products)?;
    let targets: Vec<String> = data::key_column(&customers, data::CUSTOMER_KEY)?
        .into_iter()
        .take(args.lookalike_targets)
        .collect();
    let records = rank_lookalikes(&matrix, &targets)?;
    let mut table = lookalike_table(&records)?;
    data::write_csv(&mut table, &args.lookalike_out)?;
    let lookalike_time = lookalike_start.elapsed();

    println!(
        "✓ Lookalikes ranked: {} of {} designated customers had transactions",
        records.len(),
        targets.len()
    );
    println!("  Saved to: {}", args.lookalike_out);
    if args.verbose {
        println!(
            "  Interaction matrix: {} customers x {} products",
            matrix.n_customers(),
            matrix.n_products()
        );
        println!("  Ranking time: {:.2}s", lookalike_time.as_secs_f64());
    }

    // Step 3: Segmentation branch
    if args.verbose {
        println!("\nStep 3: Spend segmentation");
        println!("  Candidate cluster counts: {}..={}", args.k_min, args.k_max);
        println!("  Seed: {}", args.seed);
    }

    let segment_start = Instant::now();
    let profile = build_spend_profiles(&transactions)?;
    let params = args.segmentation_params()?;
    let segmentation = segment_customers(&profile, &params)?;
    let mut assignments = segment_table(&profile, &segmentation)?;
    data::write_csv(&mut assignments, &args.segments_out)?;
    let segment_time = segment_start.elapsed();

    println!(
        "✓ Segmentation complete: k={} chosen (Davies-Bouldin {:.4})",
        segmentation.chosen_k, segmentation.davies_bouldin
    );
    println!("  Saved to: {}", args.segments_out);
    if args.verbose {
        println!("  Fitting time: {:.2}s", segment_time.as_secs_f64());
        println!("  Inertia: {:.2}", segmentation.inertia);
    }

    // Step 4: Reporting
    if args.skip_plots {
        viz::print_segmentation_report(&profile, &segmentation);
    } else {
        if args.verbose {
            println!("\nStep 4: Generating visualizations");
            println!("  Output file: {}", args.plot);
        }
        viz::generate_visualization_report(&profile, &segmentation, &args.plot)?;
        println!("\n✓ Charts saved next to: {}", args.plot);
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}
