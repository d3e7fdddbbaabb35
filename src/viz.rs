//! Visualization functions using Plotters for segmentation analysis

use plotters::prelude::*;

use crate::features::SpendProfile;
use crate::model::Segmentation;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 10] = [
    RGBColor(230, 25, 75),
    RGBColor(0, 130, 200),
    RGBColor(60, 180, 75),
    RGBColor(245, 130, 48),
    RGBColor(145, 30, 180),
    RGBColor(70, 240, 240),
    RGBColor(240, 50, 230),
    RGBColor(170, 110, 40),
    RGBColor(128, 128, 0),
    RGBColor(0, 0, 128),
];

fn cluster_color(cluster: usize) -> &'static RGBColor {
    CLUSTER_COLORS.get(cluster).unwrap_or(&BLACK)
}

/// Scatter plot of the scaled spend features colored by cluster, with
/// centroid markers.
pub fn create_segment_scatter(
    segmentation: &Segmentation,
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    let title = plot_title.unwrap_or("Customer Segments: Spend vs Transactions");

    let scaled = &segmentation.scaled;
    let labels = &segmentation.labels;

    let spend_values: Vec<f64> = scaled.column(0).to_vec();
    let count_values: Vec<f64> = scaled.column(1).to_vec();

    // Plot bounds with some padding
    let x_min = spend_values.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let x_max = spend_values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;
    let y_min = count_values.iter().fold(f64::INFINITY, |a, &b| a.min(b)) - 0.5;
    let y_max = count_values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)) + 0.5;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Total Spend (standardized)")
        .y_desc("Transaction Count (standardized)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, (&x, &y)) in spend_values.iter().zip(count_values.iter()).enumerate() {
        let color = cluster_color(labels[i]);
        chart.draw_series(std::iter::once(Circle::new((x, y), 4, color.filled())))?;
    }

    // Centroids as larger squares
    let cluster_sizes = segmentation.cluster_sizes();
    for (cluster_id, centroid) in segmentation.centroids.outer_iter().enumerate() {
        let (cx, cy) = (centroid[0], centroid[1]);
        let color = cluster_color(cluster_id);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(cx - 0.1, cy - 0.1), (cx + 0.1, cy + 0.1)],
                color.filled(),
            )))?
            .label(format!("Cluster {} ({} customers)", cluster_id, cluster_sizes[cluster_id]))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart.configure_series_labels().draw()?;
    root.present()?;

    Ok(())
}

/// Bar chart of customers per cluster.
pub fn create_cluster_size_chart(segmentation: &Segmentation, output_path: &str) -> crate::Result<()> {
    let cluster_sizes = segmentation.cluster_sizes();
    let max_size = *cluster_sizes.iter().max().unwrap_or(&1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(segmentation.chosen_k as f64), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster ID")
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (cluster_id, &size) in cluster_sizes.iter().enumerate() {
        let color = cluster_color(cluster_id);
        chart.draw_series(std::iter::once(Rectangle::new(
            [
                (cluster_id as f64 - 0.4 + 0.5, 0.0),
                (cluster_id as f64 + 0.4 + 0.5, size as f64),
            ],
            color.filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Histogram of raw per-customer total spend.
pub fn create_spend_histogram(profile: &SpendProfile, output_path: &str) -> crate::Result<()> {
    let spend: Vec<f64> = profile.raw.column(0).to_vec();
    if spend.is_empty() {
        anyhow::bail!("cannot plot a spend distribution for an empty profile");
    }

    let min = spend.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = spend.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let bins = 20usize;
    // a constant column still gets a drawable axis span
    let width = (max - min).max(1.0) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &value in &spend {
        let bin = (((value - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let max_count = *counts.iter().max().unwrap_or(&1) as f64;

    let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Total Spend Distribution", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(min..(min + width * bins as f64), 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Total Spend")
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (bin, &count) in counts.iter().enumerate() {
        let x0 = min + bin as f64 * width;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, 0.0), (x0 + width, count as f64)],
            BLUE.mix(0.6).filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Print segmentation statistics to console
pub fn print_segmentation_report(profile: &SpendProfile, segmentation: &Segmentation) {
    println!("\n=== Segmentation Report ===");
    println!("Customers segmented: {}", profile.len());
    println!(
        "Chosen cluster count: {} (Davies-Bouldin {:.4})",
        segmentation.chosen_k, segmentation.davies_bouldin
    );
    println!("Within-cluster sum of squares (Inertia): {:.2}", segmentation.inertia);

    println!("\nCandidate scores:");
    println!("  k  | Davies-Bouldin | Inertia");
    println!("  ---|----------------|--------");
    for candidate in &segmentation.candidates {
        println!(
            "  {:2} | {:14.4} | {:.2}",
            candidate.k, candidate.davies_bouldin, candidate.inertia
        );
    }

    let cluster_sizes = segmentation.cluster_sizes();
    println!("\nCluster sizes:");
    for (i, &size) in cluster_sizes.iter().enumerate() {
        let percentage = (size as f64 / profile.len() as f64) * 100.0;
        println!("  Cluster {}: {} customers ({:.1}%)", i, size, percentage);
    }

    println!("\nCluster centroids (standardized):");
    println!("  Cluster | TotalSpend | TransactionCount");
    println!("  --------|------------|------------------");
    for (i, centroid) in segmentation.centroids.outer_iter().enumerate() {
        println!("  {:7} | {:10.2} | {:16.2}", i, centroid[0], centroid[1]);
    }
}

/// Generate the full chart set next to `base_output_path` and print the
/// console report.
pub fn generate_visualization_report(
    profile: &SpendProfile,
    segmentation: &Segmentation,
    base_output_path: &str,
) -> crate::Result<()> {
    create_segment_scatter(segmentation, base_output_path, None)?;

    let size_chart_path = base_output_path.replace(".png", "_sizes.png");
    create_cluster_size_chart(segmentation, &size_chart_path)?;

    let spend_chart_path = base_output_path.replace(".png", "_spend.png");
    create_spend_histogram(profile, &spend_chart_path)?;

    print_segmentation_report(profile, segmentation);

    Ok(())
}
