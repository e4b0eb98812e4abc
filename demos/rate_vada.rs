//! Rates a single photo and writes the annotated image, dashboard and JSON record.
//!
//! Run with: cargo run --release --example rate_vada -- <image_path> [output_dir]

use std::{env, path::Path, sync::Arc};

use vada_scope::{
    AnalysisConfig, VadaAnalyzer,
    error::Result,
    style_transfer::ResizeTransfer,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: {} <image_path> [output_dir]", args[0]);
        return Ok(());
    }

    let image_path = Path::new(&args[1]);
    let output_dir = args.get(2).map(|s| s.as_str()).unwrap_or("analyzed_results");

    let config = AnalysisConfig::default().with_output_dir(output_dir);
    let analyzer = VadaAnalyzer::new(Arc::new(ResizeTransfer::new())).with_config(config)?;

    let analysis = match analyzer.analyze_path(image_path) {
        Ok(analysis) => analysis,
        Err(err) if err.is_segmentation_failure() => {
            eprintln!("Could not analyze the vada. Please try a clearer image.");
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let scores = analysis.scores();
    println!("VPI-S:   {:.2} / 100", scores.vpi);
    println!("  Size:  {:.3}", scores.size);
    println!("  Shape: {:.3}", scores.shape);
    println!("  Hole:  {:.3}", scores.hole);
    println!("  Color: {:.3}", scores.color);

    let stem = &analysis.filename;
    let out = Path::new(output_dir);
    let report_path = out.join(format!("report_{}.png", stem));
    analysis.save_dashboard(&report_path)?;
    analysis.record().save(out.join(format!("{}.json", stem)))?;

    println!("Annotated image: {}", analysis.annotated_image_path.display());
    println!("Report:          {}", report_path.display());

    Ok(())
}
