//! despike CLI - Spike detection and removal for line files
//!
//! Usage:
//!   despike-cli scan <input> [--threshold <deg>]
//!   despike-cli correct <input>... --output <dir> [--threshold <deg>] [--radius <units>]
//!
//! Inputs are GeoJSON (`.geojson`, `.json`) or GPX files. Corrected lines are
//! written to the next free `Cleaned_Lines_N.geojson` in the output directory.

use clap::{Parser, Subcommand};
use despike::{
    io::{
        open_source, DirectoryCatalog, FragmentWriter, GeoJsonWriter, OutputCatalog,
        SpatialReference, DEFAULT_OUTPUT_BASE_NAME,
    },
    CorrectionConfig, CorrectionResult, Corrector, Polyline,
};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "despike-cli")]
#[command(about = "Detect and remove sharp-angle spikes from polylines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (camelCase keys); flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List spike vertices without correcting
    Scan {
        /// Line files (GeoJSON or GPX)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Interior angle in degrees at or below which a vertex is a spike
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Remove spikes and write the cleaned lines
    Correct {
        /// Line files (GeoJSON or GPX)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for Cleaned_Lines_N.geojson
        #[arg(short, long)]
        output: PathBuf,

        /// Interior angle in degrees at or below which a vertex is a spike
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Exclusion radius around each spike, in map units
        #[arg(short, long)]
        radius: Option<f64>,

        /// Base name of the output file
        #[arg(long, default_value = DEFAULT_OUTPUT_BASE_NAME)]
        name: String,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Commands::Scan { inputs, threshold } => {
            if let Some(t) = threshold {
                config.angle_threshold = t;
            }
            run_scan(&inputs, config, cli.verbose)
        }
        Commands::Correct {
            inputs,
            output,
            threshold,
            radius,
            name,
        } => {
            if let Some(t) = threshold {
                config.angle_threshold = t;
            }
            if let Some(r) = radius {
                config.buffer_radius = r;
            }
            run_correct(&inputs, &output, &name, config, cli.verbose)
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load a JSON config file, or the defaults when none is given.
fn load_config(path: Option<&Path>) -> despike::Result<CorrectionConfig> {
    match path {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            Ok(serde_json::from_reader(reader)?)
        }
        None => Ok(CorrectionConfig::default()),
    }
}

/// Read every input and return the lines with the first known spatial reference.
fn load_lines(inputs: &[PathBuf], verbose: bool) -> despike::Result<(Vec<Polyline>, SpatialReference)> {
    println!("\n{}", "=".repeat(60));
    println!("Loading {} input files", inputs.len());
    println!("{}", "=".repeat(60));

    let mut lines = Vec::new();
    let mut spatial_reference = SpatialReference::unknown();

    for path in inputs {
        let source = open_source(path)?;
        let polylines = source.read_polylines()?;
        let srs = source.spatial_reference()?;

        let vertices: usize = polylines.iter().map(Polyline::point_count).sum();
        println!(
            "  [OK] {} - {} lines, {} vertices",
            path.display(),
            polylines.len(),
            vertices
        );
        if verbose {
            let multipart = polylines.iter().filter(|p| p.is_multipart()).count();
            println!("    Multipart lines: {}", multipart);
            println!("    Spatial reference: {:?}", srs.as_crs());
        }

        if !spatial_reference.is_known() && srs.is_known() {
            spatial_reference = srs;
        }
        lines.extend(polylines);
    }

    println!("\nLoaded {} lines", lines.len());
    Ok((lines, spatial_reference))
}

/// List spikes in the merged input.
fn run_scan(inputs: &[PathBuf], config: CorrectionConfig, verbose: bool) -> despike::Result<()> {
    let (lines, _) = load_lines(inputs, verbose)?;
    let threshold = config.angle_threshold;
    let corrector = Corrector::new(config)?;

    println!("\n{}", "=".repeat(60));
    println!("SPIKE SCAN (threshold {:.1}°)", threshold);
    println!("{}", "=".repeat(60));

    let (merged, scan) = corrector.detect(&lines)?;
    println!(
        "\n  Merged into {} parts, {} vertices",
        merged.part_count(),
        merged.point_count()
    );

    println!("\n{}", "-".repeat(60));
    println!("RESULTS: Found {} spikes", scan.spikes.len());
    println!("{}", "-".repeat(60));

    for (i, spike) in scan.spikes.iter().enumerate() {
        println!(
            "  {:>4}. ({:.4}, {:.4}) angle {:.2}° [part {}, vertex {}]",
            i + 1,
            spike.point.x,
            spike.point.y,
            spike.angle,
            spike.part,
            spike.index
        );
    }
    if scan.skipped_degenerate > 0 {
        println!(
            "\n  Skipped {} degenerate vertices",
            scan.skipped_degenerate
        );
    }

    Ok(())
}

/// Correct the inputs and write them to a new versioned output file.
fn run_correct(
    inputs: &[PathBuf],
    output_dir: &Path,
    base_name: &str,
    config: CorrectionConfig,
    verbose: bool,
) -> despike::Result<()> {
    let (lines, spatial_reference) = load_lines(inputs, verbose)?;

    println!("\n{}", "=".repeat(60));
    println!("SPIKE CORRECTION");
    println!("{}", "=".repeat(60));

    if verbose {
        println!("\n[Config]");
        println!("  angle_threshold: {}°", config.angle_threshold);
        println!("  buffer_radius: {}", config.buffer_radius);
        println!("  circle_segments: {}", config.circle_segments);
        println!("  degenerate_policy: {:?}", config.degenerate_policy);
        println!("  min_fragment_length: {}", config.min_fragment_length);
    }

    let corrector = Corrector::new(config)?;
    let result = corrector.correct(&lines)?;
    print_summary(&result, verbose);

    println!("\n[Export] Writing fragments to: {}", output_dir.display());
    let catalog = DirectoryCatalog::new(output_dir);
    let handle = catalog.create_output_target(base_name, &spatial_reference)?;
    GeoJsonWriter.write_fragments(&handle, &result.fragments)?;
    println!(
        "  Wrote {} fragments to {}",
        result.fragments.len(),
        handle.path.display()
    );

    Ok(())
}

fn print_summary(result: &CorrectionResult, verbose: bool) {
    let stats = &result.stats;

    println!("\n{}", "-".repeat(60));
    println!("RESULTS");
    println!("{}", "-".repeat(60));
    println!("  Input lines:        {}", stats.input_lines);
    println!("  Spikes found:       {}", stats.spike_count);
    println!("  Buffers built:      {}", stats.buffer_count);
    println!("  Fragments:          {}", stats.fragment_count);
    println!("  Final lines:        {}", stats.final_count);
    println!("  Total length:       {:.3}", result.total_length());
    if stats.skipped_degenerate > 0 {
        println!("  Degenerate skipped: {}", stats.skipped_degenerate);
    }
    if result.is_pass_through() {
        println!("\n  No exclusion zone applied, lines passed through unchanged");
    }

    if verbose {
        println!("\n  Spikes:");
        for spike in &result.spikes {
            println!(
                "    - ({:.4}, {:.4}) angle {:.2}°",
                spike.point.x, spike.point.y, spike.angle
            );
        }
    }
}
