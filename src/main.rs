// Import the clap Parser derive macro for CLI argument parsing
use clap::Parser;

// Import our library types
use pso_art::{FitnessNormalization, StepReport, Swarm, SwarmConfig, Triangle};

// Resizing the target before the run
use image::imageops::{self, FilterType};
use image::RgbaImage;

// Import indicatif for progress bars
use indicatif::{ProgressBar, ProgressStyle};

use serde::Serialize;

// Import standard library modules
use std::fs;
use std::path::{Path, PathBuf};

/// PSO Art - Approximate an image with translucent triangles
///
/// A swarm of candidate paintings flies through triangle space. Each particle
/// is pulled toward the best painting it has seen and the best the whole swarm
/// has seen, so the reconstruction sharpens step by step.
///
/// **Rust Concept: Derive macros for CLI parsing**
/// The doc comments on each field become the `--help` text.
#[derive(Parser)]
#[command(name = "pso-art")]
#[command(about = "Approximate images with triangles using particle swarm optimization", long_about = None)]
#[command(version)]
struct Args {
    /// Path to target image (PNG, JPEG, etc.)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for snapshots and best.json
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Number of swarm steps to run
    #[arg(short = 'g', long, default_value_t = 5000)]
    iterations: u64,

    /// Save an image every N steps
    #[arg(long, default_value_t = 100)]
    save_interval: u64,

    /// Larger targets are scaled down to fit a box of this size
    #[arg(long, default_value_t = 400)]
    max_size: u32,

    /// JSON configuration file; missing fields take their defaults
    ///
    /// Command-line overrides below win over the file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Number of threads for parallel evaluation (default: all cores)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Starting triangles per particle
    #[arg(short = 'n', long)]
    triangles: Option<usize>,

    /// Number of particles
    #[arg(short = 'p', long)]
    swarm_size: Option<usize>,

    /// Inertia weight
    #[arg(long)]
    inertia: Option<f64>,

    /// Pull toward each particle's own best
    #[arg(long)]
    cognitive: Option<f64>,

    /// Pull toward the swarm's best
    #[arg(long)]
    social: Option<f64>,

    /// Per-dimension velocity limit
    #[arg(long)]
    max_velocity: Option<f64>,

    /// Opacity ceiling, 0.1 to 1.0
    #[arg(long)]
    max_alpha: Option<f64>,

    /// How far vertices may leave the canvas, in pixels
    #[arg(long)]
    offscreen_margin: Option<f64>,

    /// Grow the triangle count when progress stalls
    #[arg(long)]
    incremental: bool,

    /// Steps per growth window
    #[arg(long)]
    growth_window: Option<u64>,

    /// Minimum improvement per growth window, in percent
    #[arg(long)]
    growth_percent: Option<f64>,

    /// Triangles added per growth event
    #[arg(long)]
    growth_increment: Option<usize>,

    /// Never grow past this many triangles
    #[arg(long)]
    max_triangles: Option<usize>,

    /// Steps without improvement before the worst particles are reseeded
    #[arg(long)]
    stagnation_window: Option<u64>,

    /// Fraction of the swarm reseeded by a kick
    #[arg(long)]
    reseed_fraction: Option<f64>,

    /// Keep survivors' velocity on a kick
    #[arg(long)]
    keep_velocity_on_kick: bool,

    /// Fitness divisor: per-pixel or per-channel
    #[arg(long)]
    normalization: Option<FitnessNormalization>,

    /// Evaluate particles on a single thread
    #[arg(long)]
    sequential: bool,
}

/// What ends up in best.json
#[derive(Serialize)]
struct BestSnapshot<'a> {
    iteration: u64,
    /// `None` when the last step was a growth step
    fitness: Option<f64>,
    width: u32,
    height: u32,
    triangles: &'a [Triangle],
}

fn main() {
    // Log level comes from RUST_LOG, e.g. RUST_LOG=info
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run the swarm with the given arguments
///
/// **Rust Concept: Box<dyn Error>**
/// Image, IO, JSON and swarm errors all convert into one boxed error, so `?`
/// works on every fallible call below.
fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(num_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("Using {} thread(s) for parallel evaluation", num_threads);
    }

    fs::create_dir_all(&args.output)?;

    if !args.input.exists() {
        return Err(format!("Input file not found: {}", args.input.display()).into());
    }
    println!("Loading target image: {}", args.input.display());
    let target = fit_to_box(image::open(&args.input)?.to_rgba8(), args.max_size);
    let (width, height) = target.dimensions();
    println!("Working size: {}x{}", width, height);

    let config = load_config(&args)?;
    println!("\nInitializing swarm...");
    println!("  Particles: {}", config.swarm_size);
    println!("  Triangles: {}", config.num_triangles);
    println!(
        "  w / c1 / c2: {} / {} / {}",
        config.inertia, config.cognitive, config.social
    );
    println!("  Growth: {}", if config.incremental_triangles { "on" } else { "off" });
    println!("  Normalization: {}", config.normalization);

    let mut swarm = match args.seed {
        Some(seed) => Swarm::with_seed(width, height, config, seed)?,
        None => Swarm::new(width, height, config)?,
    };
    swarm.set_target(target)?;

    let pb = ProgressBar::new(args.iterations);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} (ETA: {eta}) | {msg}")?
            .progress_chars("=>-"),
    );

    let save_interval = args.save_interval.max(1);
    let mut last = None;
    for _ in 0..args.iterations {
        let report = swarm.step()?;

        pb.set_message(progress_message(&report, swarm.num_triangles()));
        pb.inc(1);

        if report.iteration % save_interval == 0 || report.iteration == args.iterations {
            save_iteration(&swarm, &args.output, report.iteration)?;
        }
        last = Some(report);
    }

    pb.finish_with_message("Done!");

    save_best(&swarm, &args.output)?;

    println!("\nResults:");
    if let Some(report) = last {
        println!("  Final fitness: {:.2}", report.best_fitness);
    }
    println!("  Triangles: {}", swarm.num_triangles());
    println!("  Iterations: {}", swarm.iteration());
    println!("  Output directory: {}", args.output.display());

    Ok(())
}

/// Scale `image` down so neither side exceeds `max_size`, keeping the aspect ratio
fn fit_to_box(image: RgbaImage, max_size: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let max_size = max_size.max(1);
    if width <= max_size && height <= max_size {
        return image;
    }

    let scale = f64::from(max_size) / f64::from(width.max(height));
    let new_width = ((f64::from(width) * scale).round() as u32).max(1);
    let new_height = ((f64::from(height) * scale).round() as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Configuration from the optional JSON file, then the command-line overrides
fn load_config(args: &Args) -> Result<SwarmConfig, Box<dyn std::error::Error>> {
    let mut config: SwarmConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => SwarmConfig::default(),
    };

    if let Some(v) = args.triangles {
        config.num_triangles = v;
    }
    if let Some(v) = args.swarm_size {
        config.swarm_size = v;
    }
    if let Some(v) = args.inertia {
        config.inertia = v;
    }
    if let Some(v) = args.cognitive {
        config.cognitive = v;
    }
    if let Some(v) = args.social {
        config.social = v;
    }
    if let Some(v) = args.max_velocity {
        config.max_velocity = Some(v);
    }
    if let Some(v) = args.max_alpha {
        config.max_alpha = v;
    }
    if let Some(v) = args.offscreen_margin {
        config.offscreen_margin = v;
    }
    if args.incremental {
        config.incremental_triangles = true;
    }
    if let Some(v) = args.growth_window {
        config.triangle_stagnation_threshold = v;
    }
    if let Some(v) = args.growth_percent {
        config.triangle_stagnation_percent = v;
    }
    if let Some(v) = args.growth_increment {
        config.triangle_increment = v;
    }
    if let Some(v) = args.max_triangles {
        config.max_triangles_cap = v;
    }
    if let Some(v) = args.stagnation_window {
        config.stagnation_window = v;
    }
    if let Some(v) = args.reseed_fraction {
        config.reseed_fraction = v;
    }
    if args.keep_velocity_on_kick {
        config.velocity_reset_on_kick = false;
    }
    if let Some(v) = args.normalization {
        config.normalization = v;
    }
    if args.sequential {
        config.parallel_evaluation = false;
    }

    Ok(config.validate()?)
}

fn progress_message(report: &StepReport, num_triangles: usize) -> String {
    let mut message = format!("Best: {:.2}, Triangles: {}", report.best_fitness, num_triangles);
    if report.grown.is_some() {
        message.push_str(" (grew)");
    }
    if let Some(count) = report.reseeded {
        message.push_str(&format!(" (reseeded {})", count));
    }
    message
}

/// Save the current best as iteration_XXXXX.png and latest.png
fn save_iteration(
    swarm: &Swarm,
    output_dir: &Path,
    iteration: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(img) = swarm.render_best() else {
        return Ok(());
    };

    img.save(output_dir.join(format!("iteration_{:05}.png", iteration)))?;
    img.save(output_dir.join("latest.png"))?;
    Ok(())
}

/// Write the best triangle list and its score as best.json
fn save_best(swarm: &Swarm, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let Some(triangles) = swarm.best_triangles() else {
        return Ok(());
    };

    let (width, height) = swarm.dimensions();
    let fitness = swarm.best_fitness();
    let snapshot = BestSnapshot {
        iteration: swarm.iteration(),
        fitness: fitness.is_finite().then_some(fitness),
        width,
        height,
        triangles,
    };

    fs::write(
        output_dir.join("best.json"),
        serde_json::to_string_pretty(&snapshot)?,
    )?;
    Ok(())
}
