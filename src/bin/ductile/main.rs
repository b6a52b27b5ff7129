//! Ductile CLI - interactive deformation scenarios from the command line.
//!
//! Usage: ductile [-v...] <COMMAND> [OPTIONS]
//!
//! Run `ductile --help` for available commands.

use std::io::Write;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::{Point3, Vector3};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ductile::mesh::generators::{cylinder, grid};
use ductile::mesh::MeshTopology;
use ductile::solver::{ArapEngine, ArapOptions, Progress};

#[derive(Parser)]
#[command(name = "ductile")]
#[command(author, version, about = "As-rigid-as-possible deformation CLI", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drag part of a generated mesh over several frames
    Drag {
        /// Mesh to deform
        #[arg(short, long, value_enum, default_value = "grid")]
        mesh: Shape,

        /// Grid quads per side, or radial segments of the cylinder
        #[arg(short, long, default_value = "16")]
        size: usize,

        /// Number of frames to spread the drag over
        #[arg(short, long, default_value = "10")]
        frames: usize,

        /// Local/global iterations per frame
        #[arg(short, long, default_value = "5")]
        iterations: usize,

        /// Total drag offset as X Y Z
        #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_negative_numbers = true, default_values_t = [0.5, 0.0, 0.5])]
        offset: Vec<f64>,

        /// Solve the first iteration of every frame with identity rotations
        #[arg(long)]
        cold_start: bool,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,

        /// Show a progress bar per frame
        #[arg(long)]
        progress: bool,
    },

    /// Print cotangent weight and Laplacian statistics for a generated grid
    Weights {
        /// Quads along X
        #[arg(long, default_value = "4")]
        cols: usize,

        /// Quads along Y
        #[arg(long, default_value = "4")]
        rows: usize,

        /// Grid spacing
        #[arg(long, default_value = "1.0")]
        spacing: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    /// Flat grid: one corner pinned, the opposite corner dragged
    Grid,
    /// Open tube: bottom ring anchored, top ring dragged
    Cylinder,
}

struct DragArgs {
    shape: Shape,
    size: usize,
    frames: usize,
    iterations: usize,
    offset: Vector3<f64>,
    cold_start: bool,
    sequential: bool,
    progress: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber from `RUST_LOG` or the verbosity flag.
fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "ductile=info",
            2 => "ductile=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Drag {
            mesh,
            size,
            frames,
            iterations,
            offset,
            cold_start,
            sequential,
            progress,
        } => {
            let offset = match offset.as_slice() {
                [x, y, z] => Vector3::new(*x, *y, *z),
                _ => return Err("offset takes exactly three values".into()),
            };
            cmd_drag(DragArgs {
                shape: mesh,
                size,
                frames,
                iterations,
                offset,
                cold_start,
                sequential,
                progress,
            })?;
        }

        Commands::Weights { cols, rows, spacing } => {
            cmd_weights(cols, rows, spacing)?;
        }
    }

    Ok(())
}

fn create_progress() -> Progress {
    Progress::new(move |current, total, phase| {
        if total == 0 {
            return;
        }

        let percent = (current * 100) / total;
        let bar_width = 20;
        let filled = (percent * bar_width) / 100;
        let bar: String = "=".repeat(filled);
        let space: String = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {:<20}", bar, space, percent, phase);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprint!("\r{:60}\r", "");
        }
    })
}

/// Smallest signed triangle area relative to the rest orientation.
///
/// Negative values mean a triangle has flipped.
fn min_signed_area(mesh: &MeshTopology, positions: &[Point3<f64>]) -> f64 {
    (0..mesh.num_faces())
        .map(|f| {
            let rest = mesh.face_area_vector(mesh.positions(), f);
            let now = mesh.face_area_vector(positions, f);
            match rest.try_normalize(f64::EPSILON) {
                Some(normal) => now.dot(&normal),
                None => now.norm(),
            }
        })
        .fold(f64::INFINITY, f64::min)
}

fn cmd_drag(args: DragArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = match args.shape {
        Shape::Grid => grid(args.size, args.size, 1.0 / args.size.max(1) as f64)?,
        Shape::Cylinder => cylinder(args.size, args.size, 0.5, 2.0)?,
    };

    println!(
        "Mesh: {} vertices, {} faces, {} edges",
        mesh.num_vertices(),
        mesh.num_faces(),
        mesh.num_edges()
    );
    let (min, max) = mesh.bounding_box();
    println!(
        "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
        min.x, min.y, min.z, max.x, max.y, max.z
    );

    let options = ArapOptions::default()
        .with_parallel(!args.sequential)
        .with_warm_start(!args.cold_start)
        .with_energy_tracking(true);

    let mut positions = mesh.positions().to_vec();
    let start = Instant::now();
    let mut engine = ArapEngine::new(mesh, options)?;
    println!("Setup: {:.2?}", start.elapsed());

    let n = positions.len();
    let dragged: Vec<usize> = match args.shape {
        Shape::Grid => {
            // Corner 0 is an anchor, the opposite corner a handle
            engine.cycle_constraint(0, &positions)?;
            engine.cycle_constraint(0, &positions)?;
            engine.toggle_constraint(n - 1, &positions)?;
            vec![n - 1]
        }
        Shape::Cylinder => {
            // Bottom ring becomes anchors, top ring stays as handles
            for v in 0..args.size {
                engine.cycle_constraint(v, &positions)?;
                engine.cycle_constraint(v, &positions)?;
            }
            for v in n - args.size..n {
                engine.toggle_constraint(v, &positions)?;
            }
            (n - args.size..n).collect()
        }
    };

    let mode = if args.sequential { "sequential" } else { "parallel" };
    println!(
        "Dragging {} handle(s) by ({:.3}, {:.3}, {:.3}) over {} frames ({} iterations, {})...",
        dragged.len(),
        args.offset.x,
        args.offset.y,
        args.offset.z,
        args.frames,
        args.iterations,
        mode
    );

    let frames = args.frames.max(1);
    let per_frame = args.offset / frames as f64;
    let progress = if args.progress { create_progress() } else { Progress::none() };

    let total = Instant::now();
    for frame in 1..=frames {
        engine.translate_handles(per_frame);

        let frame_start = Instant::now();
        let report = engine.step_with_progress(&mut positions, args.iterations, &progress)?;
        let elapsed = frame_start.elapsed();

        println!(
            "frame {:3}: {:>10.2?}  energy {:.6e}  min area {:.6e}{}",
            frame,
            elapsed,
            report.energy.unwrap_or(0.0),
            min_signed_area(engine.topology(), &positions),
            if report.refactorized { "  (refactorized)" } else { "" }
        );
    }

    println!("Total: {:.2?} ({} factorization(s))", total.elapsed(), engine.rebuild_count());
    Ok(())
}

fn cmd_weights(cols: usize, rows: usize, spacing: f64) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = grid(cols, rows, spacing)?;
    let engine = ArapEngine::new(mesh, ArapOptions::default())?;
    let weights = engine.fan_weights();
    let laplacian = engine.laplacian();

    println!("Grid: {}x{} quads, spacing {}", cols, rows, spacing);
    println!("Vertices: {}", weights.num_vertices());
    println!("Directed edges: {}", weights.entries().len());

    let mut zero = 0usize;
    let mut min_weight = f64::MAX;
    let mut max_weight = 0.0_f64;
    for entry in weights.entries() {
        if entry.weight == 0.0 {
            zero += 1;
        }
        min_weight = min_weight.min(entry.weight);
        max_weight = max_weight.max(entry.weight);
    }
    println!("Weight range: [{:.6}, {:.6}]", min_weight, max_weight);
    println!("Zero-weight edges: {}", zero / 2);

    let max_row_sum = (0..laplacian.nrows())
        .map(|i| laplacian.row_sum(i).abs())
        .fold(0.0_f64, f64::max);
    println!("Laplacian: {}x{}, {} non-zeros", laplacian.nrows(), laplacian.ncols(), laplacian.nnz());
    println!("Symmetric: {}", laplacian.is_symmetric(1e-12));
    println!("Max |row sum|: {:.3e}", max_row_sum);

    let (min_diag, max_diag) = (0..laplacian.nrows())
        .map(|i| laplacian.diagonal(i))
        .fold((f64::MAX, 0.0_f64), |(lo, hi), d| (lo.min(d), hi.max(d)));
    println!("Diagonal range: [{:.6}, {:.6}]", min_diag, max_diag);

    Ok(())
}
