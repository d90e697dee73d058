// ----------------------------------- CLI -----------------------------------
#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "tomorec", about = "Reconstruct slices from parallel-beam projections")]
pub struct Cli {

    /// TOML file describing the algorithm and its parameters
    #[clap(short, long, default_value = "recon-config.toml")]
    pub config: PathBuf,

    /// Sinogram to reconstruct: raw little-endian f64, angle-major
    #[clap(short, long)]
    pub input: Option<PathBuf>,

    /// Sinogram shape: angles, slices, detector pixels
    #[clap(short, long, value_parser = parse_triplet::<usize>, default_value = "180,1,128")]
    pub shape: (usize, usize, usize),

    /// Text file with one angle (radians) per projection. Defaults to equal
    /// steps over half a turn.
    #[clap(short, long)]
    pub angles: Option<PathBuf>,

    /// Reconstruct a simulated Shepp-Logan sinogram instead of reading `input`
    #[clap(long)]
    pub phantom: bool,

    /// Where to write the simulated sinogram, if `phantom` is used
    #[clap(long)]
    pub save_sinogram: Option<PathBuf>,

    /// Where to write the reconstructed volume
    #[clap(short, long, default_value = "recon.raw")]
    pub output: PathBuf,

    /// Give up if the reconstruction takes longer than this many seconds
    #[clap(long)]
    pub timeout: Option<u64>,

    /// Maximum number of rayon threads
    #[clap(short = 'j', long, default_value = "4")]
    pub num_threads: usize,

}

fn main() -> Result<(), Box<dyn Error>> {

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Cli::parse();
    let mut progress = Progress::new();

    let config = read_config_file(&args.config)?;
    let params = config.params()?;
    info!(algorithm = %config.algorithm, ?params, "read configuration {}", args.config.display());

    rayon::ThreadPoolBuilder::new().num_threads(args.num_threads).build_global()?;

    let (n_angles, n_slices, n) = args.shape;
    let angles = match &args.angles {
        Some(path) => io::read_angles(path)?,
        None       => uniform_angles(n_angles, PI),
    };

    let sinogram = if args.phantom {
        let volume = stack(shepp_logan(n).view(), n_slices);
        let sinogram = simulate(volume.view(), &angles, params.center)?;
        if let Some(path) = &args.save_sinogram {
            io::write_volume(sinogram.view(), path)?;
        }
        progress.done_with_message("Simulated Shepp-Logan sinogram");
        sinogram
    } else {
        let input = args.input.as_ref().ok_or("either --input or --phantom is required")?;
        let sinogram = io::read_volume(input, (angles.len(), n_slices, n))?;
        progress.done_with_message(&format!("Read sinogram {}", input.display()));
        sinogram
    };

    // --- Progress bar --------------------------------------------------------------
    let bar = ProgressBar::new(n_slices as u64).with_message(config.algorithm.to_string());
    bar.set_style(ProgressStyle::default_bar()
                  .template("Reconstructing with {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")?
    );
    bar.tick();

    let mut control = Control::default().with_progress(|_| bar.inc(1));
    if let Some(seconds) = args.timeout {
        control = control.with_deadline(Instant::now() + Duration::from_secs(seconds));
    }
    let volume = reconstruct_with(sinogram.view(), &angles, config.algorithm, &params, None, &control)?;
    bar.finish();
    progress.done_with_message("Reconstructed");

    io::write_volume(volume.view(), &args.output)?;
    progress.done_with_message(&format!("Wrote {}", args.output.display()));
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::{
    error::Error,
    f64::consts::PI,
    path::PathBuf,
    time::{Duration, Instant},
};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tomorec::{
    reconstruct_with, simulate, Control,
    config::read_config_file,
    io,
    phantom::{shepp_logan, stack, uniform_angles},
    utils::{parse_triplet, timing::Progress},
};
