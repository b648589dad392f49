//! Crosswind Initial Guess
//!
//! Builds the crosswind power-orbit problem, fills in an initial guess
//! (from a trajectory file or a circular orbit), reports its feasibility and
//! publishes one telemetry snapshot of it.
//!
//! ```text
//! cargo run --example crosswind_guess -- [config.toml] [guess.txt]
//! ```
//!
//! A guess file holds one `[x, y, z, dx, dy, dz, r, dr, winch_energy, ddr,
//! cL, roll]` row per line and is resampled onto the horizon.

use std::error::Error;

use tracing::info;

use rawe_ocp::models::{crosswind_dae, KiteParams};
use rawe_ocp::scenarios::{crosswind_ocp, CircleGuess};
use rawe_ocp::telemetry::ChannelPublisher;
use rawe_ocp::{
    interpolate_guess, parse_guess_trajectory, IterationCallback, MultiCarousel, OcpConfig,
    TelemetryCallback,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => OcpConfig::load(path)?,
        None => OcpConfig::default(),
    };
    let guess_path = args.next();

    println!("=== Crosswind Initial Guess ===\n");

    info!("creating model");
    let dae = crosswind_dae(&KiteParams::default(), &config.carousel)?;
    let mut ocp = crosswind_ocp(&dae, &config)?;
    let nk = ocp.nk();

    match guess_path {
        Some(path) => {
            info!(path = %path, "loading initial guess");
            let text = std::fs::read_to_string(&path)?;
            let rows = interpolate_guess(&parse_guess_trajectory(&text)?, nk)?;
            ocp.guess_trajectory(&rows)?;
        }
        None => CircleGuess::default().apply(&mut ocp)?,
    }

    let missing = ocp.missing_guesses();
    if !missing.is_empty() {
        println!("Missing guesses: {missing}");
    }

    let nlp = ocp.build_nlp()?;
    let compiled = nlp.compile()?;
    let x0 = nlp.x0.as_slice();
    println!("Intervals:         {nk}");
    println!("Decision vars:     {}", nlp.num_decision());
    println!("Constraints:       {}", nlp.num_constraints());
    println!("Objective @ guess: {:.6}", compiled.objective(x0)?);
    println!("Max violation:     {:.3e}", nlp.max_violation(&compiled, x0)?);

    let guess = ocp.devectorize(x0)?;
    let tension = guess.series("tension")?;
    let peak = tension.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    println!("Peak tension:      {peak:.1} N");

    let (publisher, rx) = ChannelPublisher::new();
    let mut telemetry = TelemetryCallback::new(
        ocp.layout().clone(),
        publisher,
        config.carousel.clone(),
        config.telemetry.clone(),
    )
    .with_parameters(["endTime", "w0"]);
    telemetry.on_iteration(0, x0);

    if let Ok((topic, payload)) = rx.try_recv() {
        let snapshot = MultiCarousel::from_bytes(&payload)?;
        println!(
            "\nPublished {} bytes on \"{}\": {} frames, messages {:?}",
            payload.len(),
            topic,
            snapshot.frames.len(),
            snapshot.messages
        );
    }

    Ok(())
}
