//! Driftboard — plays an endless collage of spoken clips over beat loops.
//!
//! Loads every clip up front, opens the default output device at the
//! catalog's sample rate, then runs the scheduler on its own thread while the
//! main thread renders blocks for the device. Ctrl-C stops selecting new
//! clips and lets the mix play out; a second Ctrl-C quits immediately.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use driftboard::asset::{self, DirFetcher, Fetch, HttpFetcher};
use driftboard::audio::{AudioEngine, Limiter, Renderer};
use driftboard::config::Config;
use driftboard::schedule::{Levels, Periods, Scheduler};
use driftboard::stream::{Clock, Mixer};

#[derive(Debug, Parser)]
#[command(version, about = "A generative soundboard")]
struct Args {
    /// Config file (default: ~/.driftboard/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// HTTP root serving the clip WAVs
    #[arg(long)]
    base_url: Option<String>,
    /// Local directory holding the clip WAVs
    #[arg(long)]
    asset_dir: Option<PathBuf>,
    /// RNG seed for reproducible selections
    #[arg(long)]
    seed: Option<u64>,
    /// Master volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(dir) = &args.asset_dir {
        config.asset_dir = Some(dir.clone());
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(volume) = args.volume {
        config.master_volume = volume;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    log::info!("driftboard v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&args)?;

    let fetcher: Box<dyn Fetch> = match &config.asset_dir {
        Some(dir) => Box::new(DirFetcher::new(dir)),
        None => Box::new(HttpFetcher::new(config.base_url.clone())),
    };
    let catalog = asset::load(&config.clip_specs(), fetcher.as_ref(), config.load_workers)
        .context("loading clip catalog")?;
    let catalog = Arc::new(catalog);
    let sample_rate = catalog.sample_rate();

    let mut engine = AudioEngine::new(
        sample_rate,
        config.queue_blocks,
        Limiter::new(config.limiter_ceiling),
    )
    .context("starting audio output")?;
    engine.set_volume(config.master_volume)?;

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let periods = Periods::draw(&mut rng, &config.modulation);

    let clock = Clock::new(sample_rate);
    let mixer = Mixer::new();
    let mixer_handle = mixer.handle();
    let mut scheduler = Scheduler::new(
        Arc::clone(&catalog),
        mixer.handle(),
        clock.clone(),
        periods,
        Levels::from_config(&config.modulation),
        rng,
    );

    let stopping = Arc::new(AtomicBool::new(false));
    let presses = AtomicUsize::new(0);
    let shutdown = scheduler.shutdown_handle();
    let flag = Arc::clone(&stopping);
    ctrlc::set_handler(move || {
        if presses.fetch_add(1, Ordering::SeqCst) == 0 {
            log::info!("stopping: letting the current clips finish (Ctrl-C again to quit)");
            flag.store(true, Ordering::SeqCst);
            shutdown.shutdown();
        } else {
            std::process::exit(130);
        }
    })
    .context("installing Ctrl-C handler")?;

    let worker = thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || scheduler.run())
        .context("spawning scheduler thread")?;

    let mut renderer = Renderer::new(mixer, clock, config.block_frames(sample_rate));
    let block_frames = renderer.block_frames();
    let block_duration = Duration::from_secs_f64(block_frames as f64 / sample_rate as f64);
    log::info!(
        "rendering {block_frames}-frame blocks ({:.1} ms)",
        block_duration.as_secs_f64() * 1000.0
    );

    let mut underruns = 0;
    loop {
        let seen = engine.underruns();
        if seen > underruns {
            log::warn!("audio underrun: {seen} device callbacks starved so far");
            underruns = seen;
        }

        if worker.is_finished() {
            if !stopping.load(Ordering::SeqCst) {
                break;
            }
            if mixer_handle.is_idle() {
                break;
            }
        }
        if engine.has_room() {
            engine.send_block(renderer.render_block())?;
        } else {
            thread::sleep(block_duration / 4);
        }
    }

    let selections = match worker.join() {
        Ok(result) => result.context("scheduler failed")?,
        Err(_) => bail!("scheduler thread panicked"),
    };
    if !stopping.load(Ordering::SeqCst) {
        bail!("scheduler exited unexpectedly after {selections} selections");
    }

    // Let the queued blocks reach the speakers.
    let queued = u32::try_from(config.queue_blocks.saturating_add(1)).unwrap_or(u32::MAX);
    thread::sleep(block_duration.saturating_mul(queued));
    log::info!(
        "done: {selections} clips played, {} stream errors, {} underruns, {} clipped samples",
        renderer.errors(),
        engine.underruns(),
        engine.clipped()
    );
    Ok(())
}
