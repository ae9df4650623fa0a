//! Integration tests for concurrent catalog loading.
//!
//! Loads run against an in-memory fetcher that sleeps a random amount per
//! request, so completion order differs from request order on every run.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use driftboard::asset::{load, ClipSpec, DirFetcher, Fetch, FetchError, LoadError, BEAT_VARIANTS};

const RATE: u32 = 22050;

/// Stereo float WAV whose every sample equals `value`.
fn wav(value: f32, frames: usize, rate: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::new(&mut buf, spec).unwrap();
    for _ in 0..frames * 2 {
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
    buf.into_inner()
}

/// Speech for clip `i` is tagged `i`, beat `v` of clip `i` is tagged `i + v / 10`.
fn speech_tag(i: usize) -> f32 {
    i as f32
}

fn beat_tag(i: usize, v: usize) -> f32 {
    i as f32 + (v as f32 + 1.0) / 10.0
}

struct JitterFetcher {
    files: HashMap<String, Vec<u8>>,
    rng: Mutex<ChaCha8Rng>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl JitterFetcher {
    fn new(clips: &[ClipSpec], seed: u64) -> Self {
        let mut files = HashMap::new();
        for (i, clip) in clips.iter().enumerate() {
            files.insert(clip.speech_resource(), wav(speech_tag(i), 8 + i, RATE));
            if clip.beats {
                for v in 0..BEAT_VARIANTS {
                    files.insert(clip.beat_resource(v), wav(beat_tag(i, v), 4, RATE));
                }
            }
        }
        Self {
            files,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl Fetch for JitterFetcher {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = self.rng.lock().gen_range(0..8);
        thread::sleep(Duration::from_millis(delay));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.files
            .get(resource)
            .cloned()
            .ok_or_else(|| FetchError::Empty {
                location: resource.to_string(),
            })
    }

    fn locate(&self, resource: &str) -> String {
        format!("jitter://{resource}")
    }
}

fn clips() -> Vec<ClipSpec> {
    (0..12)
        .map(|i| ClipSpec::new(format!("clip{i}"), i % 3 != 0))
        .collect()
}

#[test]
fn names_and_assets_stay_aligned_under_random_delays() {
    let clips = clips();
    for seed in 0..10 {
        let fetcher = JitterFetcher::new(&clips, seed);
        let catalog = load(&clips, &fetcher, 6).unwrap();

        assert_eq!(catalog.len(), clips.len());
        for (i, clip) in clips.iter().enumerate() {
            assert_eq!(catalog.name(i), Some(clip.name.as_str()));
            let speech = catalog.speech(i).unwrap();
            assert_eq!(speech.frames()[0][0], speech_tag(i));
            assert_eq!(speech.len(), 8 + i);

            match catalog.beats(i) {
                Some(set) => {
                    assert!(clip.beats);
                    assert_eq!(set.len(), BEAT_VARIANTS);
                    for (v, beat) in set.iter().enumerate() {
                        assert_eq!(beat.frames()[0][1], beat_tag(i, v));
                        assert_eq!(beat.sample_rate(), catalog.sample_rate());
                    }
                }
                None => assert!(!clip.beats),
            }
        }
    }
}

#[test]
fn loads_run_concurrently() {
    let clips = clips();
    let fetcher = JitterFetcher::new(&clips, 99);
    load(&clips, &fetcher, 4).unwrap();
    assert!(fetcher.peak.load(Ordering::SeqCst) > 1);
}

#[test]
fn single_worker_still_loads_everything() {
    let clips = clips();
    let fetcher = JitterFetcher::new(&clips, 3);
    let catalog = load(&clips, &fetcher, 1).unwrap();
    assert_eq!(catalog.len(), 12);
    assert_eq!(catalog.beat_clips(), 8);
}

#[test]
fn any_missing_asset_aborts_the_whole_load() {
    let clips = clips();
    let mut fetcher = JitterFetcher::new(&clips, 5);
    fetcher.files.remove("clip7.wav");

    let err = load(&clips, &fetcher, 6).unwrap_err();
    match &err {
        LoadError::Fetch { asset, .. } => assert_eq!(asset, "jitter://clip7.wav"),
        other => panic!("expected fetch failure, got {other}"),
    }
    assert!(err.to_string().contains("clip7.wav"));
}

#[test]
fn loads_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hum.wav"), wav(0.5, 10, RATE)).unwrap();
    for n in 1..=4 {
        std::fs::write(dir.path().join(format!("hum{n}.wav")), wav(0.25, 6, RATE)).unwrap();
    }
    std::fs::write(dir.path().join("hiss.wav"), wav(0.1, 3, RATE)).unwrap();

    let clips = vec![ClipSpec::new("hum", true), ClipSpec::new("hiss", false)];
    let catalog = load(&clips, &DirFetcher::new(dir.path()), 2).unwrap();

    assert_eq!(catalog.sample_rate(), RATE);
    assert_eq!(catalog.speech(0).unwrap().len(), 10);
    assert_eq!(catalog.beats(0).unwrap()[3].len(), 6);
    assert!(catalog.beats(1).is_none());
}
