//! Clip catalog — concurrent loading into index-aligned parallel arrays.
//!
//! Every requested clip has a speech asset and, if flagged beat-capable,
//! exactly [`BEAT_VARIANTS`] beat loops. Loading fans out across a bounded
//! worker pool: one task per clip, with the speech decode and each beat
//! variant running concurrently inside it. Tasks hand their finished
//! [`Entry`] to a [`CatalogBuilder`], whose only shared state is a single
//! mutex-guarded append; [`CatalogBuilder::finish`] then lays entries out in
//! request order. Index `i` of the finished [`Catalog`] therefore always
//! refers to the `i`-th requested name, whatever order the loads completed in.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;

use super::fetch::{Fetch, FetchError};
use super::{Asset, DecodeError};

/// Beat variants per beat-capable clip.
pub const BEAT_VARIANTS: usize = 4;

/// The beat loops belonging to one clip.
pub type BeatSet = [Arc<Asset>; BEAT_VARIANTS];

/// Errors raised while loading the catalog. All of them are fatal.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no clips requested")]
    NoClips,
    #[error("failed to fetch `{asset}`: {source}")]
    Fetch {
        asset: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to decode `{asset}`: {source}")]
    Decode {
        asset: String,
        #[source]
        source: DecodeError,
    },
    #[error("`{asset}` is {found} Hz but the catalog plays at {expected} Hz")]
    SampleRateMismatch {
        asset: String,
        expected: u32,
        found: u32,
    },
    #[error("clip `{name}` was never loaded")]
    Missing { name: String },
    #[error("cannot start loader pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// A clip to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSpec {
    pub name: String,
    pub beats: bool,
}

impl ClipSpec {
    pub fn new(name: impl Into<String>, beats: bool) -> Self {
        Self {
            name: name.into(),
            beats,
        }
    }

    /// Resource name of the speech asset.
    pub fn speech_resource(&self) -> String {
        format!("{}.wav", self.name)
    }

    /// Resource name of beat variant `variant` (0-based; files are numbered from 1).
    pub fn beat_resource(&self, variant: usize) -> String {
        format!("{}{}.wav", self.name, variant + 1)
    }
}

/// One loaded clip.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub speech: Arc<Asset>,
    pub beats: Option<BeatSet>,
}

/// Collects entries from concurrent loaders.
#[derive(Debug)]
pub struct CatalogBuilder {
    requested: Vec<String>,
    loaded: Mutex<Vec<(usize, Entry)>>,
}

impl CatalogBuilder {
    /// Expect one entry per name, at the name's position.
    pub fn new(requested: Vec<String>) -> Self {
        let capacity = requested.len();
        Self {
            requested,
            loaded: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Record the entry for requested position `index`. Safe to call from any thread.
    pub fn append(&self, index: usize, entry: Entry) {
        self.loaded.lock().push((index, entry));
    }

    /// Order entries by requested position and check the global sample rate.
    pub fn finish(self) -> Result<Catalog, LoadError> {
        if self.requested.is_empty() {
            return Err(LoadError::NoClips);
        }

        let mut slots: Vec<Option<Entry>> = vec![None; self.requested.len()];
        for (index, entry) in self.loaded.into_inner() {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(entry);
            }
        }

        let mut names = Vec::with_capacity(slots.len());
        let mut speech = Vec::with_capacity(slots.len());
        let mut beats = Vec::with_capacity(slots.len());
        for (slot, requested) in slots.into_iter().zip(self.requested) {
            let entry = slot.ok_or(LoadError::Missing {
                name: requested.clone(),
            })?;
            debug_assert_eq!(entry.name, requested);
            names.push(entry.name);
            speech.push(entry.speech);
            beats.push(entry.beats);
        }

        let sample_rate = speech[0].sample_rate();
        for (index, name) in names.iter().enumerate() {
            check_rate(name, &speech[index], sample_rate)?;
            if let Some(set) = &beats[index] {
                for (variant, beat) in set.iter().enumerate() {
                    check_rate(&format!("{name}{}", variant + 1), beat, sample_rate)?;
                }
            }
        }

        Ok(Catalog {
            names,
            speech,
            beats,
            sample_rate,
        })
    }
}

fn check_rate(asset: &str, found: &Asset, expected: u32) -> Result<(), LoadError> {
    if found.sample_rate() == expected {
        Ok(())
    } else {
        Err(LoadError::SampleRateMismatch {
            asset: asset.to_string(),
            expected,
            found: found.sample_rate(),
        })
    }
}

/// Index-aligned clip names, speech assets, and beat sets.
#[derive(Debug, Clone)]
pub struct Catalog {
    names: Vec<String>,
    speech: Vec<Arc<Asset>>,
    beats: Vec<Option<BeatSet>>,
    sample_rate: u32,
}

impl Catalog {
    /// Number of clips.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn speech(&self, index: usize) -> Option<&Arc<Asset>> {
        self.speech.get(index)
    }

    /// Beat variants for `index`, if the clip has any.
    pub fn beats(&self, index: usize) -> Option<&BeatSet> {
        self.beats.get(index).and_then(Option::as_ref)
    }

    /// Number of clips with beat variants.
    pub fn beat_clips(&self) -> usize {
        self.beats.iter().flatten().count()
    }

    /// The single sample rate every asset shares.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn fetch_asset(fetcher: &dyn Fetch, resource: &str) -> Result<Arc<Asset>, LoadError> {
    let bytes = fetcher.fetch(resource).map_err(|source| LoadError::Fetch {
        asset: fetcher.locate(resource),
        source,
    })?;
    let asset = Asset::from_wav(&bytes).map_err(|source| LoadError::Decode {
        asset: fetcher.locate(resource),
        source,
    })?;
    log::debug!(
        "decoded {resource}: {} frames, {} Hz, {} ch",
        asset.len(),
        asset.sample_rate(),
        asset.channels()
    );
    Ok(Arc::new(asset))
}

fn load_entry(clip: &ClipSpec, fetcher: &dyn Fetch) -> Result<Entry, LoadError> {
    let (speech, beats) = rayon::join(
        || fetch_asset(fetcher, &clip.speech_resource()),
        || -> Result<Option<BeatSet>, LoadError> {
            if !clip.beats {
                return Ok(None);
            }
            let variants = (0..BEAT_VARIANTS)
                .into_par_iter()
                .map(|variant| fetch_asset(fetcher, &clip.beat_resource(variant)))
                .collect::<Result<Vec<_>, _>>()?;
            let set: BeatSet = variants
                .try_into()
                .map_err(|_| LoadError::Missing {
                    name: clip.name.clone(),
                })?;
            Ok(Some(set))
        },
    );

    Ok(Entry {
        name: clip.name.clone(),
        speech: speech?,
        beats: beats?,
    })
}

/// Fetch and decode every clip using at most `workers` threads.
///
/// Returns only once every asset has loaded, or with the first failure.
pub fn load(
    clips: &[ClipSpec],
    fetcher: &dyn Fetch,
    workers: usize,
) -> Result<Catalog, LoadError> {
    if clips.is_empty() {
        return Err(LoadError::NoClips);
    }

    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("loader-{i}"))
        .build()?;
    log::info!("loading {} clips with {} workers", clips.len(), workers.max(1));

    let builder = CatalogBuilder::new(clips.iter().map(|c| c.name.clone()).collect());
    pool.install(|| {
        clips
            .par_iter()
            .enumerate()
            .try_for_each(|(index, clip)| {
                let entry = load_entry(clip, fetcher)?;
                builder.append(index, entry);
                Ok::<_, LoadError>(())
            })
    })?;

    let catalog = builder.finish()?;
    log::info!(
        "catalog ready: {} clips ({} with beats) at {} Hz in {:.2?}",
        catalog.len(),
        catalog.beat_clips(),
        catalog.sample_rate(),
        started.elapsed()
    );
    Ok(catalog)
}
