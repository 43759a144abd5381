use std::{
    collections::{hash_map::DefaultHasher, HashMap, VecDeque},
    fs::File,
    hash::{Hash, Hasher},
    io::BufReader,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use hound::{SampleFormat, WavReader};

use super::{PcmProvider, SourceAdapter, TrackHandle, TrackSource};
use crate::{PcmBuffer, Result, XsrcError};

/// Paths registered by [`LocalFileAdapter::parse_url`], oldest evicted first
/// once `capacity` is reached.
#[derive(Debug)]
struct KnownPaths {
    capacity: usize,
    paths: HashMap<String, PathBuf>,
    order: VecDeque<String>,
}

impl KnownPaths {
    fn insert(&mut self, source_id: String, path: PathBuf) {
        if self.paths.insert(source_id.clone(), path).is_some() {
            return;
        }
        self.order.push_back(source_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.paths.remove(&oldest);
            }
        }
    }
}

/// Adapter for WAV files on the local filesystem. Offers PCM access but no
/// official analysis.
///
/// Paths are registered when a URL is parsed; the source id is a hash of
/// the path so it can be shared without exposing the filesystem layout.
/// At most [`LocalFileAdapter::DEFAULT_CAPACITY`] paths are remembered;
/// an evicted id resolves again after its URL is parsed once more.
#[derive(Debug)]
pub struct LocalFileAdapter {
    known: Mutex<KnownPaths>,
}

impl Default for LocalFileAdapter {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl LocalFileAdapter {
    pub const DEFAULT_CAPACITY: usize = 1_024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            known: Mutex::new(KnownPaths {
                capacity: capacity.max(1),
                paths: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Path registered for a source id, if any.
    pub fn path_for(&self, source_id: &str) -> Result<Option<PathBuf>> {
        Ok(self.lock()?.paths.get(source_id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, KnownPaths>> {
        self.known
            .lock()
            .map_err(|_| XsrcError::msg("local path registry has been poisoned"))
    }

    fn open(&self, source_id: &str) -> Result<(PathBuf, WavReader<BufReader<File>>)> {
        let path = self.path_for(source_id)?.ok_or_else(|| not_found(source_id))?;
        match WavReader::open(&path) {
            Ok(reader) => Ok((path, reader)),
            Err(hound::Error::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(not_found(source_id))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn not_found(source_id: &str) -> XsrcError {
    XsrcError::NotFound {
        kind: TrackSource::Local,
        id: source_id.to_string(),
    }
}

fn path_from_url(url: &str) -> Option<PathBuf> {
    let raw = url.trim();
    let raw = raw.strip_prefix("file://").unwrap_or(raw);
    if raw.contains("://") {
        return None;
    }
    let path = PathBuf::from(raw);
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    is_wav.then_some(path)
}

fn source_id_for(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl SourceAdapter for LocalFileAdapter {
    fn kind(&self) -> TrackSource {
        TrackSource::Local
    }

    fn parse_url(&self, url: &str) -> Option<String> {
        let path = path_from_url(url)?;
        let path = path.canonicalize().unwrap_or(path);
        let source_id = source_id_for(&path);
        match self.lock() {
            Ok(mut known) => {
                known.insert(source_id.clone(), path);
                Some(source_id)
            }
            Err(err) => {
                tracing::warn!(%err, "could not register local path");
                None
            }
        }
    }

    fn fetch_metadata(&self, source_id: &str) -> Result<TrackHandle> {
        let (path, reader) = self.open(source_id)?;
        let spec = reader.spec();
        let duration_ms = if spec.sample_rate == 0 {
            0
        } else {
            reader.duration() as u64 * 1000 / spec.sample_rate as u64
        };
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_id.to_string());

        Ok(TrackHandle::new(
            TrackSource::Local,
            source_id,
            title,
            "Unknown Artist",
            duration_ms,
        ))
    }

    fn pcm_provider(&self) -> Option<&dyn PcmProvider> {
        Some(self)
    }
}

impl PcmProvider for LocalFileAdapter {
    /// Decodes the whole file and downmixes it to mono.
    fn read_pcm(&self, source_id: &str) -> Result<PcmBuffer> {
        let (_, mut reader) = self.open(source_id)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(PcmBuffer::new(samples, spec.sample_rate))
    }
}
