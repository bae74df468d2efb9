//! Persisted word timings for guided narration.
//!
//! A narrated section records, for each word it speaks, the meditation
//! time at which that word began. Replaying those timings lets a seek
//! restart speech at the right word. Entries are advisory: a missing or
//! unreadable entry only costs precision, never playback.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CacheError, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    /// Offset of the word within the section's flattened text.
    pub char_index: usize,
    /// Seconds since meditation start when the word began.
    pub time: f64,
}

/// Timings of one section, sorted and unique by `char_index`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionTimings(Vec<WordTiming>);

impl SectionTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_unsorted(timings: impl IntoIterator<Item = WordTiming>) -> Self {
        let mut out = Self::new();
        out.merge(timings);
        out
    }

    /// Add timings; an offset that is already known keeps its first time.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = WordTiming>) {
        for timing in incoming {
            if let Err(pos) = self
                .0
                .binary_search_by_key(&timing.char_index, |t| t.char_index)
            {
                self.0.insert(pos, timing);
            }
        }
    }

    /// Last word that had started by `time`.
    pub fn last_at_or_before(&self, time: f64) -> Option<&WordTiming> {
        self.0.iter().filter(|t| t.time <= time).last()
    }

    pub fn as_slice(&self) -> &[WordTiming] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Timings for every section of a schedule, by schedule index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordTimingMap(BTreeMap<usize, SectionTimings>);

impl WordTimingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, schedule_index: usize) -> Option<&SectionTimings> {
        self.0.get(&schedule_index).filter(|t| !t.is_empty())
    }

    pub fn merge(
        &mut self,
        schedule_index: usize,
        timings: impl IntoIterator<Item = WordTiming>,
    ) -> &SectionTimings {
        let entry = self.0.entry(schedule_index).or_default();
        entry.merge(timings);
        entry
    }

    pub fn insert(&mut self, schedule_index: usize, timings: SectionTimings) {
        self.0.insert(schedule_index, timings);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &SectionTimings)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Identifies the narration conditions a set of timings was recorded under.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    pub duration: u64,
    pub voice_id: String,
    pub rate: f32,
    pub pitch: f32,
}

impl CacheKey {
    pub fn new(duration: u64, voice_id: impl Into<String>, rate: f32, pitch: f32) -> Self {
        Self {
            duration,
            voice_id: voice_id.into(),
            rate,
            pitch,
        }
    }

    pub fn file_name(&self) -> String {
        let voice: String = self
            .voice_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!(
            "meditation-cache-{}-{}-{}-{}.json",
            self.duration, voice, self.rate, self.pitch
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEnvelope {
    word_timings: Vec<(usize, SectionTimings)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pitch: Option<f32>,
}

impl CacheEnvelope {
    fn wrap(key: &CacheKey, map: &WordTimingMap) -> Self {
        Self {
            word_timings: map.iter().map(|(i, t)| (*i, t.clone())).collect(),
            voice: Some(key.voice_id.clone()),
            rate: Some(key.rate),
            pitch: Some(key.pitch),
        }
    }

    fn into_map(self) -> WordTimingMap {
        let mut map = WordTimingMap::new();
        for (index, timings) in self.word_timings {
            // Re-sort: the file may have been edited by hand.
            map.merge(index, timings.0);
        }
        map
    }
}

/// Best-effort storage for [`WordTimingMap`]s.
pub trait TimingCache {
    /// Stored timings for `key`, `None` on a miss or any failure.
    fn load(&self, key: &CacheKey) -> Option<WordTimingMap>;

    /// Store timings for `key`. Failures are logged, never returned.
    fn save(&mut self, key: &CacheKey, map: &WordTimingMap);
}

/// One JSON file per key under a cache directory.
#[derive(Debug, Clone)]
pub struct FileTimingCache {
    dir: PathBuf,
}

impl FileTimingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache at `<data_dir>/cache`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn open() -> Result<Self, ConfigError> {
        Ok(Self::new(data_dir()?.join("cache")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn try_load(&self, key: &CacheKey) -> Result<Option<WordTimingMap>, CacheError> {
        let path = self.dir.join(key.file_name());
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        let envelope: CacheEnvelope = serde_json::from_str(&content)
            .map_err(|source| CacheError::Corrupt { path, source })?;
        Ok(Some(envelope.into_map()))
    }

    pub fn try_save(&self, key: &CacheKey, map: &WordTimingMap) -> Result<(), CacheError> {
        let path = self.dir.join(key.file_name());
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        let json = serde_json::to_string(&CacheEnvelope::wrap(key, map))
            .map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&path, json).map_err(|source| CacheError::Write { path, source })
    }

    /// File names of every stored entry.
    pub fn entries(&self) -> Vec<String> {
        let Ok(read) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with("meditation-cache-") && n.ends_with(".json"))
            .collect();
        names.sort();
        names
    }

    /// Remove every stored entry, returning how many were removed.
    ///
    /// # Errors
    /// Returns an error if a file cannot be deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let names = self.entries();
        for name in &names {
            let path = self.dir.join(name);
            std::fs::remove_file(&path).map_err(|source| CacheError::Write { path, source })?;
        }
        Ok(names.len())
    }
}

impl TimingCache for FileTimingCache {
    fn load(&self, key: &CacheKey) -> Option<WordTimingMap> {
        match self.try_load(key) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }

    fn save(&mut self, key: &CacheKey, map: &WordTimingMap) {
        if let Err(e) = self.try_save(key, map) {
            tracing::warn!("{e}");
        }
    }
}

/// Process-local cache. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryTimingCache {
    entries: Rc<RefCell<HashMap<String, WordTimingMap>>>,
}

impl MemoryTimingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl TimingCache for MemoryTimingCache {
    fn load(&self, key: &CacheKey) -> Option<WordTimingMap> {
        self.entries.borrow().get(&key.file_name()).cloned()
    }

    fn save(&mut self, key: &CacheKey, map: &WordTimingMap) {
        self.entries
            .borrow_mut()
            .insert(key.file_name(), map.clone());
    }
}
