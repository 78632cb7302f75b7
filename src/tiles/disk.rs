//! In-memory LRU index of the on-disk tile files.
//!
//! The index is ephemeral: it starts empty each run and is kept in sync by
//! the fetch engine as tiles are read, written and evicted. During a run it
//! is the sole authority for the byte budget; files on disk without an
//! index entry are orphans and do not count until rewritten.

use crate::core::geo::TileCoord;
use crate::prelude::HashMap;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::time::Instant;

static START: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds of monotonic time since the first call in this process.
pub fn now_ms() -> u64 {
    START.elapsed().as_millis() as u64
}

/// Path of a tile within the cache: `{cache_dir}/{tileset}/{z}/{x}/{y}.png`.
pub fn tile_path(cache_dir: &Path, tileset: &str, coord: TileCoord) -> PathBuf {
    cache_dir
        .join(tileset)
        .join(coord.z.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.png", coord.y))
}

/// Metadata for one on-disk tile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskEntry {
    pub coord: TileCoord,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub last_access_ms: u64,
}

/// LRU index over disk entries with a total byte budget.
#[derive(Debug)]
pub struct DiskCacheIndex {
    entries: HashMap<TileCoord, DiskEntry>,
    total_bytes: u64,
    max_size_bytes: u64,
}

impl DiskCacheIndex {
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            entries: HashMap::default(),
            total_bytes: 0,
            max_size_bytes,
        }
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.entries.contains_key(coord)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Records a new entry, or refreshes size and access time for an
    /// existing one.
    pub fn add_entry(&mut self, entry: DiskEntry) {
        if let Some(old) = self.entries.insert(entry.coord, entry.clone()) {
            self.total_bytes = self.total_bytes - old.size_bytes + entry.size_bytes;
        } else {
            self.total_bytes += entry.size_bytes;
        }
    }

    /// Removes entries and returns their metadata for file deletion.
    pub fn remove_entries(&mut self, coords: &[TileCoord]) -> Vec<DiskEntry> {
        let mut removed = Vec::with_capacity(coords.len());
        for coord in coords {
            if let Some(entry) = self.entries.remove(coord) {
                self.total_bytes -= entry.size_bytes;
                removed.push(entry);
            }
        }
        removed
    }

    /// Stamps an entry's access time; no-op for unknown coordinates.
    pub fn touch_entry(&mut self, coord: &TileCoord, now_ms: u64) {
        if let Some(entry) = self.entries.get_mut(coord) {
            entry.last_access_ms = now_ms;
        }
    }

    /// The minimum prefix of the LRU-sorted entries whose removal lets
    /// `new_size` more bytes fit in the budget. Empty when it already fits.
    pub fn select_evictions(&self, new_size: u64) -> Vec<TileCoord> {
        if self.total_bytes + new_size <= self.max_size_bytes {
            return Vec::new();
        }

        let mut by_age: Vec<&DiskEntry> = self.entries.values().collect();
        by_age.sort_by(|a, b| {
            a.last_access_ms
                .cmp(&b.last_access_ms)
                .then_with(|| a.coord.cmp(&b.coord))
        });

        let mut victims = Vec::new();
        let mut remaining = self.total_bytes;
        for entry in by_age {
            if remaining + new_size <= self.max_size_bytes {
                break;
            }
            remaining -= entry.size_bytes;
            victims.push(entry.coord);
        }
        victims
    }
}
