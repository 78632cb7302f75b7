//! The in-RAM tile cache: a map from tile coordinate to lifecycle state,
//! with keep-set driven unloading and LRU eviction of cached images.

use crate::core::config::{RetryConfig, UnloadConfig};
use crate::core::geo::TileCoord;
use crate::prelude::{HashMap, HashSet};
use crate::render::backend::TextureHandle;
use crate::tiles::state::TileState;
use std::sync::Arc;

/// Counts per lifecycle state, for overlays and diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub pending: usize,
    pub loaded: usize,
    pub cached: usize,
    pub failed: usize,
    pub retrying: usize,
    pub exhausted: usize,
}

impl CacheStats {
    /// Tiles with a task in flight.
    pub fn in_flight(&self) -> usize {
        self.pending + self.retrying
    }
}

/// Keyed map of tile coordinate to tile state plus the retry and unload
/// policies that govern transitions.
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<TileCoord, TileState>,
    pub retry: RetryConfig,
    pub unload: UnloadConfig,
}

impl TileCache {
    pub fn new(retry: RetryConfig, unload: UnloadConfig) -> Self {
        Self {
            tiles: HashMap::default(),
            retry,
            unload,
        }
    }

    pub fn get(&self, coord: &TileCoord) -> Option<&TileState> {
        self.tiles.get(coord)
    }

    pub fn get_mut(&mut self, coord: &TileCoord) -> Option<&mut TileState> {
        self.tiles.get_mut(coord)
    }

    pub fn insert(&mut self, coord: TileCoord, state: TileState) {
        self.tiles.insert(coord, state);
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        self.tiles.contains_key(coord)
    }

    pub fn remove(&mut self, coord: &TileCoord) -> Option<TileState> {
        self.tiles.remove(coord)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TileCoord, &TileState)> {
        self.tiles.iter()
    }

    /// Removes and returns every `Loaded` tile outside the keep set. The
    /// caller destroys each texture and re-inserts the bytes as `Cached`.
    pub fn tiles_to_unload(
        &mut self,
        keep_set: &HashSet<TileCoord>,
    ) -> Vec<(TileCoord, TextureHandle, Arc<Vec<u8>>)> {
        let victims: Vec<TileCoord> = self
            .tiles
            .iter()
            .filter(|(coord, state)| state.is_loaded() && !keep_set.contains(coord))
            .map(|(coord, _)| *coord)
            .collect();

        victims
            .into_iter()
            .filter_map(|coord| match self.tiles.remove(&coord) {
                Some(TileState::Loaded { texture, bytes }) => Some((coord, texture, bytes)),
                _ => None,
            })
            .collect()
    }

    /// Every pending/failed/retrying/exhausted coordinate outside the keep
    /// set. These carry no resources and are removed outright.
    pub fn stale_tiles(&self, keep_set: &HashSet<TileCoord>) -> Vec<TileCoord> {
        self.tiles
            .iter()
            .filter(|(coord, state)| {
                !keep_set.contains(coord)
                    && matches!(
                        state,
                        TileState::Pending
                            | TileState::Failed(_)
                            | TileState::Retrying(_)
                            | TileState::Exhausted(_)
                    )
            })
            .map(|(coord, _)| *coord)
            .collect()
    }

    /// Every `Cached` coordinate in the visible set, paired with its bytes
    /// for an off-main-thread re-decode.
    pub fn cached_tiles_to_reload(
        &self,
        visible_set: &HashSet<TileCoord>,
    ) -> Vec<(TileCoord, Arc<Vec<u8>>)> {
        self.tiles
            .iter()
            .filter_map(|(coord, state)| match state {
                TileState::Cached { bytes, .. } if visible_set.contains(coord) => {
                    Some((*coord, Arc::clone(bytes)))
                }
                _ => None,
            })
            .collect()
    }

    /// Oldest-first list of `Cached` coordinates outside the keep set,
    /// sufficient to bring their count down to `max_to_keep`. Equal stamps
    /// tie-break on the coordinate for determinism.
    pub fn cached_images_to_evict(
        &self,
        keep_set: &HashSet<TileCoord>,
        max_to_keep: usize,
    ) -> Vec<TileCoord> {
        let mut candidates: Vec<(u64, TileCoord)> = self
            .tiles
            .iter()
            .filter_map(|(coord, state)| match state {
                TileState::Cached { last_access, .. } if !keep_set.contains(coord) => {
                    Some((*last_access, *coord))
                }
                _ => None,
            })
            .collect();

        if candidates.len() <= max_to_keep {
            return Vec::new();
        }

        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        let excess = candidates.len() - max_to_keep;
        candidates
            .into_iter()
            .take(excess)
            .map(|(_, coord)| coord)
            .collect()
    }

    /// Ancestors of `coord` (up to `max_levels` up) whose state is `Loaded`.
    pub fn get_loaded_ancestors(&self, coord: TileCoord, max_levels: u8) -> Vec<TileCoord> {
        let mut ancestors = Vec::new();
        let mut current = coord;
        for _ in 0..max_levels {
            match current.parent() {
                Some(parent) => {
                    if self.tiles.get(&parent).is_some_and(|s| s.is_loaded()) {
                        ancestors.push(parent);
                    }
                    current = parent;
                }
                None => break,
            }
        }
        ancestors
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for state in self.tiles.values() {
            match state {
                TileState::Pending => stats.pending += 1,
                TileState::Loaded { .. } => stats.loaded += 1,
                TileState::Cached { .. } => stats.cached += 1,
                TileState::Failed(_) => stats.failed += 1,
                TileState::Retrying(_) => stats.retrying += 1,
                TileState::Exhausted(_) => stats.exhausted += 1,
            }
        }
        stats
    }
}
