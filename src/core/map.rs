//! The aggregate map state and the per-frame update orchestrator.
//!
//! The orchestrator and renderer run on the main thread and own
//! [`MapState`] outright; background tasks only ever see the result queue,
//! their cancel flag and the shared disk index. Each frame runs the same
//! fixed sequence: advance the zoom animation, cancel tasks that left the
//! keep set, demote distant textures, drop stale failures, evict old
//! cached images, re-decode cached tiles that came back into view, drain
//! completed results, schedule due retries, then spawn new fetches
//! (parents first, then visible center-out, then prefetch).

use crate::animation::{ZoomAnchor, ZoomAnimator};
use crate::core::bounds::MapBounds;
use crate::core::config::{MapOptions, PrefetchConfig};
use crate::core::geo::{LatLng, Point, TileCoord};
use crate::core::viewport::Viewport;
use crate::input::events::FrameInput;
use crate::input::handler::{Action, InputMapper};
use crate::prelude::{HashMap, HashSet};
use crate::render::backend::RenderBackend;
use crate::tiles::cache::{CacheStats, TileCache};
use crate::tiles::disk::DiskCacheIndex;
use crate::tiles::fetch::FetchEngine;
use crate::tiles::source::TileSource;
use crate::tiles::state::{RetryState, TileState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// How many parent levels the keep set and renderer may walk for fallback.
const ANCESTOR_KEEP_LEVELS: u8 = 8;

/// Owns the viewport, the tile cache, the task registry and the animation
/// and input state. Drive it with [`MapState::handle_input`] and
/// [`MapState::update`] once per frame, then render.
pub struct MapState {
    pub viewport: Viewport,
    pub cache: TileCache,
    pub bounds: MapBounds,
    fetcher: FetchEngine,
    backend: Arc<dyn RenderBackend>,
    /// Main-thread-only registry of in-flight tasks and their cancel flags.
    tasks: HashMap<TileCoord, Arc<AtomicBool>>,
    animator: ZoomAnimator,
    input: InputMapper,
    /// Monotonic frame counter; the abstract time base for retry delays.
    frame: u64,
    initial_center: LatLng,
    initial_zoom: u8,
    cursor_geo: LatLng,
    last_zoom_change_frame: u64,
    prefetch: PrefetchConfig,
}

impl MapState {
    pub fn new(
        options: MapOptions,
        screen_size: Point,
        source: Arc<dyn TileSource>,
        backend: Arc<dyn RenderBackend>,
    ) -> Self {
        let bounds = options.bounds.clone();
        let center = bounds.clamp_center(options.initial_center);
        let zoom = bounds.clamp_zoom(options.initial_zoom as i16);
        let viewport = Viewport::new(center, zoom, screen_size, options.tile_size);
        let fetcher = FetchEngine::new(source, Arc::clone(&backend), options.disk.as_ref());

        Self {
            viewport,
            cache: TileCache::new(options.retry, options.unload),
            bounds,
            fetcher,
            backend,
            tasks: HashMap::default(),
            animator: ZoomAnimator::new(zoom, options.animation),
            input: InputMapper::new(options.input),
            frame: 0,
            initial_center: center,
            initial_zoom: zoom,
            cursor_geo: center,
            last_zoom_change_frame: 0,
            prefetch: options.prefetch,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn display_zoom(&self) -> f64 {
        self.animator.display_zoom()
    }

    pub fn target_zoom(&self) -> u8 {
        self.animator.target_zoom()
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    /// Geographic position under the cursor, from the last input frame.
    pub fn cursor_geo(&self) -> LatLng {
        self.cursor_geo
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_active_task(&self, coord: &TileCoord) -> bool {
        self.tasks.contains_key(coord)
    }

    pub fn disk_index(&self) -> Option<Arc<Mutex<DiskCacheIndex>>> {
        self.fetcher.disk_index()
    }

    /// Swaps the tile provider: cancels every in-flight task and clears the
    /// cache wholesale. The view and pan velocity are kept.
    pub fn set_source(&mut self, source: Arc<dyn TileSource>) {
        for (_, flag) in self.tasks.drain() {
            flag.store(true, Ordering::Relaxed);
        }
        self.cache.clear();
        self.fetcher.set_source(source);
        log::debug!("tile provider changed; cache cleared");
    }

    /// Consumes one frame of window input.
    pub fn handle_input(&mut self, input: &FrameInput) {
        self.viewport.size = input.screen_size;
        self.cursor_geo = self
            .viewport
            .screen_to_lat_lng(&input.mouse_pos, self.animator.display_zoom());

        let actions = self.input.handle_frame(input, &self.viewport);
        for action in actions {
            self.apply_action(action);
        }
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::SetCenter { center } => {
                self.viewport.center = self.bounds.clamp_center(center);
            }
            Action::ZoomAtCursor { delta, cursor } => {
                let target = self
                    .bounds
                    .clamp_zoom(self.animator.target_zoom() as i16 + delta as i16);
                let anchor = if self.animator.is_animating() {
                    None
                } else {
                    Some(ZoomAnchor {
                        screen: cursor,
                        geo: self
                            .viewport
                            .screen_to_lat_lng(&cursor, self.animator.display_zoom()),
                    })
                };
                self.animator.begin(target, anchor);
                self.last_zoom_change_frame = self.frame;
            }
            Action::PanBy { dx, dy } => {
                let (d_lng, d_lat) = self.viewport.pixels_to_degrees(dx, dy);
                self.viewport.center = self.bounds.clamp_center(LatLng::new(
                    self.viewport.center.lat + d_lat,
                    self.viewport.center.lng + d_lng,
                ));
            }
            Action::ZoomCentered { delta } => {
                let target = self
                    .bounds
                    .clamp_zoom(self.animator.target_zoom() as i16 + delta as i16);
                self.animator.begin(target, None);
                self.last_zoom_change_frame = self.frame;
            }
            Action::SetZoom { zoom } => {
                let zoom = self.bounds.clamp_zoom(zoom as i16);
                self.animator.jump_to(zoom);
                self.viewport.zoom = zoom;
                self.last_zoom_change_frame = self.frame;
            }
            Action::ResetView => {
                self.viewport.center = self.bounds.clamp_center(self.initial_center);
                let zoom = self.bounds.clamp_zoom(self.initial_zoom as i16);
                self.animator.jump_to(zoom);
                self.viewport.zoom = zoom;
                self.last_zoom_change_frame = self.frame;
            }
        }
    }

    /// Runs one frame of the tile lifecycle.
    pub fn update(&mut self) {
        self.animator.step(&mut self.viewport, &self.bounds);
        let now = self.frame;

        let keep = self.compute_keep_set();

        // Cancel tasks that drifted out of the keep set. The flag stays
        // alive inside the task; dropping the entry is what marks the
        // eventual result as discardable.
        let gone: Vec<TileCoord> = self
            .tasks
            .keys()
            .filter(|coord| !keep.contains(coord))
            .copied()
            .collect();
        for coord in gone {
            if let Some(flag) = self.tasks.remove(&coord) {
                flag.store(true, Ordering::Relaxed);
            }
        }

        // Demote distant textures to RAM-cached bytes.
        for (coord, texture, bytes) in self.cache.tiles_to_unload(&keep) {
            self.backend.destroy_texture(texture);
            self.cache.insert(
                coord,
                TileState::Cached {
                    bytes,
                    last_access: now,
                },
            );
        }

        for coord in self.cache.stale_tiles(&keep) {
            self.cache.remove(&coord);
        }

        let evicted = self
            .cache
            .cached_images_to_evict(&keep, self.cache.unload.max_cached_images);
        if !evicted.is_empty() {
            log::debug!("evicting {} cached tile images", evicted.len());
        }
        for coord in evicted {
            self.cache.remove(&coord);
        }

        let visible = self.viewport.visible_tiles_with_buffer(0);
        let visible_set: HashSet<TileCoord> = visible.iter().copied().collect();

        // Cached tiles back in view get a background re-decode.
        for (coord, bytes) in self.cache.cached_tiles_to_reload(&visible_set) {
            if self.tasks.contains_key(&coord) {
                continue;
            }
            self.cache.insert(coord, TileState::Pending);
            let flag = self.register_task(coord);
            self.fetcher.spawn_decode(coord, bytes, flag);
        }

        self.drain_results(now);
        self.schedule_retries(&visible, now);

        let debounce = self.animator.config().zoom_debounce_frames;
        let should_fetch_new = !self.animator.is_animating()
            || now.saturating_sub(self.last_zoom_change_frame) >= debounce;

        if should_fetch_new {
            self.spawn_new_fetches(&visible, &visible_set);
        }

        self.frame += 1;
    }

    /// Emits draw calls for the current frame.
    pub fn render(&self) {
        crate::render::walker::render_map(
            &self.cache,
            &self.viewport,
            self.animator.display_zoom(),
            &*self.backend,
        );
    }

    /// Visible-with-buffer tiles plus their parents, and for every base
    /// tile that is not yet loaded, its loaded ancestors and children so
    /// the renderer keeps a fallback while the tile arrives.
    fn compute_keep_set(&self) -> HashSet<TileCoord> {
        let base = self
            .viewport
            .visible_tiles_with_buffer(self.cache.unload.buffer_tiles);
        let mut keep: HashSet<TileCoord> = base.iter().copied().collect();

        for tile in &base {
            if let Some(parent) = tile.parent() {
                keep.insert(parent);
            }
            let loaded = self.cache.get(tile).is_some_and(|s| s.is_loaded());
            if !loaded {
                for ancestor in self.cache.get_loaded_ancestors(*tile, ANCESTOR_KEEP_LEVELS) {
                    keep.insert(ancestor);
                }
                for child in tile.children() {
                    if self.cache.get(&child).is_some_and(|s| s.is_loaded()) {
                        keep.insert(child);
                    }
                }
            }
        }
        keep
    }

    fn register_task(&mut self, coord: TileCoord) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.tasks.insert(coord, Arc::clone(&flag));
        flag
    }

    /// Marks a coord `Pending` and spawns its first fetch.
    fn start_fetch(&mut self, coord: TileCoord) {
        self.cache.insert(coord, TileState::Pending);
        let flag = self.register_task(coord);
        self.fetcher.spawn_fetch(coord, flag, false);
    }

    fn drain_results(&mut self, now: u64) {
        for result in self.fetcher.drain_results() {
            if self.tasks.remove(&result.coord).is_none() {
                // Cancelled after decode: the texture has no owner left.
                if let Ok((texture, _)) = result.outcome {
                    self.backend.destroy_texture(texture);
                }
                continue;
            }

            match result.outcome {
                Ok((texture, bytes)) => {
                    self.cache
                        .insert(result.coord, TileState::Loaded { texture, bytes });
                }
                Err(message) => {
                    log::debug!("tile {:?} failed: {}", result.coord, message);
                    let next = match (result.was_retry, self.cache.get(&result.coord)) {
                        (true, Some(TileState::Retrying(rs))) => {
                            let advanced = rs.advanced(now, message);
                            if self.cache.retry.is_exhausted(&advanced) {
                                TileState::Exhausted(advanced)
                            } else {
                                TileState::Failed(advanced)
                            }
                        }
                        _ => TileState::Failed(RetryState::initial_failure(now, message)),
                    };
                    self.cache.insert(result.coord, next);
                }
            }
        }
    }

    fn schedule_retries(&mut self, visible: &[TileCoord], now: u64) {
        for coord in visible {
            let due = match self.cache.get(coord) {
                Some(TileState::Failed(rs)) if self.cache.retry.should_retry(rs, now) => {
                    Some(rs.clone())
                }
                _ => None,
            };
            if let Some(rs) = due {
                self.cache.insert(*coord, TileState::Retrying(rs));
                let flag = self.register_task(*coord);
                self.fetcher.spawn_fetch(*coord, flag, true);
            }
        }
    }

    fn spawn_new_fetches(&mut self, visible: &[TileCoord], visible_set: &HashSet<TileCoord>) {
        // Parents first, so a fallback exists before the children land.
        for tile in visible {
            if let Some(parent) = tile.parent() {
                if !self.cache.contains(&parent) {
                    self.start_fetch(parent);
                }
            }
        }

        let center = self.viewport.center_tile_frac(self.viewport.zoom);
        let mut missing: Vec<TileCoord> = visible
            .iter()
            .filter(|coord| !self.cache.contains(coord))
            .copied()
            .collect();
        missing.sort_by(|a, b| {
            tile_distance_sq(*a, &center)
                .partial_cmp(&tile_distance_sq(*b, &center))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for coord in missing {
            self.start_fetch(coord);
        }

        self.spawn_prefetch(visible_set);
    }

    /// Predicts where the view is heading from the pan velocity and warms
    /// the tiles there. The center moves opposite the pointer velocity:
    /// dragging right pulls the map content right, revealing the west.
    fn spawn_prefetch(&mut self, visible_set: &HashSet<TileCoord>) {
        let velocity = self.input.velocity();
        if velocity.length() < self.prefetch.min_velocity {
            return;
        }

        let look_ahead_frames = self.prefetch.look_ahead_ms / self.prefetch.frame_ms;
        let shift = velocity.multiply(look_ahead_frames);
        let (d_lng, d_lat) = self.viewport.pixels_to_degrees(shift.x, shift.y);
        let predicted_center = self.bounds.clamp_center(LatLng::new(
            self.viewport.center.lat + d_lat,
            self.viewport.center.lng - d_lng,
        ));

        let mut predicted = self.viewport.clone();
        predicted.center = predicted_center;
        let center = predicted.center_tile_frac(predicted.zoom);

        let mut candidates: Vec<TileCoord> = predicted
            .visible_tiles_with_buffer(0)
            .into_iter()
            .filter(|coord| !visible_set.contains(coord) && !self.cache.contains(coord))
            .collect();
        candidates.sort_by(|a, b| {
            tile_distance_sq(*a, &center)
                .partial_cmp(&tile_distance_sq(*b, &center))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let budget = self.prefetch.max_prefetch_tiles;
        let picked: Vec<TileCoord> = candidates.into_iter().take(budget).collect();
        for coord in picked {
            self.start_fetch(coord);
        }
    }
}

/// Squared distance from a tile's center to a fractional tile-space point,
/// wrap-aware on the x axis.
fn tile_distance_sq(coord: TileCoord, center: &Point) -> f64 {
    let n = (1u64 << coord.z) as f64;
    let mut dx = coord.x as f64 + 0.5 - center.x;
    dx -= n * (dx / n).round();
    let dy = coord.y as f64 + 0.5 - center.y;
    dx * dx + dy * dy
}
