//! Cancellable fetch and decode tasks.
//!
//! Tasks run on the async runtime's workers and never touch map state.
//! They communicate through a single result queue and observe a per-task
//! cancel flag at every checkpoint: before starting, after disk I/O,
//! before HTTP, before decode, and before pushing the result. A task
//! cancelled after a successful decode destroys its texture before
//! returning.

use crossbeam_channel::{unbounded, Receiver, Sender};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::config::DiskCacheConfig;
use crate::core::geo::TileCoord;
use crate::render::backend::{RenderBackend, TextureHandle};
use crate::runtime;
use crate::tiles::disk::{now_ms, tile_path, DiskCacheIndex, DiskEntry};
use crate::tiles::source::TileSource;

/// Shared async HTTP client optimized for tile fetching
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent("tileview/0.1.0")
        .timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .build()
        .expect("failed to build reqwest async client")
});

/// Outcome of one fetch or decode task, delivered through the result queue.
#[derive(Debug)]
pub struct FetchResult {
    pub coord: TileCoord,
    pub outcome: Result<(TextureHandle, Arc<Vec<u8>>), String>,
    pub was_retry: bool,
}

/// Disk tier shared between tasks: the LRU index plus the cache root.
#[derive(Clone)]
struct DiskTier {
    index: Arc<Mutex<DiskCacheIndex>>,
    cache_dir: PathBuf,
}

impl DiskTier {
    fn path_for(&self, tileset: &str, coord: TileCoord) -> PathBuf {
        tile_path(&self.cache_dir, tileset, coord)
    }

    /// Disk-first read. A hit stamps the index entry; read errors other
    /// than not-found are logged and treated as a miss.
    async fn read(&self, tileset: &str, coord: TileCoord) -> Option<Vec<u8>> {
        let path = self.path_for(tileset, coord);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                if let Ok(mut index) = self.index.lock() {
                    index.touch_entry(&coord, now_ms());
                }
                Some(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("disk read failed for {:?}: {}", coord, e);
                None
            }
        }
    }

    /// Writes freshly fetched bytes unless the file already exists.
    /// Evictions are selected and the index updated in one lock
    /// acquisition; evicted files are deleted fire-and-forget. A failed
    /// write rolls the new entry back out of the index.
    async fn store(&self, tileset: &str, coord: TileCoord, bytes: &[u8]) {
        let path = self.path_for(tileset, coord);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return;
        }

        let size = bytes.len() as u64;
        let evicted = {
            let mut index = match self.index.lock() {
                Ok(index) => index,
                Err(_) => return,
            };
            let victims = index.select_evictions(size);
            let evicted = index.remove_entries(&victims);
            index.add_entry(DiskEntry {
                coord,
                path: path.clone(),
                size_bytes: size,
                last_access_ms: now_ms(),
            });
            evicted
        };

        if !evicted.is_empty() {
            log::debug!("evicting {} disk tiles for {:?}", evicted.len(), coord);
            for entry in evicted {
                runtime::spawn(async move {
                    if let Err(e) = tokio::fs::remove_file(&entry.path).await {
                        log::debug!("failed to delete evicted tile {:?}: {}", entry.coord, e);
                    }
                });
            }
        }

        let write_result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, bytes).await
        }
        .await;

        if let Err(e) = write_result {
            log::warn!("disk write failed for {:?}: {}", coord, e);
            if let Ok(mut index) = self.index.lock() {
                index.remove_entries(&[coord]);
            }
        }
    }
}

/// Spawns fetch and decode tasks and owns the result queue they feed.
pub struct FetchEngine {
    result_tx: Sender<FetchResult>,
    result_rx: Receiver<FetchResult>,
    source: Arc<dyn TileSource>,
    backend: Arc<dyn RenderBackend>,
    disk: Option<DiskTier>,
}

impl FetchEngine {
    pub fn new(
        source: Arc<dyn TileSource>,
        backend: Arc<dyn RenderBackend>,
        disk: Option<&DiskCacheConfig>,
    ) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            result_tx,
            result_rx,
            source,
            backend,
            disk: disk.map(|config| DiskTier {
                index: Arc::new(Mutex::new(DiskCacheIndex::new(config.max_size_bytes))),
                cache_dir: config.cache_dir.clone(),
            }),
        }
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.source
    }

    /// Swaps the tile provider. The caller is responsible for clearing the
    /// tile cache and cancelling in-flight tasks.
    pub fn set_source(&mut self, source: Arc<dyn TileSource>) {
        self.source = source;
    }

    /// Shared handle to the disk index, if the disk tier is enabled.
    pub fn disk_index(&self) -> Option<Arc<Mutex<DiskCacheIndex>>> {
        self.disk.as_ref().map(|d| Arc::clone(&d.index))
    }

    /// Drains every completed result currently in the queue.
    pub fn drain_results(&self) -> Vec<FetchResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            results.push(result);
        }
        results
    }

    #[cfg(test)]
    pub(crate) fn result_sender(&self) -> Sender<FetchResult> {
        self.result_tx.clone()
    }

    /// Spawns a disk-first, then HTTP, fetch task for `coord`.
    pub fn spawn_fetch(&self, coord: TileCoord, cancel: Arc<AtomicBool>, was_retry: bool) {
        let source = Arc::clone(&self.source);
        let backend = Arc::clone(&self.backend);
        let disk = self.disk.clone();
        let tx = self.result_tx.clone();

        runtime::spawn(async move {
            run_fetch(source, backend, disk, coord, cancel, was_retry, tx).await;
        });
    }

    /// Spawns a decode-only task for bytes already resident in RAM.
    pub fn spawn_decode(&self, coord: TileCoord, bytes: Arc<Vec<u8>>, cancel: Arc<AtomicBool>) {
        let backend = Arc::clone(&self.backend);
        let tx = self.result_tx.clone();

        runtime::spawn(async move {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            decode_and_push(&*backend, coord, bytes, &cancel, false, &tx);
        });
    }
}

async fn run_fetch(
    source: Arc<dyn TileSource>,
    backend: Arc<dyn RenderBackend>,
    disk: Option<DiskTier>,
    coord: TileCoord,
    cancel: Arc<AtomicBool>,
    was_retry: bool,
    tx: Sender<FetchResult>,
) {
    if cancel.load(Ordering::Relaxed) {
        return;
    }

    let mut bytes = match &disk {
        Some(disk) => disk.read(source.name(), coord).await,
        None => None,
    };
    let from_disk = bytes.is_some();

    if cancel.load(Ordering::Relaxed) {
        return;
    }

    if bytes.is_none() {
        let url = source.url_for(coord);
        match http_fetch(&url).await {
            Ok(body) => bytes = Some(body),
            Err(message) => {
                log::warn!("failed to fetch tile {:?}: {}", coord, message);
                let _ = tx.send(FetchResult {
                    coord,
                    outcome: Err(message),
                    was_retry,
                });
                return;
            }
        }
    }

    let bytes = Arc::new(bytes.unwrap_or_default());

    if cancel.load(Ordering::Relaxed) {
        return;
    }

    if !from_disk {
        if let Some(disk) = &disk {
            disk.store(source.name(), coord, &bytes).await;
        }
    }

    if cancel.load(Ordering::Relaxed) {
        return;
    }

    decode_and_push(&*backend, coord, bytes, &cancel, was_retry, &tx);
}

fn decode_and_push(
    backend: &dyn RenderBackend,
    coord: TileCoord,
    bytes: Arc<Vec<u8>>,
    cancel: &AtomicBool,
    was_retry: bool,
    tx: &Sender<FetchResult>,
) {
    match backend.decode_texture(&bytes) {
        Ok(texture) => {
            if cancel.load(Ordering::Relaxed) {
                backend.destroy_texture(texture);
                return;
            }
            let _ = tx.send(FetchResult {
                coord,
                outcome: Ok((texture, bytes)),
                was_retry,
            });
        }
        Err(e) => {
            let _ = tx.send(FetchResult {
                coord,
                outcome: Err(e.to_string()),
                was_retry,
            });
        }
    }
}

async fn http_fetch(url: &str) -> Result<Vec<u8>, String> {
    match HTTP_CLIENT.get(url).send().await {
        Ok(response) => {
            if response.status().is_success() {
                match response.bytes().await {
                    Ok(body) => Ok(body.to_vec()),
                    Err(e) => Err(format!("failed to read response body: {}", e)),
                }
            } else {
                Err(format!("HTTP {}", response.status()))
            }
        }
        Err(e) => Err(format!("request failed: {}", e)),
    }
}
