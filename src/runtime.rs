//! Thin runtime layer for background tasks.
//!
//! Fetch and decode tasks run on whatever tokio runtime the embedding
//! application already drives. Outside of one (tests, simple viewers), a
//! process-global multi-thread runtime is built lazily.

use std::future::Future;
use std::sync::OnceLock;

static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

fn global() -> &'static tokio::runtime::Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("failed to build tileview runtime")
    })
}

/// Spawns a background task on the ambient tokio runtime, falling back to
/// the process-global one.
pub fn spawn<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(future);
    } else {
        global().spawn(future);
    }
}

/// Runs a future to completion on the global runtime. Must not be called
/// from inside an async context.
pub fn block_on<F: Future>(future: F) -> F::Output {
    global().block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_spawn_without_ambient_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        for _ in 0..50 {
            if ran.load(Ordering::SeqCst) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("spawned task never ran");
    }

    #[tokio::test]
    async fn test_spawn_inside_ambient_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        for _ in 0..50 {
            if ran.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("spawned task never ran");
    }
}
