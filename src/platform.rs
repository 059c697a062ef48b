//! Process-wide scripting platform shared by every [`Engine`](crate::engine::Engine).
//!
//! The platform is initialised by the first [`acquire`] and torn down when the
//! last [`PlatformHandle`] is dropped. Both transitions happen under a single
//! lock, so two platforms are never live at the same time and a platform is
//! never torn down while a handle to it exists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rquickjs::Runtime;

/// Memory ceiling for a single engine runtime (bytes).
pub const DEFAULT_MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Native stack budget for script execution (bytes).
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 1024;

/// Allocation volume between garbage-collection passes (bytes).
pub const DEFAULT_GC_THRESHOLD: usize = 8 * 1024 * 1024;

/// Limits applied to every runtime created on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLimits {
    pub memory_limit: usize,
    pub max_stack_size: usize,
    pub gc_threshold: usize,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
            gc_threshold: DEFAULT_GC_THRESHOLD,
        }
    }
}

/// State initialised once per platform lifetime.
#[derive(Debug)]
pub struct Platform {
    generation: u64,
    limits: RuntimeLimits,
}

impl Platform {
    fn initialize(generation: u64) -> Self {
        let limits = RuntimeLimits::default();
        log::info!("scripting platform #{generation} initialised ({limits:?})");
        Self { generation, limits }
    }

    /// Which initialisation cycle this platform belongs to. Increases every
    /// time the platform is torn down and brought up again.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn limits(&self) -> RuntimeLimits {
        self.limits
    }

    /// Apply the platform limits to a freshly created runtime.
    pub(crate) fn configure(&self, runtime: &Runtime) {
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);
        runtime.set_gc_threshold(self.limits.gc_threshold);
    }
}

struct Manager {
    handles: usize,
    platform: Option<Arc<Platform>>,
}

static MANAGER: Mutex<Manager> = Mutex::new(Manager {
    handles: 0,
    platform: None,
});

static GENERATION: AtomicU64 = AtomicU64::new(0);

fn manager() -> MutexGuard<'static, Manager> {
    // The manager's bookkeeping stays consistent even if a holder panicked.
    MANAGER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A counted reference to the live platform. Dropping it releases the
/// reference; the last release tears the platform down.
#[derive(Debug)]
pub struct PlatformHandle {
    platform: Arc<Platform>,
}

impl std::ops::Deref for PlatformHandle {
    type Target = Platform;

    fn deref(&self) -> &Platform {
        &self.platform
    }
}

impl Clone for PlatformHandle {
    fn clone(&self) -> Self {
        acquire()
    }
}

impl Drop for PlatformHandle {
    fn drop(&mut self) {
        let mut m = manager();
        m.handles = m.handles.saturating_sub(1);
        if m.handles == 0 {
            if let Some(platform) = m.platform.take() {
                log::info!("scripting platform #{} torn down", platform.generation);
            }
        }
    }
}

/// Initialise the platform if needed and return a counted handle to it.
pub fn acquire() -> PlatformHandle {
    let mut m = manager();
    let platform = match &m.platform {
        Some(p) => Arc::clone(p),
        None => {
            let generation = GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
            let p = Arc::new(Platform::initialize(generation));
            m.platform = Some(Arc::clone(&p));
            p
        }
    };
    m.handles += 1;
    PlatformHandle { platform }
}

/// Number of handles currently keeping the platform alive.
pub fn live_handles() -> usize {
    manager().handles
}

/// Whether a platform is currently initialised.
pub fn is_initialized() -> bool {
    manager().platform.is_some()
}
