//! Thread pool used for parallel lowering.

use std::env;
use std::sync::OnceLock;

/// A wrapper around the Rayon thread pool used to lower graphs in parallel.
///
/// If the pool could not be created, work runs directly on the calling
/// thread.
pub struct ThreadPool {
    /// The wrapped thread pool, or None if we failed to construct one.
    pool: Option<rayon::ThreadPool>,
}

impl ThreadPool {
    /// Run a function in the thread pool.
    ///
    /// This corresponds to [`rayon::ThreadPool::install`]. Parallel iterators
    /// used inside `op` run on this pool's threads.
    pub fn run<R: Send, Op: FnOnce() -> R + Send>(&self, op: Op) -> R {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(op)
        } else {
            op()
        }
    }

    /// Create a thread pool with a given number of threads.
    pub fn with_num_threads(num_threads: usize) -> ThreadPool {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("neutral-codegen-{}", index))
            .build();

        if let Err(err) = &pool {
            log::warn!("Failed to create thread pool: {}", err);
        }

        ThreadPool { pool: pool.ok() }
    }

    /// Return the number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map(|pool| pool.current_num_threads())
            .unwrap_or(1)
    }
}

/// Parse a thread count override, clamping it to `[1, max_threads]`.
fn parse_num_threads(value: &str, max_threads: usize) -> Option<usize> {
    let requested: usize = value.trim().parse().ok()?;
    Some(requested.clamp(1, max_threads.max(1)))
}

/// Return the [Rayon][rayon] thread pool used for parallel lowering.
///
/// The pool has one thread per physical core by default. This can be
/// overridden at the process level by setting the
/// `NEUTRAL_CODEGEN_NUM_THREADS` environment variable, whose value must be a
/// number between 1 and the logical core count.
///
/// [rayon]: https://github.com/rayon-rs/rayon
pub fn thread_pool() -> &'static ThreadPool {
    static THREAD_POOL: OnceLock<ThreadPool> = OnceLock::new();
    THREAD_POOL.get_or_init(|| {
        let physical_cpus = num_cpus::get_physical().max(1);

        let num_threads = match env::var("NEUTRAL_CODEGEN_NUM_THREADS") {
            Ok(value) => parse_num_threads(&value, num_cpus::get()).unwrap_or_else(|| {
                log::warn!("Invalid NEUTRAL_CODEGEN_NUM_THREADS value \"{}\"", value);
                physical_cpus
            }),
            Err(_) => physical_cpus,
        };

        ThreadPool::with_num_threads(num_threads)
    })
}
