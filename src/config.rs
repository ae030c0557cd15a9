use std::env;

use lazy_static::lazy_static;

/// Environment variable overriding the number of workers.
pub const NUM_WORKERS_VAR: &str = "CURVE_ENGINE_NUM_WORKERS";

lazy_static! {
    static ref NUM_WORKERS: usize = workers_from_env().unwrap_or_else(num_cpus::get);
}

fn workers_from_env() -> Option<usize> {
    env::var(NUM_WORKERS_VAR)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Tuning knobs for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker threads, each with a private arena.
    pub num_workers: usize,
    /// Initial arena size, in 64 KiB pages.
    pub arena_pages: usize,
    /// Absolute arena cap, in 64 KiB pages.
    pub max_arena_pages: usize,
    /// Largest FFT chunk is `2^fft_max_chunk_bits` elements.
    pub fft_max_chunk_bits: u32,
    /// Chunks are never split below this many elements to gain parallelism.
    pub fft_min_chunk: usize,
    /// Caps the root-of-unity table. `None` uses the full two-adicity of
    /// the scalar field.
    pub fft_table_bits: Option<u32>,
    pub msm_min_chunk: usize,
    pub msm_max_chunk: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            num_workers: *NUM_WORKERS,
            arena_pages: 16,
            max_arena_pages: 1 << 16,
            fft_max_chunk_bits: 14,
            fft_min_chunk: 8,
            fft_table_bits: None,
            msm_min_chunk: 1 << 10,
            msm_max_chunk: 1 << 22,
        }
    }
}

impl EngineConfig {
    /// The defaults, with the worker count re-read from
    /// `CURVE_ENGINE_NUM_WORKERS`. [`Default`] resolves it once per process.
    pub fn from_env() -> Self {
        EngineConfig {
            num_workers: workers_from_env().unwrap_or_else(num_cpus::get),
            ..EngineConfig::default()
        }
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_fft_table_bits(mut self, bits: u32) -> Self {
        self.fft_table_bits = Some(bits);
        self
    }

    pub fn with_msm_chunks(mut self, min: usize, max: usize) -> Self {
        self.msm_min_chunk = min.max(1);
        self.msm_max_chunk = max.max(self.msm_min_chunk);
        self
    }

    pub fn with_fft_chunks(mut self, max_bits: u32, min: usize) -> Self {
        self.fft_max_chunk_bits = max_bits;
        self.fft_min_chunk = min.max(1);
        self
    }
}

#[test]
fn default_worker_count_is_positive() {
    assert!(EngineConfig::default().num_workers > 0);
    assert_eq!(EngineConfig::default().with_workers(0).num_workers, 1);
}
