//! Synthetic GPS tracks for stress testing and benchmarking.
//!
//! Generates an irregularly sampled track that stays around one of several
//! named clusters, occasionally jumping to another cluster and occasionally
//! going quiet for a long stretch. The output is deterministic for a seed.
//!
//! Feature-gated behind `synthetic`; not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use geodwell::synthetic::SyntheticScenario;
//!
//! let scenario = SyntheticScenario::demo(1_735_689_600_000, 500, 42);
//! let fixes = scenario.generate();
//! assert_eq!(fixes.len(), 500);
//! assert!(fixes.windows(2).all(|w| w[0].time_ms < w[1].time_ms));
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Fence, Fix, GpsPoint};

// ============================================================================
// Types
// ============================================================================

/// A place the subject lingers around.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub center: GpsPoint,
}

impl Cluster {
    pub fn new(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            center: GpsPoint::new(latitude, longitude),
        }
    }

    /// A fence around this cluster that contains all of its jitter.
    pub fn fence(&self, radius_m: f64) -> Fence {
        Fence {
            center: self.center,
            radius_m,
        }
    }
}

/// Scenario configuration for generating a synthetic track.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Epoch milliseconds of the first sample.
    pub start_ms: i64,
    /// Number of fixes to generate.
    pub rows: usize,
    pub clusters: Vec<Cluster>,
    /// Half-width of the uniform position jitter around a cluster, in degrees.
    pub jitter_deg: f64,
    /// Chance per sample of jumping to a random cluster.
    pub switch_probability: f64,
    /// Chance per sample of a 30–90 minute gap instead of a 1–10 minute step.
    pub long_gap_probability: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

// ============================================================================
// Generation
// ============================================================================

/// Short sampling step bounds in seconds.
const SHORT_STEP_S: (f64, f64) = (60.0, 600.0);
/// Long gap bounds in seconds.
const LONG_GAP_S: (f64, f64) = (30.0 * 60.0, 90.0 * 60.0);

impl SyntheticScenario {
    /// Four clusters: two close together in Shanghai, two far-away trips.
    pub fn demo(start_ms: i64, rows: usize, seed: u64) -> Self {
        Self {
            start_ms,
            rows,
            clusters: vec![
                Cluster::new("shanghai_lab", 31.2304, 121.4737),
                Cluster::new("shanghai_home", 31.2222, 121.4588),
                Cluster::new("beijing_trip", 39.9042, 116.4074),
                Cluster::new("shenzhen_trip", 22.5431, 114.0579),
            ],
            jitter_deg: 0.0015,
            switch_probability: 0.03,
            long_gap_probability: 0.08,
            seed,
        }
    }

    /// Generate a strictly time-ordered track.
    pub fn generate(&self) -> Vec<Fix> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fixes = Vec::with_capacity(self.rows);
        if self.clusters.is_empty() {
            return fixes;
        }

        let mut cluster = &self.clusters[rng.gen_range(0..self.clusters.len())];
        let mut now_ms = self.start_ms;

        for _ in 0..self.rows {
            if rng.r#gen::<f64>() < self.switch_probability {
                cluster = &self.clusters[rng.gen_range(0..self.clusters.len())];
            }

            let step_s = if rng.r#gen::<f64>() < self.long_gap_probability {
                rng.gen_range(LONG_GAP_S.0..LONG_GAP_S.1)
            } else {
                rng.gen_range(SHORT_STEP_S.0..SHORT_STEP_S.1)
            };
            now_ms += (step_s * 1000.0) as i64;

            let jitter = self.jitter_deg;
            let lat = cluster.center.latitude + rng.gen_range(-jitter..=jitter);
            let lon = cluster.center.longitude + rng.gen_range(-jitter..=jitter);
            fixes.push(Fix::new(now_ms, lat, lon));
        }

        fixes
    }

    /// Find a cluster by name.
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }
}
