//! Coarse land/water classification of base chunks.

use std::fmt;
use std::str::FromStr;

use noise::{NoiseFn, Perlin};
use rand::Rng;
use tessera_chunks::TileType;
use tessera_config::{CellularAutomataConfig, LandsAndSeasConfig, PerlinNoiseConfig};
use tracing::trace;

use super::{GenerationLayer, MOORE};
use crate::data::{ChunkBounds, GenerationData, MetaValue};
use crate::error::{ConfigurationError, GenerationError};
use crate::seed::layer_rng;

const LAYER_NAME: &str = "lands_and_seas";

/// Side length of the local automaton grid centred on the target chunk.
const AUTOMATON_GRID: usize = 7;

/// How a base chunk's tag is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandsAndSeasAlgorithm {
    /// Independent per-chunk draw.
    RandomChunks,
    /// Multi-octave Perlin noise thresholded by the land ratio.
    PerlinNoise,
    /// Birth/death automaton over a small neighbourhood grid.
    CellularAutomata,
}

impl LandsAndSeasAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RandomChunks => "random_chunks",
            Self::PerlinNoise => "perlin_noise",
            Self::CellularAutomata => "cellular_automata",
        }
    }
}

impl fmt::Display for LandsAndSeasAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LandsAndSeasAlgorithm {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_chunks" => Ok(Self::RandomChunks),
            "perlin_noise" => Ok(Self::PerlinNoise),
            "cellular_automata" => Ok(Self::CellularAutomata),
            other => Err(ConfigurationError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Assigns every chunk in bounds a land or water tag.
#[derive(Debug, Clone)]
pub struct LandsAndSeasLayer {
    land_ratio: i32,
    algorithm: LandsAndSeasAlgorithm,
    perlin: PerlinNoiseConfig,
    automaton: CellularAutomataConfig,
}

impl LandsAndSeasLayer {
    /// Validates the configuration. An out-of-range ratio or unknown algorithm
    /// is rejected, never clamped.
    pub fn new(config: &LandsAndSeasConfig) -> Result<Self, ConfigurationError> {
        if !(1..=10).contains(&config.land_ratio) {
            return Err(ConfigurationError::InvalidLandRatio(config.land_ratio));
        }
        let algorithm: LandsAndSeasAlgorithm = config.algorithm.parse()?;

        match algorithm {
            LandsAndSeasAlgorithm::PerlinNoise => {
                let p = &config.perlin_noise;
                if p.octaves == 0 {
                    return Err(ConfigurationError::InvalidParameter {
                        name: "perlin_noise.octaves",
                        reason: "must be at least 1".to_string(),
                    });
                }
                if !(p.scale.is_finite() && p.scale > 0.0) {
                    return Err(ConfigurationError::InvalidParameter {
                        name: "perlin_noise.scale",
                        reason: format!("must be positive, got {}", p.scale),
                    });
                }
            }
            LandsAndSeasAlgorithm::CellularAutomata => {
                let p = config.cellular_automata.initial_land_probability;
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigurationError::InvalidProbability {
                        name: "cellular_automata.initial_land_probability",
                        value: p,
                    });
                }
            }
            LandsAndSeasAlgorithm::RandomChunks => {}
        }

        Ok(Self {
            land_ratio: config.land_ratio,
            algorithm,
            perlin: config.perlin_noise.clone(),
            automaton: config.cellular_automata.clone(),
        })
    }

    pub fn algorithm(&self) -> LandsAndSeasAlgorithm {
        self.algorithm
    }

    pub fn land_ratio(&self) -> i32 {
        self.land_ratio
    }

    fn random_chunk(&self, seed: u64, x: i64, y: i64) -> bool {
        let mut rng = layer_rng(seed, LAYER_NAME, x, y, "random_chunks");
        rng.random_range(1..=10) <= self.land_ratio
    }

    /// fBm over Perlin noise, normalized to `[0, 1]`.
    fn noise_value(&self, perlin: &Perlin, x: i64, y: i64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut amplitude_sum = 0.0;
        let mut frequency = self.perlin.scale;

        for _ in 0..self.perlin.octaves {
            // Half-cell offset keeps integer chunk coordinates off the lattice,
            // where Perlin noise is always zero.
            let nx = (x as f64 + 0.5) * frequency;
            let ny = (y as f64 + 0.5) * frequency;
            total += perlin.get([nx, ny]) * amplitude;
            amplitude_sum += amplitude;
            amplitude *= self.perlin.persistence;
            frequency *= self.perlin.lacunarity;
        }

        if amplitude_sum <= 0.0 {
            return 0.5;
        }
        ((total / amplitude_sum + 1.0) / 2.0).clamp(0.0, 1.0)
    }

    fn land_threshold(&self) -> f64 {
        1.0 - f64::from(self.land_ratio) / 10.0
    }

    /// Runs the automaton on a grid centred on `(x, y)` and returns the centre.
    ///
    /// Initial cells are seeded by world chunk position, so neighbouring
    /// chunks see overlapping grids. Cells outside the grid count as water.
    fn automaton_center(&self, seed: u64, x: i64, y: i64) -> bool {
        let n = AUTOMATON_GRID;
        let half = (n / 2) as i64;
        let p = self.automaton.initial_land_probability;

        let mut grid = vec![false; n * n];
        for gy in 0..n {
            for gx in 0..n {
                let wx = x + gx as i64 - half;
                let wy = y + gy as i64 - half;
                let mut rng = layer_rng(seed, LAYER_NAME, wx, wy, "automaton_cell");
                grid[gy * n + gx] = rng.random::<f64>() < p;
            }
        }

        let mut next = vec![false; n * n];
        for _ in 0..self.automaton.iterations {
            for gy in 0..n {
                for gx in 0..n {
                    let land_neighbors = MOORE
                        .iter()
                        .filter(|(dx, dy)| {
                            let nx = gx as i64 + dx;
                            let ny = gy as i64 + dy;
                            (0..n as i64).contains(&nx)
                                && (0..n as i64).contains(&ny)
                                && grid[ny as usize * n + nx as usize]
                        })
                        .count() as u32;

                    let idx = gy * n + gx;
                    next[idx] = if grid[idx] {
                        land_neighbors >= self.automaton.death_limit
                    } else {
                        land_neighbors > self.automaton.birth_limit
                    };
                }
            }
            std::mem::swap(&mut grid, &mut next);
        }

        grid[half as usize * n + half as usize]
    }
}

/// Perlin takes a 32-bit seed; fold both halves of the world seed in.
fn perlin_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

impl GenerationLayer for LandsAndSeasLayer {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn process(
        &self,
        mut data: GenerationData,
        bounds: ChunkBounds,
    ) -> Result<GenerationData, GenerationError> {
        let seed = data.seed;
        let perlin = Perlin::new(perlin_seed(seed));
        let threshold = self.land_threshold();

        for (x, y) in bounds.coords() {
            let is_land = match self.algorithm {
                LandsAndSeasAlgorithm::RandomChunks => self.random_chunk(seed, x, y),
                LandsAndSeasAlgorithm::PerlinNoise => {
                    let value = self.noise_value(&perlin, x, y);
                    data.set_chunk_property(x, y, "noise", MetaValue::Float(value));
                    value > threshold
                }
                LandsAndSeasAlgorithm::CellularAutomata => self.automaton_center(seed, x, y),
            };
            let land_type = if is_land { TileType::Land } else { TileType::Water };
            data.set_land_type(x, y, land_type);
        }

        trace!(
            algorithm = %self.algorithm,
            chunks = bounds.width() * bounds.height(),
            land = data.land_count(),
            "Classified base chunks"
        );

        data.mark_processed(LAYER_NAME);
        Ok(data)
    }

    fn config_summary(&self) -> String {
        let detail = match self.algorithm {
            LandsAndSeasAlgorithm::RandomChunks => String::new(),
            LandsAndSeasAlgorithm::PerlinNoise => format!(
                ", scale={}, octaves={}, persistence={}, lacunarity={}",
                self.perlin.scale, self.perlin.octaves, self.perlin.persistence, self.perlin.lacunarity
            ),
            LandsAndSeasAlgorithm::CellularAutomata => format!(
                ", initial_land_probability={}, iterations={}, birth_limit={}, death_limit={}",
                self.automaton.initial_land_probability,
                self.automaton.iterations,
                self.automaton.birth_limit,
                self.automaton.death_limit
            ),
        };
        format!(
            "{LAYER_NAME}: land_ratio={} ({}% land), algorithm={}{detail}",
            self.land_ratio,
            self.land_ratio * 10,
            self.algorithm
        )
    }
}
