//! Subdivide-and-refine layer.
//!
//! Each parent chunk becomes `factor x factor` children inheriting its tag,
//! then a cellular automaton over the children carves coastlines. All rolls
//! are drawn from per-chunk RNGs keyed by subdivision level, pass and
//! iteration, so results are independent of processing order.

use std::collections::BTreeMap;

use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use tessera_chunks::TileType;
use tessera_config::ZoomConfig;
use tracing::trace;

use super::{GenerationLayer, MOORE, VON_NEUMANN};
use crate::data::{ChunkBounds, ChunkRecord, GenerationData, MetaValue};
use crate::error::{ConfigurationError, GenerationError};
use crate::seed::{hashed_unit, layer_rng};

const LAYER_NAME: &str = "zoom";

/// Parameters of one automaton pass.
#[derive(Clone, Copy, Debug)]
struct Pass {
    index: u32,
    iterations: u32,
    expansion_threshold: u32,
    erosion_probability: f64,
}

type Tags = FxHashMap<(i64, i64), bool>;

/// Subdivides chunks and refines the land/water boundary.
#[derive(Debug, Clone)]
pub struct ZoomLayer {
    config: ZoomConfig,
}

impl ZoomLayer {
    /// Rejects a subdivision factor below 2 and any probability outside `[0, 1]`.
    pub fn new(config: &ZoomConfig) -> Result<Self, ConfigurationError> {
        if config.subdivision_factor < 2 {
            return Err(ConfigurationError::InvalidSubdivisionFactor(
                config.subdivision_factor,
            ));
        }
        let probabilities = [
            ("erosion_probability", config.erosion_probability),
            ("pass_1_erosion_probability", config.pass_1_erosion_probability),
            ("pass_2_erosion_probability", config.pass_2_erosion_probability),
            ("noise_probability", config.noise_probability),
            ("edge_noise_probability", config.edge_noise_probability),
            ("perturbation_strength", config.perturbation_strength),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::InvalidProbability { name, value });
            }
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    fn passes(&self) -> Vec<Pass> {
        let c = &self.config;
        if c.use_multi_pass {
            vec![
                Pass {
                    index: 1,
                    iterations: c.pass_1_iterations,
                    expansion_threshold: c.pass_1_expansion_threshold,
                    erosion_probability: c.pass_1_erosion_probability,
                },
                Pass {
                    index: 2,
                    iterations: c.pass_2_iterations,
                    expansion_threshold: c.pass_2_expansion_threshold,
                    erosion_probability: c.pass_2_erosion_probability,
                },
            ]
        } else {
            vec![Pass {
                index: 0,
                iterations: c.iterations,
                expansion_threshold: c.land_expansion_threshold,
                erosion_probability: c.erosion_probability,
            }]
        }
    }

    fn neighborhood(&self) -> &'static [(i64, i64)] {
        if self.config.use_moore_neighborhood {
            &MOORE
        } else {
            &VON_NEUMANN
        }
    }

    /// `(land neighbours, in-bounds neighbours)`. Out-of-bounds cells never
    /// count as land and are not part of the total.
    fn count_neighbors(&self, tags: &Tags, x: i64, y: i64, bounds: &ChunkBounds) -> (u32, u32) {
        let mut land = 0;
        let mut total = 0;
        for (dx, dy) in self.neighborhood() {
            let (nx, ny) = (x + dx, y + dy);
            if !bounds.contains(nx, ny) {
                continue;
            }
            total += 1;
            if tags.get(&(nx, ny)).copied().unwrap_or(false) {
                land += 1;
            }
        }
        (land, total)
    }

    /// True when any in-bounds Moore neighbour carries the other tag.
    fn is_at_boundary(tags: &Tags, x: i64, y: i64, bounds: &ChunkBounds) -> bool {
        let Some(&is_land) = tags.get(&(x, y)) else {
            return false;
        };
        MOORE.iter().any(|(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            bounds.contains(nx, ny)
                && tags.get(&(nx, ny)).is_some_and(|&other| other != is_land)
        })
    }

    fn apply_rules(
        &self,
        is_land: bool,
        land_neighbors: u32,
        total_neighbors: u32,
        pass: &Pass,
        erosion_roll: f64,
    ) -> bool {
        let c = &self.config;
        if c.protect_interior
            && land_neighbors == total_neighbors
            && total_neighbors >= c.interior_threshold
        {
            return true;
        }
        if is_land {
            !(erosion_roll < pass.erosion_probability && land_neighbors < total_neighbors)
        } else {
            land_neighbors >= pass.expansion_threshold
        }
    }

    fn iterate(
        &self,
        seed: u64,
        level: u32,
        pass: &Pass,
        iteration: u32,
        tags: &Tags,
        bounds: &ChunkBounds,
    ) -> Tags {
        let c = &self.config;
        let mut next = tags.clone();
        for (&(x, y), &is_land) in tags {
            if !bounds.contains(x, y) {
                continue;
            }
            let mut rng = layer_rng(seed, LAYER_NAME, x, y, (level, pass.index, iteration));
            let erosion_roll: f64 = rng.random();
            let noise_roll: f64 = rng.random();

            let (land, total) = self.count_neighbors(tags, x, y, bounds);
            let mut new_is_land = self.apply_rules(is_land, land, total, pass, erosion_roll);

            let at_boundary = c.edge_noise_boost && Self::is_at_boundary(tags, x, y, bounds);
            let noise_probability = if at_boundary {
                c.edge_noise_probability
            } else {
                c.noise_probability
            };
            if c.add_noise && noise_roll < noise_probability {
                new_is_land = !new_is_land;
            }
            next.insert((x, y), new_is_land);
        }
        next
    }

    /// Cheap three-octave hashed noise in `[0, 1]`.
    fn fractal_noise(seed: u64, x: i64, y: i64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency: f64 = 0.1;
        for octave in 0..3u32 {
            let fx = (x as f64 * frequency).to_bits();
            let fy = (y as f64 * frequency).to_bits();
            total += hashed_unit(seed, "zoom_fractal", 0, 0, (fx, fy, octave)) * amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        (total / 1.75).clamp(0.0, 1.0)
    }

    /// Returns the coordinates whose tag was changed.
    fn perturb(
        &self,
        seed: u64,
        level: u32,
        tags: &mut Tags,
        bounds: &ChunkBounds,
    ) -> Vec<(i64, i64)> {
        let mut changed = Vec::new();
        for (&(x, y), is_land) in tags.iter_mut() {
            if !bounds.contains(x, y) {
                continue;
            }
            let roll = hashed_unit(seed, LAYER_NAME, x, y, ("perturb", level));
            if roll >= self.config.perturbation_strength {
                continue;
            }
            let noise = Self::fractal_noise(seed, x, y);
            let new_is_land = if noise > 0.6 {
                true
            } else if noise < 0.4 {
                false
            } else {
                *is_land
            };
            if new_is_land != *is_land {
                *is_land = new_is_land;
                changed.push((x, y));
            }
        }
        changed
    }

    /// 4-connected land regions within `bounds`.
    fn land_regions(tags: &Tags, bounds: &ChunkBounds) -> Vec<Vec<(i64, i64)>> {
        let mut visited: FxHashSet<(i64, i64)> = FxHashSet::default();
        let mut regions = Vec::new();

        for start in bounds.coords() {
            if visited.contains(&start) || !tags.get(&start).copied().unwrap_or(false) {
                continue;
            }
            let mut region = Vec::new();
            let mut stack = vec![start];
            visited.insert(start);
            while let Some((x, y)) = stack.pop() {
                region.push((x, y));
                for (dx, dy) in VON_NEUMANN {
                    let next = (x + dx, y + dy);
                    if bounds.contains(next.0, next.1)
                        && tags.get(&next).copied().unwrap_or(false)
                        && visited.insert(next)
                    {
                        stack.push(next);
                    }
                }
            }
            regions.push(region);
        }
        regions
    }
}

impl GenerationLayer for ZoomLayer {
    fn name(&self) -> &str {
        LAYER_NAME
    }

    fn subdivision_factor(&self) -> u32 {
        self.config.subdivision_factor
    }

    fn process(
        &self,
        mut data: GenerationData,
        bounds: ChunkBounds,
    ) -> Result<GenerationData, GenerationError> {
        let factor = self.config.subdivision_factor;
        let f = i64::from(factor);
        let child_size = (data.chunk_size / factor).max(1);

        // --- Subdivide every chunk; children replace their parents ---
        let parents = std::mem::take(&mut data.chunks);
        let mut children: BTreeMap<(i64, i64), ChunkRecord> = BTreeMap::new();
        let mut level = 0;
        for parent in parents.into_values() {
            for sx in 0..f {
                for sy in 0..f {
                    let cx = parent.chunk_x * f + sx;
                    let cy = parent.chunk_y * f + sy;
                    let child = ChunkRecord {
                        chunk_x: cx,
                        chunk_y: cy,
                        chunk_size: child_size,
                        land_type: parent.land_type,
                        parent: Some(parent.coord()),
                        subdivision_level: parent.subdivision_level + 1,
                        original_chunk_size: parent.original_chunk_size,
                        extensions: BTreeMap::new(),
                    };
                    level = level.max(child.subdivision_level);
                    children.insert((cx, cy), child);
                }
            }
        }
        data.chunk_size = child_size;
        let sub_bounds = bounds.subdivided(factor);

        // --- Refine tags inside the subdivided bounds ---
        let mut tags: Tags = children
            .values()
            .filter(|r| sub_bounds.contains(r.chunk_x, r.chunk_y))
            .map(|r| ((r.chunk_x, r.chunk_y), r.is_land()))
            .collect();

        let min_island = self.config.min_island_size as usize;
        let small_islands: Vec<(i64, i64)> = if self.config.preserve_islands {
            Self::land_regions(&tags, &sub_bounds)
                .into_iter()
                .filter(|region| region.len() < min_island)
                .flatten()
                .collect()
        } else {
            Vec::new()
        };

        let perturbed = if self.config.fractal_perturbation {
            self.perturb(data.seed, level, &mut tags, &sub_bounds)
        } else {
            Vec::new()
        };

        for pass in self.passes() {
            for iteration in 0..pass.iterations {
                tags = self.iterate(data.seed, level, &pass, iteration, &tags, &sub_bounds);
            }
        }

        for coord in &small_islands {
            tags.insert(*coord, true);
        }

        for ((x, y), is_land) in tags {
            if let Some(record) = children.get_mut(&(x, y)) {
                record.land_type = Some(if is_land { TileType::Land } else { TileType::Water });
            }
        }
        for (x, y) in &perturbed {
            if let Some(record) = children.get_mut(&(*x, *y)) {
                record.extensions.insert("perturbed".to_string(), MetaValue::Bool(true));
            }
        }

        data.chunks = children;

        trace!(
            level,
            chunk_size = child_size,
            chunks = data.chunks.len(),
            land = data.land_count(),
            perturbed = perturbed.len(),
            restored = small_islands.len(),
            "Zoom refined chunks"
        );

        data.mark_processed(LAYER_NAME);
        Ok(data)
    }

    fn config_summary(&self) -> String {
        let c = &self.config;
        format!(
            "{LAYER_NAME}: subdivision_factor={}, land_expansion_threshold={}, erosion_probability={}, \
             iterations={}, multi_pass={}, protect_interior={}, moore={}, preserve_islands={}, add_noise={}",
            c.subdivision_factor,
            c.land_expansion_threshold,
            c.erosion_probability,
            c.iterations,
            c.use_multi_pass,
            c.protect_interior,
            c.use_moore_neighborhood,
            c.preserve_islands,
            c.add_noise
        )
    }
}
