//! Generation layers and the protocol they share.

mod lands_and_seas;
mod zoom;

pub use lands_and_seas::{LandsAndSeasAlgorithm, LandsAndSeasLayer};
pub use zoom::ZoomLayer;

use crate::data::{ChunkBounds, GenerationData};
use crate::error::GenerationError;

/// One deterministic transform over chunk data.
///
/// `process` receives `bounds` in the layer's own input coordinate space. Any
/// randomness must be derived from `(seed, layer name, chunk coordinate)` via
/// [`crate::seed::layer_rng`], never from shared state, so results do not
/// depend on call order.
pub trait GenerationLayer: Send + Sync {
    fn name(&self) -> &str;

    fn process(
        &self,
        data: GenerationData,
        bounds: ChunkBounds,
    ) -> Result<GenerationData, GenerationError>;

    /// How many output chunks per axis each input chunk becomes.
    fn subdivision_factor(&self) -> u32 {
        1
    }

    /// Name plus key parameters, for startup logging.
    fn config_summary(&self) -> String;
}

/// Neighbour offsets for the 8-cell Moore neighbourhood.
pub(crate) const MOORE: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Neighbour offsets for the 4-cell Von Neumann neighbourhood.
pub(crate) const VON_NEUMANN: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
