//! # psinet Compute
//!
//! Step engines for psinet node nets.
//!
//! Two engines are available:
//! - **Scalar**: one link, one node at a time (lives in `psinet-core`)
//! - **Batched**: flattened link buffers, evaluated with Rayon
//!
//! ## Engine Selection
//!
//! Set `PSINET_ENGINE` (or `engine.kind` in the config file):
//! - `scalar` - Force the scalar engine
//! - `batched` - Force the batched engine
//! - `auto` (default) - Batched once the net reaches `batch_min_nodes`

pub mod engine;

pub use engine::BatchedEngine;

use psinet_core::config::{EngineConfig, EngineKind};
use psinet_core::engine::ScalarEngine;
use psinet_core::nodenet::Nodenet;
use psinet_core::traits::StepEngine;

/// Create the step engine appropriate for a net of `node_count` nodes
pub fn create_engine(config: &EngineConfig, node_count: usize) -> Box<dyn StepEngine> {
    match config.kind {
        EngineKind::Auto => {
            if node_count >= config.batch_min_nodes {
                tracing::info!(
                    "Using batched engine for {} nodes (threshold {})",
                    node_count,
                    config.batch_min_nodes
                );
                Box::new(BatchedEngine::new(config))
            } else {
                tracing::info!("Using scalar engine for {} nodes", node_count);
                Box::new(ScalarEngine::new())
            }
        }
        EngineKind::Scalar => {
            tracing::info!("Using scalar engine");
            Box::new(ScalarEngine::new())
        }
        EngineKind::Batched => {
            tracing::info!("Using batched engine (parallel: {})", config.parallel);
            Box::new(BatchedEngine::new(config))
        }
    }
}

/// Re-select the engine of a net from its own configuration and current size
pub fn select_engine(net: &mut Nodenet) {
    let engine = create_engine(&net.config().engine, net.node_count());
    net.set_engine(engine);
}
