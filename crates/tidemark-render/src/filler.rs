//! Background tile pre-rendering
//!
//! The cache filler opportunistically renders tiles over the active set
//! extents into the tile cache, starting from the coarsest zoom a set is
//! useful at. It pauses while settings are being updated and resumes
//! with the new snapshot afterwards.

use crate::error::RenderError;
use crate::renderer::Renderer;
use std::sync::Arc;
use tidemark_core::bbox::world_point_to_tile;
use tidemark_core::coord::WorldXy;
use tidemark_core::scale::ZoomLevelScales;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Cache filler configuration
#[derive(Debug, Clone)]
pub struct FillerConfig {
    /// Maximum tiles rendered per set and round
    pub max_per_set: usize,
    /// Deepest zoom level to pre-render
    pub max_prefill_zoom: u32,
    /// Delay between rounds
    pub round_delay: std::time::Duration,
}

impl Default for FillerConfig {
    fn default() -> Self {
        FillerConfig {
            max_per_set: 500,
            max_prefill_zoom: 10,
            round_delay: std::time::Duration::from_secs(60),
        }
    }
}

/// Handle to the background filler task
pub struct CacheFiller {
    handle: JoinHandle<()>,
    pause_tx: watch::Sender<bool>,
}

impl CacheFiller {
    /// Start the filler
    pub fn start(renderer: Arc<Renderer>, config: FillerConfig) -> Self {
        let (pause_tx, pause_rx) = watch::channel(false);
        let handle = tokio::spawn(run(renderer, config, pause_rx));
        CacheFiller { handle, pause_tx }
    }

    /// Pause or resume pre-rendering.
    ///
    /// The settings updater pauses the filler, swaps the snapshot and
    /// resumes; a paused filler finishes its current tile and waits.
    pub fn pause(&self, on: bool) {
        let _ = self.pause_tx.send(on);
        info!(paused = on, "cache filler pause state");
    }

    /// Stop the filler task
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for CacheFiller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn wait_unpaused(pause: &mut watch::Receiver<bool>) {
    while *pause.borrow() {
        if pause.changed().await.is_err() {
            return;
        }
    }
}

async fn run(renderer: Arc<Renderer>, config: FillerConfig, mut pause: watch::Receiver<bool>) {
    info!(
        max_per_set = config.max_per_set,
        max_zoom = config.max_prefill_zoom,
        "cache filler started"
    );
    loop {
        for set in renderer.catalog().sets() {
            if !set.is_active() || !set.extent.valid {
                continue;
            }
            let s52 = renderer.s52();
            let scales = ZoomLevelScales::new(s52.settings().scale);
            // the coarsest zoom where the set's coarsest chart applies
            let start_zoom = scales.zoom_for_scale(set.max_scale.max(1)).min(config.max_prefill_zoom);
            let mut rendered = 0usize;
            'zoom: for zoom in start_zoom..=config.max_prefill_zoom {
                let nw = world_point_to_tile(WorldXy::new(set.extent.xmin, set.extent.ymin), zoom);
                let se = world_point_to_tile(WorldXy::new(set.extent.xmax, set.extent.ymax), zoom);
                for y in nw.y..=se.y {
                    for x in nw.x..=se.x {
                        wait_unpaused(&mut pause).await;
                        let tile = tidemark_core::bbox::TileId::new(zoom, x, y);
                        match renderer.render_tile(&set.key, tile).await {
                            Ok(_) => rendered += 1,
                            Err(RenderError::NoCharts(_)) => {}
                            Err(e) => {
                                debug!(set = %set.key, tile = %tile, error = %e, "prefill failed");
                            }
                        }
                        if rendered >= config.max_per_set {
                            break 'zoom;
                        }
                    }
                }
            }
            if rendered > 0 {
                debug!(set = %set.key, rendered, "prefilled tiles");
            }
        }
        tokio::time::sleep(config.round_delay).await;
    }
}
