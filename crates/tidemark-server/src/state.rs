//! Shared application state

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tidemark_cache::{ChartCache, ChartCacheConfig, HouseKeeper, OpenerConfig, OpenerPool, TileCache};
use tidemark_catalog::info_cache::ChartInfoCache;
use tidemark_catalog::Catalog;
use tidemark_render::font::FontBook;
use tidemark_render::{CacheFiller, FillerConfig, Renderer, RendererConfig};
use tidemark_s52::{RenderSettings, S52Data};
use tracing::{info, warn};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppState {
    /// The configuration the server started with
    pub config: ServerConfig,
    /// The chart set catalog
    pub catalog: Arc<Catalog>,
    /// The renderer
    pub renderer: Arc<Renderer>,
    filler: Mutex<Option<CacheFiller>>,
    _housekeeper: HouseKeeper,
}

impl AppState {
    /// Build all components from the configuration.
    ///
    /// Chart sets are scanned and, where possible, their headers come
    /// from the persisted chart-info cache; the rest parse lazily on
    /// first use.
    pub async fn new(config: ServerConfig) -> ServerResult<Arc<AppState>> {
        let catalog = Arc::new(Catalog::new());
        for dir in &config.chart_dirs {
            match catalog.scan_directory(dir) {
                Ok(set) => info!(set = %set.key, charts = set.num_charts(), "registered chart set"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "unable to scan chart directory"),
            }
        }
        if !config.chart_info_cache.is_empty() {
            match ChartInfoCache::read(std::path::Path::new(&config.chart_info_cache)) {
                Ok(cache) => {
                    let missing = cache.apply(&catalog);
                    let vanished = catalog.remove_unverified();
                    info!(missing, vanished, "applied chart info cache");
                }
                Err(e) => info!(error = %e, "no usable chart info cache"),
            }
        }

        let opener = if config.opener_command.is_empty() {
            None
        } else {
            Some(Arc::new(OpenerPool::new(OpenerConfig {
                command: config.opener_command.clone().into(),
                workers: config.opener_workers,
                ..OpenerConfig::default()
            })))
        };

        let fonts = if config.font_file.is_empty() {
            None
        } else {
            let data = std::fs::read(&config.font_file)
                .map_err(|e| ServerError::BadConfig(format!("font file: {}", e)))?;
            Some(Arc::new(FontBook::new(data).map_err(ServerError::BadConfig)?))
        };

        let chart_cache = Arc::new(ChartCache::new(ChartCacheConfig {
            max_size_kb: config.chart_cache_kb,
            ..ChartCacheConfig::default()
        }));
        let tile_cache = Arc::new(TileCache::new(config.tile_cache_bytes));
        let housekeeper = HouseKeeper::start(
            chart_cache.clone(),
            Duration::from_secs(config.housekeeper_interval_secs.max(1)),
            Duration::from_secs(config.chart_idle_secs.max(1)),
        );

        let mut settings = RenderSettings::default();
        settings.sequence = 1;
        let s52 = build_s52(settings)?;
        let renderer = Arc::new(Renderer::new(
            catalog.clone(),
            chart_cache,
            tile_cache,
            opener,
            s52,
            fonts,
            RendererConfig {
                render_debug: config.render_debug,
            },
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            catalog,
            renderer: renderer.clone(),
            filler: Mutex::new(None),
            _housekeeper: housekeeper,
        });
        if config.enable_filler {
            *state.filler.lock() = Some(CacheFiller::start(renderer, FillerConfig::default()));
        }
        Ok(state)
    }

    /// Persist the current chart headers so the next start can skip
    /// most header parses.
    pub fn write_chart_info_cache(&self) -> ServerResult<()> {
        if self.config.chart_info_cache.is_empty() {
            return Ok(());
        }
        ChartInfoCache::from_catalog(&self.catalog)
            .write(std::path::Path::new(&self.config.chart_info_cache))
            .map_err(|e| ServerError::Internal(e.to_string()))
    }

    /// Publish new render settings.
    ///
    /// Stops the filler, builds and swaps the S-52 snapshot (bumping the
    /// sequence), then resumes the filler. The order matters: no tile
    /// must be cached under a stale key.
    pub fn update_settings(&self, mut settings: RenderSettings) -> ServerResult<()> {
        if let Some(filler) = self.filler.lock().as_ref() {
            filler.pause(true);
        }
        settings.sequence = self.renderer.s52().sequence() + 1;
        let result = build_s52(settings).map(|s52| self.renderer.update_s52(s52));
        if let Some(filler) = self.filler.lock().as_ref() {
            filler.pause(false);
        }
        result
    }
}

/// Build an S-52 snapshot for settings.
///
/// The presentation library tables are registered by the deployment
/// (pre-parsed); the default build carries the color fallbacks only.
fn build_s52(settings: RenderSettings) -> ServerResult<Arc<S52Data>> {
    let mut data = S52Data::new(settings.into_shared());
    data.build_rules()
        .map_err(|e| ServerError::BadConfig(e.to_string()))?;
    Ok(Arc::new(data))
}
