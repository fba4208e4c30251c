//! HTTP routes
//!
//! The tile path follows the web-Mercator XYZ scheme:
//! `GET /charts/{set}/{z}/{x}/{y}.png`. A tile outside the set's extent
//! yields the shared empty tile (a fully transparent PNG) instead of an
//! error. Feature info always answers JSON, possibly an empty list.

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tidemark_core::bbox::{PixelBox, TileId};
use tidemark_render::RenderError;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/charts/:set/:z/:x/:y", get(tile))
        .route("/charts/:set/featureInfo", get(feature_info))
        .route("/list", get(list_sets))
        .route("/status", get(status))
        .with_state(state)
}

fn parse_y(y: &str) -> ServerResult<i32> {
    y.strip_suffix(".png")
        .unwrap_or(y)
        .parse::<i32>()
        .map_err(|_| ServerError::BadRequest(format!("invalid tile row {}", y)))
}

async fn tile(
    State(state): State<Arc<AppState>>,
    Path((set, z, x, y)): Path<(String, u32, i32, String)>,
) -> ServerResult<Response> {
    let tile = TileId::new(z, x, parse_y(&y)?);
    match state.renderer.render_tile(&set, tile).await {
        Ok(png) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/png")],
            png,
        )
            .into_response()),
        Err(RenderError::NoCharts(_)) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE.as_str(), "image/png"),
                ("x-tidemark-empty", "1"),
            ],
            empty_tile(),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// The shared fully transparent tile
fn empty_tile() -> bytes::Bytes {
    use std::sync::OnceLock;
    static EMPTY: OnceLock<bytes::Bytes> = OnceLock::new();
    EMPTY
        .get_or_init(|| {
            let drawing = tidemark_draw::DrawingContext::new(
                tidemark_core::coord::TILE_SIZE,
                tidemark_core::coord::TILE_SIZE,
            );
            tidemark_render::png::encode(&drawing).expect("empty tile encodes")
        })
        .clone()
}

#[derive(Debug, Deserialize)]
struct FeatureInfoQuery {
    z: u32,
    x: i32,
    y: i32,
    /// Click x inside the tile (pixels)
    px: i32,
    /// Click y inside the tile (pixels)
    py: i32,
    /// Half size of the click box, default 8 pixels
    tolerance: Option<i32>,
    /// Abbreviated output
    overview: Option<bool>,
}

async fn feature_info(
    State(state): State<Arc<AppState>>,
    Path(set): Path<String>,
    Query(query): Query<FeatureInfoQuery>,
) -> ServerResult<Response> {
    let tile = TileId::new(query.z, query.x, query.y);
    let tolerance = query.tolerance.unwrap_or(8).clamp(1, 64);
    let click_box = PixelBox::new(
        query.px - tolerance,
        query.py - tolerance,
        query.px + tolerance,
        query.py + tolerance,
    );
    let descriptions = state
        .renderer
        .feature_info(&set, tile, click_box, query.overview.unwrap_or(false))
        .await?;
    Ok(Json(descriptions).into_response())
}

async fn list_sets(State(state): State<Arc<AppState>>) -> Response {
    let sets: Vec<serde_json::Value> = state
        .catalog
        .sets()
        .iter()
        .map(|set| {
            serde_json::json!({
                "key": set.key,
                "title": set.info.title,
                "edition": set.info.edition,
                "validTo": set.info.valid_to,
                "state": format!("{:?}", set.state),
                "numCharts": set.num_charts(),
                "token": set.token,
                "degraded": set.is_degraded(),
            })
        })
        .collect();
    Json(serde_json::json!({ "status": "OK", "sets": sets })).into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Response {
    let chart_cache = state.renderer.chart_cache();
    let tile_cache = state.renderer.tile_cache();
    let (hits, misses) = tile_cache.stats();
    let s52 = state.renderer.s52();
    Json(serde_json::json!({
        "status": "OK",
        "chartCache": {
            "entries": chart_cache.len(),
            "currentKb": chart_cache.current_size_kb(),
            "maxKb": chart_cache.max_size_kb(),
        },
        "tileCache": {
            "entries": tile_cache.len(),
            "bytes": tile_cache.current_bytes(),
            "hits": hits,
            "misses": misses,
        },
        "settings": {
            "sequence": s52.sequence(),
            "md5": s52.md5().to_string(),
        },
        "symbolMemory": s52.symbol_mem_usage(),
    }))
    .into_response()
}
