//! REST control over the library defaults that seed new sessions.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audio::{LibraryStatus, Levels, TrackSummary},
    server::AppState,
};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub library: LibraryStatus,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub success: bool,
    pub current: Option<TrackSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LevelsQuery {
    pub ambient: Option<f64>,
    pub voice: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct LevelsResponse {
    pub success: bool,
    pub levels: Levels,
}

/// GET /api/ambient/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        library: state.library.status(),
        sessions: state.registry.len(),
    })
}

/// POST /api/ambient/switch
pub async fn switch_track(State(state): State<Arc<AppState>>) -> Json<SwitchResponse> {
    let switched = state.library.switch_default();
    if let Some(track) = &switched {
        info!("Default ambient track is now '{}'", track.name);
    }
    Json(SwitchResponse {
        success: switched.is_some(),
        current: switched.or_else(|| state.library.status().current),
    })
}

/// POST /api/ambient/levels?ambient=&voice=
pub async fn set_levels(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LevelsQuery>,
) -> Json<LevelsResponse> {
    let levels = state.library.set_default_levels(query.ambient, query.voice);
    info!(
        "Default levels: ambient={:.2} voice={:.2}",
        levels.ambient, levels.voice
    );
    Json(LevelsResponse {
        success: true,
        levels,
    })
}
