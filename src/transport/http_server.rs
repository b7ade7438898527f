use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    server::AppState,
    transport::{middleware::add_response_headers, routes::ambient, websocket_server},
};

const API: &str = "/api";

pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/ambient/status", get(ambient::get_status))
        .route("/ambient/switch", post(ambient::switch_track))
        .route("/ambient/levels", post(ambient::set_levels));

    Router::new()
        .route("/client", get(websocket_server::websocket_handler))
        .nest(API, api_routes)
        .layer(middleware::from_fn(add_response_headers))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
