use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes::{info, player, queue, speech},
    },
};

const API_V1: &str = "/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let guild_routes = Router::new()
        .route("/player", get(player::get_player))
        .route("/now-playing", get(player::now_playing))
        .route("/join", post(player::join))
        .route("/leave", post(player::leave))
        .route("/pause", post(player::pause))
        .route("/resume", post(player::resume))
        .route("/skip", post(player::skip))
        .route("/stop", post(player::stop))
        .route("/seek", post(player::seek))
        .route("/loop", put(player::set_loop))
        .route("/volume", put(player::set_volume))
        .route("/listeners", post(player::listeners))
        .route("/disconnected", post(player::disconnected))
        .route(
            "/queue",
            get(queue::get_queue)
                .post(queue::enqueue)
                .delete(queue::clear_queue),
        )
        .route("/queue/shuffle", post(queue::shuffle_queue))
        .route("/queue/{index}", delete(queue::remove_from_queue))
        .route(
            "/speak",
            post(speech::speak).delete(speech::skip_speech),
        )
        .route("/speak/volume", put(speech::set_tts_volume));

    let v1_routes = Router::new()
        .nest("/guilds/{guild_id}", guild_routes)
        .route("/sessions", get(info::list_sessions));

    Router::new()
        .nest(API_V1, v1_routes)
        .route("/version", get(info::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .with_state(state)
}
