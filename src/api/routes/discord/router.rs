//! Router for Discord's interactions endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
};
use http::StatusCode;

use super::public::{self, Interaction, InteractionResponse};
use super::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::events::submit_vote_in_background;
use crate::messaging::render;

type SharedState = Arc<AppState>;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// Answer pings and RSVP button clicks
async fn interactions(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(verifier) = &state.interactions else {
        return Ok((StatusCode::NOT_FOUND, "Discord interactions are not configured").into_response());
    };
    let verified = match (
        header(&headers, SIGNATURE_HEADER),
        header(&headers, TIMESTAMP_HEADER),
    ) {
        (Some(signature), Some(timestamp)) => verifier.verify(signature, timestamp, &body),
        _ => false,
    };
    if !verified {
        tracing::warn!("Rejected an interaction with a bad signature");
        return Ok((StatusCode::UNAUTHORIZED, "invalid request signature").into_response());
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            return Ok(
                (StatusCode::BAD_REQUEST, format!("Invalid interaction: {}", e)).into_response(),
            );
        }
    };

    let reply = match interaction.kind {
        public::PING => InteractionResponse::pong(),
        public::MESSAGE_COMPONENT => match interaction.vote() {
            Some(vote) => {
                let status = vote.status;
                let outcome = submit_vote_in_background(&state.ctx, vote).await?;
                InteractionResponse::ephemeral(render::vote_reply(outcome, status))
            }
            None => InteractionResponse::ephemeral(render::UNKNOWN_BUTTON),
        },
        other => {
            tracing::debug!("Ignoring interaction of type {}", other);
            InteractionResponse::ephemeral(render::UNKNOWN_BUTTON)
        }
    };
    Ok(Json(reply).into_response())
}

/// Create the Discord router
pub fn router() -> Router<SharedState> {
    Router::new().route("/interactions", post(interactions))
}
