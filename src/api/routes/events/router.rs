//! Router for the events API

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use http::StatusCode;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::events::attendance::summarize;
use crate::events::models::parse_snowflake;
use crate::events::publish::{cancel_event, delete_event, publish_event};
use crate::events::{EventError, Vote, VoteOutcome, db as events_db, submit_vote};

type SharedState = Arc<AppState>;

// Create and publish an event
async fn create_event(
    State(state): State<SharedState>,
    Json(req): Json<public::CreateEventRequest>,
) -> Result<(StatusCode, Json<public::EventResponse>), ApiError> {
    let ctx = &state.ctx;
    let params = req.into_params()?;
    let event = publish_event(ctx, &params).await?;
    Ok((
        StatusCode::CREATED,
        Json(public::EventResponse::new(&event, &ctx.civil)),
    ))
}

// List tracked events, soonest first
async fn list_events(
    State(state): State<SharedState>,
) -> Result<Json<public::EventListResponse>, ApiError> {
    let ctx = &state.ctx;
    let events = events_db::find_all_events(&ctx.db).await?;
    Ok(Json(public::EventListResponse {
        events: events
            .iter()
            .map(|event| public::EventResponse::new(event, &ctx.civil))
            .collect(),
    }))
}

// View an event and its roster
async fn view_event(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::EventDetailResponse>, ApiError> {
    let ctx = &state.ctx;
    let event_id = parse_snowflake(&id)?;
    let event = events_db::find_event(&ctx.db, event_id)
        .await?
        .ok_or(EventError::NotFound(event_id))?;
    let summary = summarize(&ctx.db, event_id).await?;
    Ok(Json(public::EventDetailResponse {
        event: public::EventResponse::new(&event, &ctx.civil),
        attendance: public::AttendanceResponse::from(&summary),
    }))
}

async fn cancel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<public::CancelEventResponse>, ApiError> {
    let event_id = parse_snowflake(&id)?;
    let changed = cancel_event(&state.ctx, event_id).await?;
    Ok(Json(public::CancelEventResponse { changed }))
}

async fn delete(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let event_id = parse_snowflake(&id)?;
    delete_event(&state.ctx, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Record an RSVP button click
async fn vote(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<public::VoteRequest>,
) -> Result<(StatusCode, Json<public::VoteResponse>), ApiError> {
    let vote = Vote {
        event_id: parse_snowflake(&id)?,
        user_id: parse_snowflake(&req.user_id)?,
        display_name: req.display_name,
        status: req.status,
    };
    let outcome = submit_vote(&state.ctx, &vote).await?;
    let status = match outcome {
        VoteOutcome::Recorded => StatusCode::OK,
        VoteOutcome::EventCancelled | VoteOutcome::EventEnded => StatusCode::CONFLICT,
        VoteOutcome::NotFound => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(public::VoteResponse { outcome })))
}

/// Create the events router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_event).get(list_events))
        .route("/{id}", get(view_event).delete(delete))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/votes", post(vote))
}
