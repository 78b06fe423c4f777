use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use ephemera_core::{Availability, EngineError, ViewerContext, lifecycle, self_destruct};
use ephemera_types::api::{
    AccessResponse, Claims, CreateMessageRequest, CreateMessageResponse, ExpireResponse,
    MessagePreview, RevealResponse, ViewerRequest,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Run a blocking store operation off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ephemera_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// POST /messages: owner creates a message.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let owner_id = claims.sub;
    let record = blocking(move || lifecycle::create_message(&*store, owner_id, req)).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateMessageResponse {
            id: record.id,
            share_url: state.share_url(record.id),
            created_at: record.created_at,
            expires_at: record.expires_at(),
        }),
    ))
}

/// GET /messages/{id}: what a viewer sees before revealing. No content.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let (record, availability) =
        blocking(move || lifecycle::preview(&*store, id, Utc::now())).await?;

    let unavailable_reason = match availability {
        Availability::Available => None,
        Availability::NotAvailable(reason) => Some(reason.to_string()),
    };

    Ok(Json(MessagePreview {
        id: record.id,
        available: availability.is_available(),
        unavailable_reason,
        requires_email: record.has_access_policy(),
        view_limit: record.view_limit,
        view_count: record.view_count,
        self_destruct: record.self_destruct,
        self_destruct_timer_seconds: record.self_destruct_timer_seconds,
        expires_at: record.expires_at(),
        destruct_deadline: record.destruct_deadline(),
    }))
}

/// POST /messages/{id}/access: would this email be let in? Consumes nothing.
pub async fn check_access(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<ViewerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let email = req.and_then(|Json(req)| req.email);
    let decision = blocking(move || {
        lifecycle::check_access(&*store, id, email.as_deref(), Utc::now())
    })
    .await?;

    Ok(Json(AccessResponse {
        granted: decision.is_granted(),
    }))
}

/// POST /messages/{id}/reveal: the one path that returns content.
pub async fn reveal_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<ViewerRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let viewer = ViewerContext {
        email: req.and_then(|Json(req)| req.email),
    };
    let revelation =
        blocking(move || ephemera_core::reveal(&*store, id, &viewer, Utc::now())).await?;

    Ok(Json(RevealResponse {
        body: revelation.body,
        attachments: revelation.attachments,
        expiry_deadline: revelation.expiry_deadline,
        views_remaining: revelation.views_remaining,
        destroyed: revelation.destroyed,
    }))
}

/// POST /messages/{id}/expire: a viewer's countdown reached zero.
///
/// The client's clock is not trusted: the message is only deleted once the
/// persisted deadline has actually passed.
pub async fn expire_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let response = blocking(move || {
        let record = store.get(id)?.ok_or(EngineError::NotFound)?;
        let destroyed = self_destruct::enforce_deadline(&*store, &record, Utc::now())?;
        Ok(ExpireResponse {
            destroyed,
            destruct_deadline: record.destruct_deadline(),
        })
    })
    .await?;

    Ok(Json(response))
}

/// DELETE /messages/{id}: owner only.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let store = state.store.clone();
    let requester = claims.sub;
    blocking(move || lifecycle::delete_message(&*store, id, requester)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}
