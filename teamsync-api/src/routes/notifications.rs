/// Notification inbox endpoints
///
/// Responses use the same camelCase payload as the real-time
/// `newNotification` event.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use teamsync_shared::{
    auth::middleware::AuthContext,
    models::{NotificationId, NotificationPayload},
};

/// Newest notifications first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<NotificationPayload>>> {
    let notifications = state.core.inbox.list(auth.user_id).await?;
    Ok(Json(notifications.iter().map(|n| n.payload()).collect()))
}

/// Marks a notification read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<NotificationId>,
) -> ApiResult<Json<NotificationPayload>> {
    let notification = state.core.inbox.mark_read(auth.user_id, id).await?;
    Ok(Json(notification.payload()))
}

/// Deletes a notification
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<NotificationId>,
) -> ApiResult<StatusCode> {
    state.core.inbox.delete(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
