use axum::Json;

use crate::models::shared::MessageResponse;

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "health",
    summary = "Liveness probe",
    responses((status = 200, description = "Service is up", body = MessageResponse)),
)]
pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse::new("Houston, we are live! API is working"))
}
