use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppResult;
use crate::services::parse_submission;
use crate::state::AppState;

/// POST /api/generations - Submit a generation request
///
/// Returns 202 as soon as the placeholder job is stored and dispatched.
pub async fn submit(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let request = parse_submission(&body)?;
    let accepted = state.jobs.submit(&caller.user_id, request).await?;

    Ok(HttpResponse::Accepted().json(accepted))
}

/// POST /api/generations/{id}/regenerate - Regenerate a finished job
pub async fn regenerate(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let accepted = state
        .jobs
        .regenerate(path.into_inner(), &caller.user_id)
        .await?;

    Ok(HttpResponse::Accepted().json(accepted))
}

/// GET /api/generations/{id} - Current job state, polled by clients
pub async fn get_generation(
    state: web::Data<AppState>,
    caller: CallerIdentity,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let view = state.jobs.read(path.into_inner(), &caller.user_id).await?;

    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "no-store"))
        .json(view))
}

/// Configure generation routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/generations")
            .route("", web::post().to(submit))
            .route("/{id}", web::get().to(get_generation))
            .route("/{id}/regenerate", web::post().to(regenerate)),
    );
}
