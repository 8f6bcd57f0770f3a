use axum::{extract::{rejection::JsonRejection, DefaultBodyLimit, State}, routing::post, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::{
    credits::CreditStore,
    error::{AppError, Result},
    images::preview,
    models::{EditRequest, GenerateRequest, GenerationResult},
    orchestrator::Orchestrator,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub credits: Arc<dyn CreditStore>,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/api/ai/generate", post(generate_ad))
        .route("/api/ai/edit", post(edit_ad))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

fn log_failure(err: AppError) -> AppError {
    error!(kind = err.kind(), "❌ Request failed: {}", err);
    err
}

/// Malformed bodies join the same 400 `{message, kind}` class as every other failure.
fn parse_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(body)| body)
        .map_err(|rejection| log_failure(AppError::InvalidRequest(rejection.body_text())))
}

/// Runs `work` with one credit reserved for `email`; the credit is returned if `work` fails.
async fn charged<F>(credits: &dyn CreditStore, email: &str, work: F) -> Result<GenerationResult>
where
    F: std::future::Future<Output = Result<GenerationResult>>,
{
    let remaining = credits.reserve(email).await.map_err(log_failure)?;
    match work.await {
        Ok(result) => {
            info!(remaining, "✅ Request done");
            Ok(result)
        }
        Err(err) => {
            if let Err(refund_err) = credits.refund(email).await {
                warn!("💳 Refund failed: {}", refund_err);
            }
            Err(log_failure(err))
        }
    }
}

pub async fn generate_ad(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>> {
    let body = parse_body(body)?;
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("generate", %request_id, user = %body.user_email);
    async move {
        info!("🎯 Generate request: {}", preview(&body.prompt, 120));
        let work = state.orchestrator.generate(&body.prompt, &body.ad_creator_data, &body.user_email);
        charged(state.credits.as_ref(), &body.user_email, work).await.map(Json)
    }
    .instrument(span)
    .await
}

pub async fn edit_ad(
    State(state): State<AppState>,
    body: std::result::Result<Json<EditRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>> {
    let body = parse_body(body)?;
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("edit", %request_id, user = %body.user_email);
    async move {
        info!("🎯 Edit request: {}", preview(&body.prompt, 120));
        let work = state.orchestrator.edit(
            &body.prompt,
            &body.ad_creator_data,
            &body.current_image,
            &body.user_email,
            body.canvas_edit_data.as_deref(),
        );
        charged(state.credits.as_ref(), &body.user_email, work).await.map(Json)
    }
    .instrument(span)
    .await
}
