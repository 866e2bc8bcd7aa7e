use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::AppState;

/// Prompt sent by `POST /genai/generate`.
pub const GENERATE_PROMPT: &str = "hii there";

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    /// Raw model output
    pub response: String,
}

/// Greeting used as a liveness probe for the generation routes
#[utoipa::path(
    get,
    path = "/genai/",
    tag = "GenAI",
    responses(
        (status = 200, description = "Greeting", body = String)
    )
)]
pub async fn genai_hello() -> &'static str {
    "Hello World!"
}

/// Send the fixed prompt to the text-generation model and return its reply
#[utoipa::path(
    post,
    path = "/genai/generate",
    tag = "GenAI",
    responses(
        (status = 200, description = "Model output", body = GenerateResponse),
        (status = 500, description = "Model provider failed")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn generate_text(
    State(state): State<AppState>,
) -> Result<Json<GenerateResponse>, AppError> {
    let response = state
        .text_generator
        .generate(GENERATE_PROMPT)
        .await
        .map_err(|source| AppError::ExternalService {
            context: "Failed to generate text",
            source,
        })?;

    info!("{}", response);
    Ok(Json(GenerateResponse { response }))
}
