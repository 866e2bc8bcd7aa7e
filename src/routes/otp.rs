use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::amount::string_or_number;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    /// Address the code is sent to
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
    /// Echo of the issued code, for development clients
    pub otp: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    /// The code as a string or a number
    #[serde(default, deserialize_with = "string_or_number")]
    #[schema(value_type = Option<String>)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// Trimmed value, or `None` when absent or blank.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue a one-time password and email it to the given address
#[utoipa::path(
    post,
    path = "/send-otp",
    tag = "OTP",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued and emailed", body = SendOtpResponse),
        (status = 400, description = "Email is missing or the body is not JSON", body = StatusResponse),
        (status = 500, description = "Email provider failed", body = StatusResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<SendOtpResponse>, AppError> {
    let Json(request) = payload?;
    let email = non_blank(request.email)
        .ok_or_else(|| AppError::InvalidRequest("Email is required".to_string()))?;

    let otp = state.otp_store.issue(&email).await;

    // The code stays valid even if delivery fails.
    state
        .mailer
        .send_otp_email(&email, &otp)
        .await
        .map_err(|source| AppError::ExternalService {
            context: "Failed to send OTP",
            source,
        })?;

    info!("OTP sent");
    Ok(Json(SendOtpResponse {
        success: true,
        message: "OTP sent successfully".to_string(),
        otp,
    }))
}

/// Verify a previously issued one-time password. Each code verifies once.
#[utoipa::path(
    post,
    path = "/verify-otp",
    tag = "OTP",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verification result; success=false for a wrong or expired code", body = StatusResponse),
        (status = 400, description = "Email or code is missing, or the body is not JSON", body = StatusResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Json(request) = payload?;
    let (Some(email), Some(code)) = (non_blank(request.email), non_blank(request.code)) else {
        return Err(AppError::InvalidRequest(
            "Email and OTP are required".to_string(),
        ));
    };

    if state.otp_store.verify(&email, &code).await {
        info!("OTP verified");
        return Ok(Json(StatusResponse {
            success: true,
            message: "OTP Verified!".to_string(),
        }));
    }

    Ok(Json(StatusResponse {
        success: false,
        message: "Invalid OTP".to_string(),
    }))
}
