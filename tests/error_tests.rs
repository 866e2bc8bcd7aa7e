use axum::{http::StatusCode, response::IntoResponse};
use crowdfund::amount::AmountError;
use crowdfund::error::AppError;
use crowdfund::gateways::GatewayError;
use crowdfund::repository::RepositoryError;
use crowdfund::storage::StorageError;
use http_body_util::BodyExt;
use serde_json::{json, Value};

async fn render(error: AppError) -> (StatusCode, Value) {
    let response = error.into_response();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body_bytes).unwrap())
}

#[test]
fn test_app_error_display() {
    let error = AppError::InvalidRequest("title is required".to_string());
    assert_eq!(error.to_string(), "Invalid request: title is required");

    let error = AppError::NotFound("Campaign not found".to_string());
    assert_eq!(error.to_string(), "Not found: Campaign not found");

    let error = AppError::ExternalService {
        context: "Failed to send OTP",
        source: GatewayError::EmptyResponse { provider: "SendGrid" },
    };
    assert_eq!(
        error.to_string(),
        "Failed to send OTP: SendGrid returned no usable content"
    );
}

#[tokio::test]
async fn client_errors_echo_their_message() {
    let (status, body) = render(AppError::InvalidRequest("Email is required".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "message": "Email is required" }));

    let (status, body) = render(AppError::NotFound("Campaign not found".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Campaign not found");
}

#[tokio::test]
async fn oversized_uploads_map_to_payload_too_large() {
    let error: AppError = StorageError::TooLarge {
        field: "imageUrl".to_string(),
        limit: 10,
    }
    .into();
    let (status, body) = render(error).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn server_errors_hide_their_detail() {
    let error: AppError = RepositoryError::CorruptAmount {
        id: "abc".to_string(),
        source: AmountError::NotANumber("seventy".to_string()),
    }
    .into();
    let (status, body) = render(error).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "message": "Internal server error" }));

    let error: AppError = StorageError::Io(std::io::Error::other("disk full")).into();
    let (status, body) = render(error).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
}
