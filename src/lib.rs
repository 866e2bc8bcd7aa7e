use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod amount;
pub mod config;
pub mod entities;
pub mod error;
pub mod gateways;
pub mod otp;
pub mod repository;
pub mod routes;
pub mod storage;

use config::RateLimit;
use gateways::{Mailer, TextGenerator};
use otp::OtpStore;
use repository::CampaignRepository;
use storage::{FileStore, PUBLIC_PREFIX};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub campaigns: Arc<dyn CampaignRepository>,
    pub otp_store: Arc<dyn OtpStore>,
    pub mailer: Arc<dyn Mailer>,
    pub text_generator: Arc<dyn TextGenerator>,
    pub files: FileStore,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "Service is healthy")
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crowdfund API",
        version = "0.1.0",
        description = "Fundraising campaigns, milestones, document uploads and email OTP verification"
    ),
    paths(
        health_check,
        routes::otp::send_otp,
        routes::otp::verify_otp,
        routes::campaigns::create_campaign,
        routes::campaigns::list_campaigns,
        routes::campaigns::list_milestones,
        routes::campaigns::get_campaign,
        routes::campaigns::update_raised,
        routes::genai::genai_hello,
        routes::genai::generate_text
    ),
    components(schemas(
        entities::campaign::Model,
        entities::milestone::Model,
        routes::otp::SendOtpRequest,
        routes::otp::SendOtpResponse,
        routes::otp::VerifyOtpRequest,
        routes::otp::StatusResponse,
        routes::campaigns::CreateCampaignForm,
        routes::campaigns::CreateCampaignResponse,
        routes::campaigns::UpdateRaisedRequest,
        routes::genai::GenerateResponse
    ))
)]
struct ApiDoc;

/// Create the application with all routes and middleware
pub fn create_app(state: AppState, rate_limit: Option<RateLimit>) -> Router {
    let mut otp_routes = Router::new()
        .route("/send-otp", post(routes::send_otp))
        .route("/verify-otp", post(routes::verify_otp));

    // Rate limiting applies to the OTP routes only and is keyed on the TCP
    // peer address; forwarding headers are client-controlled and ignored.
    // The server must be started with connect info.
    if let Some(limit) = rate_limit {
        let governor_conf = GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .period(limit.period)
            .burst_size(limit.burst)
            .finish();
        match governor_conf {
            Some(conf) => {
                otp_routes = otp_routes.layer(GovernorLayer {
                    config: Arc::new(conf),
                });
            }
            None => tracing::warn!(?limit, "Invalid rate limit, OTP routes are not rate limited"),
        }
    }

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/create-campaign",
            post(routes::create_campaign)
                .layer(DefaultBodyLimit::max(routes::campaigns::MAX_CAMPAIGN_FORM_SIZE)),
        )
        .route("/campaigns", get(routes::list_campaigns))
        .route("/campaigns/{id}", get(routes::get_campaign))
        .route("/campaigns/{id}/updateRaised", post(routes::update_raised))
        .route("/milestones", get(routes::list_milestones))
        .route("/genai", get(routes::genai_hello))
        .route("/genai/", get(routes::genai_hello))
        .route("/genai/generate", post(routes::generate_text));

    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .merge(otp_routes)
        .merge(api_routes)
        .nest_service(PUBLIC_PREFIX, uploads)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
