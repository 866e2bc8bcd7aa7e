#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use crowdfund::config::RateLimit;
use crowdfund::gateways::{GatewayError, Mailer, TextGenerator};
use crowdfund::otp::InMemoryOtpStore;
use crowdfund::repository::{sync_schema, SeaOrmCampaignRepository};
use crowdfund::storage::FileStore;
use crowdfund::{create_app, AppState};
use http_body_util::BodyExt;
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

// For initializing tracing once
static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

/// Records every email it is asked to send; optionally fails afterwards.
#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl FakeMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        if self.fail {
            return Err(GatewayError::EmptyResponse { provider: "fake mailer" });
        }
        Ok(())
    }
}

/// Replies with a canned text, or fails when no reply is configured.
#[derive(Default)]
pub struct FakeGenerator {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .ok_or(GatewayError::EmptyResponse { provider: "fake generator" })
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub db: DatabaseConnection,
    pub mailer: Arc<FakeMailer>,
    pub generator: Arc<FakeGenerator>,
    pub upload_dir: PathBuf,
    // Removes the database file and uploads when the test ends.
    _dir: TempDir,
}

/// Fresh SQLite database file with the schema applied. The file lives in the
/// returned directory, which is deleted when dropped.
pub async fn test_database() -> (DatabaseConnection, TempDir) {
    let dir = tempfile::Builder::new()
        .prefix("crowdfund-test-")
        .tempdir()
        .expect("create temp dir");
    let path = dir.path().join("crowdfund.sqlite");
    let db = Database::connect(format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("connect to sqlite");
    sync_schema(&db).await.expect("create schema");
    (db, dir)
}

pub async fn test_app() -> TestApp {
    test_app_with(FakeMailer::default(), FakeGenerator::replying("Hello from the model")).await
}

pub async fn test_app_with(mailer: FakeMailer, generator: FakeGenerator) -> TestApp {
    spawn_app(mailer, generator, None).await
}

/// App with the OTP routes behind the per-IP limiter. Requests must carry a
/// `ConnectInfo<SocketAddr>` extension, see [`with_peer`].
pub async fn test_app_rate_limited(limit: RateLimit) -> TestApp {
    spawn_app(
        FakeMailer::default(),
        FakeGenerator::replying("Hello from the model"),
        Some(limit),
    )
    .await
}

async fn spawn_app(
    mailer: FakeMailer,
    generator: FakeGenerator,
    rate_limit: Option<RateLimit>,
) -> TestApp {
    setup();

    let (db, dir) = test_database().await;
    let upload_dir = dir.path().join("uploads");
    let mailer = Arc::new(mailer);
    let generator = Arc::new(generator);

    let state = AppState {
        campaigns: Arc::new(SeaOrmCampaignRepository::new(db.clone())),
        otp_store: Arc::new(InMemoryOtpStore::new(Duration::from_secs(60))),
        mailer: mailer.clone(),
        text_generator: generator.clone(),
        files: FileStore::new(upload_dir.clone()),
    };

    TestApp {
        app: create_app(state.clone(), rate_limit),
        state,
        db,
        mailer,
        generator,
        upload_dir,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    pub async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.request(request).await;
        let json = serde_json::from_slice(&body)
            .unwrap_or_else(|e| panic!("non-JSON body ({}): {:?}", e, String::from_utf8_lossy(&body)));
        (status, json)
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Names of the files currently in the upload directory.
    pub fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Marks `request` as arriving from `peer`, the way the server's
/// connect-info layer does.
pub fn with_peer(mut request: Request<Body>, peer: SocketAddr) -> Request<Body> {
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

/// Minimal multipart/form-data encoder for driving the create-campaign route.
pub struct MultipartBody {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("crowdfund-boundary-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// The required create-campaign fields with valid values.
pub fn campaign_form() -> MultipartBody {
    MultipartBody::new()
        .text("title", "Community garden")
        .text("description", "Seeds and tools for the east side plot")
        .text("goal", "1000")
        .text("walletaddress", "0xabc123")
        .text("contactName", "Ada")
        .text("contactEmail", "ada@example.com")
}
