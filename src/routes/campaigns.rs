use std::collections::HashMap;

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::amount::{self, string_or_number};
use crate::entities::{campaign, milestone};
use crate::error::AppError;
use crate::repository::{parse_milestones, NewCampaign};
use crate::storage::MAX_FILE_SIZE;
use crate::AppState;

const IMAGE_FIELD: &str = "imageUrl";
const CERTIFICATE_FIELD: &str = "certificateFile";
const SUPPORTING_DOC_FIELD: &str = "supportingDocFile";
const FILE_FIELDS: [&str; 3] = [IMAGE_FIELD, CERTIFICATE_FIELD, SUPPORTING_DOC_FIELD];

const DEFAULT_DAYS_LEFT: i32 = 30;

/// Body limit for the create-campaign form: three full-size files plus text fields.
pub const MAX_CAMPAIGN_FORM_SIZE: usize = 3 * MAX_FILE_SIZE + 1024 * 1024;

/// Multipart form accepted by `POST /create-campaign` (documentation only)
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct CreateCampaignForm {
    title: String,
    description: String,
    /// Target amount, numeric
    goal: String,
    /// Defaults to 30 when absent or not a number
    days_left: Option<String>,
    ngo_registration_number: Option<String>,
    contact_name: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    walletaddress: String,
    /// External image link, used when no image file is uploaded
    image_url_link: Option<String>,
    /// JSON array of `{title, amount, status?}`
    milestones: Option<String>,
    /// Campaign image, at most 10MB
    #[schema(value_type = Option<String>, format = Binary)]
    image_url: Option<Vec<u8>>,
    /// NGO registration certificate, at most 10MB
    #[schema(value_type = Option<String>, format = Binary)]
    certificate_file: Option<Vec<u8>>,
    /// Supporting document, at most 10MB
    #[schema(value_type = Option<String>, format = Binary)]
    supporting_doc_file: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignResponse {
    pub success: bool,
    pub message: String,
    pub campaign_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRaisedRequest {
    /// Amount to add, as a string or a number
    #[serde(default, deserialize_with = "string_or_number")]
    #[schema(value_type = Option<String>)]
    pub amount: Option<String>,
}

#[derive(Debug)]
struct UploadedFile {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// Everything submitted in the create-campaign form, fully buffered.
#[derive(Debug, Default)]
struct CampaignForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl CampaignForm {
    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn required(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::InvalidRequest(format!("{} is required", name)))
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::InvalidRequest(err.body_text())
    }
}

/// Reads the whole form, enforcing the per-file cap while streaming so an
/// oversized upload is rejected before anything is written.
async fn read_campaign_form(mut multipart: Multipart) -> Result<CampaignForm, AppError> {
    let mut form = CampaignForm::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if !FILE_FIELDS.contains(&name.as_str()) {
            if field.file_name().is_some() {
                debug!(field = %name, "Ignoring unexpected file field");
                continue;
            }
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > MAX_FILE_SIZE {
                return Err(AppError::PayloadTooLarge(format!(
                    "File for '{}' exceeds the 10MB limit",
                    name
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        // Browsers submit empty file inputs as a nameless, empty part.
        if bytes.is_empty() && file_name.as_deref().map_or(true, str::is_empty) {
            continue;
        }

        if form.files.contains_key(&name) {
            return Err(AppError::InvalidRequest(format!(
                "Only one file is allowed for '{}'",
                name
            )));
        }
        form.files.insert(name, UploadedFile { file_name, bytes });
    }

    Ok(form)
}

/// Takes the leading whole number of the field (`"12 days"` is 12, `"3.7"` is
/// 3). Anything without one, or that is not positive, falls back to 30.
fn parse_days_left(raw: Option<&str>) -> i32 {
    let Some(raw) = raw else {
        return DEFAULT_DAYS_LEFT;
    };
    let raw = raw.trim_start();
    let unsigned = raw.strip_prefix('+').unwrap_or(raw);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());

    match unsigned[..end].parse::<i32>() {
        Ok(days) if days > 0 => days,
        _ => DEFAULT_DAYS_LEFT,
    }
}

/// Create a campaign, its milestones and its uploaded documents
#[utoipa::path(
    post,
    path = "/create-campaign",
    tag = "Campaigns",
    request_body(content = CreateCampaignForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Campaign created", body = CreateCampaignResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 413, description = "An uploaded file exceeds 10MB"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_campaign(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CreateCampaignResponse>, AppError> {
    let mut form = read_campaign_form(multipart).await?;

    let goal = form.required("goal")?;
    amount::parse_amount(&goal)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid goal: {}", e)))?;

    let mut new_campaign = NewCampaign {
        title: form.required("title")?,
        description: form.required("description")?,
        goal,
        days_left: parse_days_left(form.text("daysLeft").as_deref()),
        walletaddress: form.required("walletaddress")?,
        ngo_registration_number: form.text("ngoRegistrationNumber"),
        contact_name: form.text("contactName"),
        contact_email: form.text("contactEmail"),
        contact_phone: form.text("contactPhone"),
        ..Default::default()
    };
    let milestones = parse_milestones(form.fields.get("milestones").map(String::as_str));

    // Validation is done; files are written before the database rows.
    for field in FILE_FIELDS {
        let Some(upload) = form.files.remove(field) else {
            continue;
        };
        let reference = state
            .files
            .store(field, upload.file_name.as_deref(), &upload.bytes)
            .await?;
        match field {
            IMAGE_FIELD => new_campaign.image_url = Some(reference),
            CERTIFICATE_FIELD => new_campaign.certificate_url = Some(reference),
            _ => new_campaign.supporting_doc_url = Some(reference),
        }
    }
    if new_campaign.image_url.is_none() {
        new_campaign.image_url = form.text("imageUrlLink");
    }

    let created = state.campaigns.create(new_campaign, milestones).await?;

    info!(campaign_id = %created.id, "Campaign created");
    Ok(Json(CreateCampaignResponse {
        success: true,
        message: format!("Campaign created successfully with ID: {}", created.id),
        campaign_id: created.id,
    }))
}

/// List all campaigns in creation order
#[utoipa::path(
    get,
    path = "/campaigns",
    tag = "Campaigns",
    responses(
        (status = 200, description = "All campaigns", body = [campaign::Model]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<campaign::Model>>, AppError> {
    Ok(Json(state.campaigns.list().await?))
}

/// List the milestones of every campaign
#[utoipa::path(
    get,
    path = "/milestones",
    tag = "Campaigns",
    responses(
        (status = 200, description = "All milestones", body = [milestone::Model]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_milestones(
    State(state): State<AppState>,
) -> Result<Json<Vec<milestone::Model>>, AppError> {
    Ok(Json(state.campaigns.list_milestones().await?))
}

/// Fetch one campaign; the body is `null` when no campaign has that id
#[utoipa::path(
    get,
    path = "/campaigns/{id}",
    tag = "Campaigns",
    params(("id" = String, Path, description = "Campaign id")),
    responses(
        (status = 200, description = "The campaign, or null", body = Option<campaign::Model>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<campaign::Model>>, AppError> {
    let found = state.campaigns.get_by_id(&id).await?;
    if found.is_none() {
        debug!("Campaign not found");
    }
    Ok(Json(found))
}

/// Add a contribution to a campaign's raised amount
#[utoipa::path(
    post,
    path = "/campaigns/{id}/updateRaised",
    tag = "Campaigns",
    params(("id" = String, Path, description = "Campaign id")),
    request_body = UpdateRaisedRequest,
    responses(
        (status = 200, description = "The updated campaign", body = campaign::Model),
        (status = 400, description = "Body is not JSON, or amount is missing, negative or not a number"),
        (status = 404, description = "No campaign with that id"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip(state, payload))]
pub async fn update_raised(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateRaisedRequest>, JsonRejection>,
) -> Result<Json<campaign::Model>, AppError> {
    let Json(request) = payload?;
    let raw = request
        .amount
        .ok_or_else(|| AppError::InvalidRequest("amount is required".to_string()))?;
    let delta = amount::parse_amount(&raw)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid amount: {}", e)))?;

    let updated = state
        .campaigns
        .increase_raised(&id, delta)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".to_string()))?;

    info!(raised = %updated.raised, "Raised amount increased");
    Ok(Json(updated))
}
