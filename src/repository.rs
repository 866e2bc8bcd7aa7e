//! Campaign and milestone persistence.
//!
//! `CampaignRepository` is the seam the HTTP handlers depend on; the
//! sea-orm implementation works against Postgres or SQLite.
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Schema, Set, TransactionTrait,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::amount::{self, AmountError};
use crate::entities::{campaign, milestone};

/// Upper bound, in milliseconds, of the randomized pause after losing a
/// compare-and-swap round on `raised`.
const MAX_RAISE_BACKOFF_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Campaign {id} holds an unreadable raised amount: {source}")]
    CorruptAmount {
        id: String,
        #[source]
        source: AmountError,
    },
}

/// Fields of a campaign as submitted by a client, before persistence.
#[derive(Debug, Clone, Default)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub goal: String,
    pub days_left: i32,
    pub walletaddress: String,
    pub ngo_registration_number: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub image_url: Option<String>,
    pub certificate_url: Option<String>,
    pub supporting_doc_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewMilestone {
    pub title: String,
    #[serde(default, deserialize_with = "amount::string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl NewMilestone {
    fn status_or_default(&self) -> String {
        match self.status.as_deref() {
            Some(status) if !status.is_empty() => status.to_string(),
            _ => milestone::DEFAULT_STATUS.to_string(),
        }
    }
}

/// Reads the `milestones` form field. Anything that is not a JSON array of
/// milestone objects is logged and treated as "no milestones".
pub fn parse_milestones(raw: Option<&str>) -> Vec<NewMilestone> {
    let Some(raw) = raw else {
        debug!("No milestones submitted");
        return Vec::new();
    };

    match serde_json::from_str::<Vec<NewMilestone>>(raw) {
        Ok(milestones) => milestones,
        Err(e) => {
            warn!("Error parsing milestones, creating campaign without them: {}", e);
            Vec::new()
        }
    }
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Persists a campaign with `raised = "0"` together with its milestones.
    async fn create(
        &self,
        campaign: NewCampaign,
        milestones: Vec<NewMilestone>,
    ) -> Result<campaign::Model, RepositoryError>;

    async fn list(&self) -> Result<Vec<campaign::Model>, RepositoryError>;

    async fn list_milestones(&self) -> Result<Vec<milestone::Model>, RepositoryError>;

    /// `Ok(None)` means the campaign does not exist.
    async fn get_by_id(&self, id: &str) -> Result<Option<campaign::Model>, RepositoryError>;

    /// Adds `amount` to the campaign's raised total. Every call lands; none is
    /// lost or rejected because of concurrent increments. `Ok(None)` means the
    /// campaign does not exist.
    async fn increase_raised(
        &self,
        id: &str,
        amount: f64,
    ) -> Result<Option<campaign::Model>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SeaOrmCampaignRepository {
    db: DatabaseConnection,
}

impl SeaOrmCampaignRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CampaignRepository for SeaOrmCampaignRepository {
    #[tracing::instrument(skip_all, fields(title = %new.title, milestones = milestones.len()))]
    async fn create(
        &self,
        new: NewCampaign,
        milestones: Vec<NewMilestone>,
    ) -> Result<campaign::Model, RepositoryError> {
        let now = Utc::now();
        let campaign_id = Uuid::new_v4().to_string();

        let txn = self.db.begin().await?;

        let created = campaign::ActiveModel {
            id: Set(campaign_id.clone()),
            title: Set(new.title),
            description: Set(new.description),
            goal: Set(new.goal),
            raised: Set("0".to_string()),
            days_left: Set(new.days_left),
            walletaddress: Set(new.walletaddress),
            ngo_registration_number: Set(new.ngo_registration_number),
            contact_name: Set(new.contact_name),
            contact_email: Set(new.contact_email),
            contact_phone: Set(new.contact_phone),
            image_url: Set(new.image_url),
            certificate_url: Set(new.certificate_url),
            supporting_doc_url: Set(new.supporting_doc_url),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        if !milestones.is_empty() {
            let rows = milestones.iter().map(|m| milestone::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                title: Set(m.title.clone()),
                amount: Set(m.amount.clone().unwrap_or_else(|| "0".to_string())),
                status: Set(m.status_or_default()),
                campaign_id: Set(campaign_id.clone()),
                created_at: Set(now),
            });
            milestone::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        info!(campaign_id = %created.id, "Campaign created");
        Ok(created)
    }

    async fn list(&self) -> Result<Vec<campaign::Model>, RepositoryError> {
        let campaigns = campaign::Entity::find()
            .order_by_asc(campaign::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(campaigns)
    }

    async fn list_milestones(&self) -> Result<Vec<milestone::Model>, RepositoryError> {
        let milestones = milestone::Entity::find()
            .order_by_asc(milestone::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(milestones)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<campaign::Model>, RepositoryError> {
        let found = campaign::Entity::find_by_id(id.to_owned()).one(&self.db).await?;
        Ok(found)
    }

    #[tracing::instrument(skip(self))]
    async fn increase_raised(
        &self,
        id: &str,
        delta: f64,
    ) -> Result<Option<campaign::Model>, RepositoryError> {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            let Some(current) = campaign::Entity::find_by_id(id.to_owned()).one(&self.db).await?
            else {
                return Ok(None);
            };

            let next = amount::add_amounts(&current.raised, delta).map_err(|source| {
                RepositoryError::CorruptAmount {
                    id: id.to_owned(),
                    source,
                }
            })?;

            // Only applies if nobody else changed `raised` since we read it.
            let result = campaign::Entity::update_many()
                .col_expr(campaign::Column::Raised, Expr::value(next.clone()))
                .filter(campaign::Column::Id.eq(id))
                .filter(campaign::Column::Raised.eq(current.raised.as_str()))
                .exec(&self.db)
                .await?;

            if result.rows_affected == 1 {
                debug!(attempt, raised = %next, "Raised amount updated");
                return Ok(Some(campaign::Model {
                    raised: next,
                    ..current
                }));
            }

            // Each round has exactly one winner, so retrying always makes progress.
            let pause = rand::thread_rng().gen_range(0..=attempt.min(MAX_RAISE_BACKOFF_MS));
            debug!(attempt, pause_ms = pause, "Raised amount changed concurrently, retrying");
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }
}

/// Creates the campaign and milestone tables when they are missing.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut campaigns = schema.create_table_from_entity(campaign::Entity);
    campaigns.if_not_exists();
    db.execute(backend.build(&campaigns)).await?;

    let mut milestones = schema.create_table_from_entity(milestone::Entity);
    milestones.if_not_exists();
    db.execute(backend.build(&milestones)).await?;

    info!("Database schema ready");
    Ok(())
}
