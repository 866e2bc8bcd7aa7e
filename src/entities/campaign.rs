use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use utoipa::ToSchema;

/// A fundraising campaign. Amounts are decimal text, see `crate::amount`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize, ToSchema)]
#[sea_orm(table_name = "campaign")]
#[serde(rename_all = "camelCase")]
#[schema(as = Campaign)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // UUID v4
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub goal: String,
    pub raised: String,
    pub days_left: i32,
    pub walletaddress: String,
    pub ngo_registration_number: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub image_url: Option<String>, // upload reference or external link
    pub certificate_url: Option<String>,
    pub supporting_doc_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::milestone::Entity")]
    Milestone,
}

impl Related<super::milestone::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Milestone.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
