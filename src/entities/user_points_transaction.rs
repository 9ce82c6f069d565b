use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsReason {
    #[sea_orm(string_value = "EARN_ORDER")]
    EarnOrder,
    #[sea_orm(string_value = "REDEEM_ORDER")]
    RedeemOrder,
    #[sea_orm(string_value = "INFLUENCER_BONUS")]
    InfluencerBonus,
}

/// Append-only ledger row; `points` is signed (negative for redemptions).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_points_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub points: i32,
    pub reason: PointsReason,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_points_account::Entity",
        from = "Column::UserId",
        to = "super::user_points_account::Column::UserId"
    )]
    Account,
}

impl Related<super::user_points_account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
