//! Loyalty points ledger.
//!
//! Balances are cached aggregates over append-only transaction rows; a
//! balance is never written without its ledger row in the same database
//! transaction. Callers pass their open transaction in.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::{
    entities::{
        influencer_points_account, influencer_points_transaction, user_points_account,
        user_points_transaction::{self, PointsReason},
    },
    errors::ServiceError,
};

/// One point buys 10 cents off.
pub const POINT_VALUE_CENTS: i64 = 10;
/// Customers earn 1 point per R$10.00 of pre-discount subtotal.
pub const CENTS_PER_CUSTOMER_POINT: i64 = 1000;
/// Influencers earn 1 point per 10 cents of the discount their coupon produced.
pub const INFLUENCER_CENTS_PER_POINT: i64 = 10;

pub fn earned_for_subtotal(subtotal_cents: i64) -> i32 {
    if subtotal_cents <= 0 {
        return 0;
    }
    (subtotal_cents / CENTS_PER_CUSTOMER_POINT) as i32
}

pub fn influencer_bonus_for_discount(discount_cents: i64) -> i32 {
    if discount_cents <= 0 {
        return 0;
    }
    (discount_cents / INFLUENCER_CENTS_PER_POINT) as i32
}

/// Caps a redemption request at the available balance. A stale client
/// asking for more than it has gets the cap, not an error.
pub fn clamp_redemption(requested: i32, balance: i32) -> i32 {
    requested.clamp(0, balance.max(0))
}

/// Current balance for a user, zero if no account row exists yet.
pub async fn user_balance<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<i32, ServiceError> {
    let account = user_points_account::Entity::find()
        .filter(user_points_account::Column::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(account.map(|a| a.balance).unwrap_or(0))
}

/// Applies a signed delta to the user's balance and appends the paired
/// ledger row. Must run inside the caller's transaction.
pub async fn apply_user_delta<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_id: Option<Uuid>,
    points: i32,
    reason: PointsReason,
) -> Result<(), ServiceError> {
    let now = Utc::now();

    let account = user_points_account::ActiveModel {
        user_id: Set(user_id),
        balance: Set(points),
        updated_at: Set(now),
    };
    user_points_account::Entity::insert(account)
        .on_conflict(
            OnConflict::column(user_points_account::Column::UserId)
                .value(
                    user_points_account::Column::Balance,
                    Expr::col(user_points_account::Column::Balance).add(points),
                )
                .value(user_points_account::Column::UpdatedAt, Expr::value(now))
                .to_owned(),
        )
        .exec(conn)
        .await?;

    let ledger_row = user_points_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        order_id: Set(order_id),
        points: Set(points),
        reason: Set(reason),
        created_at: Set(now),
    };
    ledger_row.insert(conn).await?;

    Ok(())
}

/// Credits an influencer's account with the paired ledger row.
pub async fn credit_influencer<C: ConnectionTrait>(
    conn: &C,
    influencer_id: Uuid,
    order_id: Option<Uuid>,
    points: i32,
) -> Result<(), ServiceError> {
    let now = Utc::now();

    let account = influencer_points_account::ActiveModel {
        influencer_id: Set(influencer_id),
        balance: Set(points),
        updated_at: Set(now),
    };
    influencer_points_account::Entity::insert(account)
        .on_conflict(
            OnConflict::column(influencer_points_account::Column::InfluencerId)
                .value(
                    influencer_points_account::Column::Balance,
                    Expr::col(influencer_points_account::Column::Balance).add(points),
                )
                .value(
                    influencer_points_account::Column::UpdatedAt,
                    Expr::value(now),
                )
                .to_owned(),
        )
        .exec(conn)
        .await?;

    let ledger_row = influencer_points_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        influencer_id: Set(influencer_id),
        order_id: Set(order_id),
        points: Set(points),
        reason: Set(PointsReason::InfluencerBonus),
        created_at: Set(now),
    };
    ledger_row.insert(conn).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_point_per_ten_reais_of_subtotal() {
        assert_eq!(earned_for_subtotal(0), 0);
        assert_eq!(earned_for_subtotal(999), 0);
        assert_eq!(earned_for_subtotal(1000), 1);
        assert_eq!(earned_for_subtotal(2999), 2);
        assert_eq!(earned_for_subtotal(-500), 0);
    }

    #[test]
    fn influencer_bonus_follows_discount() {
        assert_eq!(influencer_bonus_for_discount(0), 0);
        assert_eq!(influencer_bonus_for_discount(9), 0);
        assert_eq!(influencer_bonus_for_discount(10), 1);
        assert_eq!(influencer_bonus_for_discount(555), 55);
    }

    #[test]
    fn redemption_never_exceeds_balance() {
        assert_eq!(clamp_redemption(50, 30), 30);
        assert_eq!(clamp_redemption(10, 30), 10);
        assert_eq!(clamp_redemption(10, 0), 0);
        assert_eq!(clamp_redemption(-5, 30), 0);
        assert_eq!(clamp_redemption(10, -3), 0);
    }
}
