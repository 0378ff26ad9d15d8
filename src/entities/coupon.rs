use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discount coupon managed through the admin surface. Coupons are validated
/// and stored but not yet applied to order totals (extension point).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Unique redemption code as entered by the admin.
    #[sea_orm(unique)]
    pub code: String,
    pub kind: CouponKind,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub value: Decimal,
    pub active: bool,
    #[sea_orm(nullable)]
    pub starts_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub ends_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub max_uses: Option<i32>,
    pub uses_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    /// `value` is a percentage between 1 and 100.
    #[sea_orm(string_value = "percent")]
    Percent,
    /// `value` is a fixed amount, at least 0.01.
    #[sea_orm(string_value = "amount")]
    Amount,
}

impl Model {
    /// Whether the coupon is currently redeemable: active flag set, inside
    /// the validity window, and under the usage cap.
    pub fn active_now(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.starts_at.map_or(true, |s| s <= now)
            && self.ends_at.map_or(true, |e| e >= now)
            && self.max_uses.map_or(true, |max| self.uses_count < max)
    }
}

/// Validates a coupon value against its kind. Percent coupons must be 1-100;
/// amount coupons must be at least 0.01.
pub fn validate_value(kind: CouponKind, value: Decimal) -> Result<(), String> {
    match kind {
        CouponKind::Percent => {
            if value < dec!(1) || value > dec!(100) {
                return Err("percent coupons must be between 1 and 100".to_string());
            }
        }
        CouponKind::Amount => {
            if value < dec!(0.01) {
                return Err("amount coupons must be at least 0.01".to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon() -> Model {
        Model {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            kind: CouponKind::Percent,
            value: dec!(10),
            active: true,
            starts_at: None,
            ends_at: None,
            max_uses: None,
            uses_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn percent_value_bounds() {
        assert!(validate_value(CouponKind::Percent, dec!(1)).is_ok());
        assert!(validate_value(CouponKind::Percent, dec!(100)).is_ok());
        assert!(validate_value(CouponKind::Percent, dec!(0.5)).is_err());
        assert!(validate_value(CouponKind::Percent, dec!(101)).is_err());
    }

    #[test]
    fn amount_value_bounds() {
        assert!(validate_value(CouponKind::Amount, dec!(0.01)).is_ok());
        assert!(validate_value(CouponKind::Amount, dec!(0.001)).is_err());
    }

    #[test]
    fn window_and_cap_gate_redeemability() {
        let now = Utc::now();

        let mut c = coupon();
        assert!(c.active_now(now));

        c.ends_at = Some(now - Duration::hours(1));
        assert!(!c.active_now(now));

        let mut capped = coupon();
        capped.max_uses = Some(5);
        capped.uses_count = 5;
        assert!(!capped.active_now(now));

        let mut inactive = coupon();
        inactive.active = false;
        assert!(!inactive.active_now(now));
    }
}
