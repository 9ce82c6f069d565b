//! Property-based tests for pricing and points invariants.

use proptest::prelude::*;

use storefront_api::entities::coupon::CouponKind;
use storefront_api::services::points::{clamp_redemption, earned_for_subtotal};
use storefront_api::services::pricing::{apply_coupon, subtotal, CouponTerms};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn percent_discount_is_floored_and_bounded(
        subtotal_cents in 0i64..100_000_000,
        value in 0i64..=100,
    ) {
        let discount = apply_coupon(
            subtotal_cents,
            Some(&CouponTerms { kind: CouponKind::Percent, value }),
        );
        prop_assert_eq!(discount.discount_cents, subtotal_cents * value / 100);
        prop_assert!(discount.discount_cents >= 0);
        prop_assert!(discount.discount_cents <= subtotal_cents);
        prop_assert_eq!(discount.total_cents, subtotal_cents - discount.discount_cents);
    }

    #[test]
    fn fixed_discount_is_clamped(
        subtotal_cents in 0i64..100_000_000,
        value in -10_000i64..10_000_000,
    ) {
        let discount = apply_coupon(
            subtotal_cents,
            Some(&CouponTerms { kind: CouponKind::Fixed, value }),
        );
        prop_assert_eq!(discount.discount_cents, value.max(0).min(subtotal_cents));
        prop_assert_eq!(discount.total_cents, subtotal_cents - discount.discount_cents);
    }

    #[test]
    fn subtotal_matches_manual_sum(
        items in prop::collection::vec((0i64..100_000, 1i32..50), 0..12),
    ) {
        let expected: i64 = items
            .iter()
            .map(|(price, qty)| price * *qty as i64)
            .sum();
        prop_assert_eq!(subtotal(items.iter().copied()), expected);
    }

    #[test]
    fn redemption_never_overdraws(requested in any::<i32>(), balance in any::<i32>()) {
        let redeemed = clamp_redemption(requested, balance);
        prop_assert!(redeemed >= 0);
        prop_assert!(redeemed <= balance.max(0));
        prop_assert!(redeemed <= requested.max(0));
    }

    #[test]
    fn earned_points_scale_with_subtotal(subtotal_cents in 0i64..100_000_000) {
        let earned = earned_for_subtotal(subtotal_cents) as i64;
        prop_assert_eq!(earned, subtotal_cents / 1000);
    }
}
