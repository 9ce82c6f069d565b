//! Flat-rate shipping quotes.
//!
//! Base rate for Paraná, a higher rate elsewhere, and free shipping for
//! Paraná once the subtotal clears the threshold. A carrier integration
//! would replace this module wholesale; callers only see `quote_shipping`.

pub const BASE_PR_CENTS: i64 = 1200;
pub const BASE_OUT_PR_CENTS: i64 = 1800;
pub const FREE_SHIPPING_THRESHOLD_PR_CENTS: i64 = 15_000;

#[derive(Debug, Clone)]
pub struct ShippingInput {
    pub zip: String,
    pub city: String,
    /// UF, e.g. "PR"
    pub state: String,
    pub subtotal_cents: i64,
}

fn is_parana(uf: &str) -> bool {
    uf.trim().eq_ignore_ascii_case("PR")
}

/// Shipping fee in cents for the given destination and subtotal.
pub fn quote_shipping(input: &ShippingInput) -> i64 {
    let in_pr = is_parana(&input.state);

    if in_pr && input.subtotal_cents >= FREE_SHIPPING_THRESHOLD_PR_CENTS {
        return 0;
    }

    if in_pr {
        BASE_PR_CENTS
    } else {
        BASE_OUT_PR_CENTS
    }
}
