//! Shared primitive types used across the financial core.

/// A monetary amount in currency units (not cents). Never rounded internally.
pub type Money = f64;

/// A percentage expressed on the 0–100 scale.
pub type Percent = f64;

/// An installment counter (payment number, installments made, term length).
pub type PaymentCount = u32;

/// Tenant (sales organization) identifier.
pub type TenantId = String;

/// Stable product catalog identifier.
pub type ProductId = String;

/// Wall-clock instant used by the rate governor and quote stamping.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Round a money value to cents for display. Calculations never call this.
pub fn round_cents(value: Money) -> Money {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::round_cents;

    #[test]
    fn rounds_half_cents_away_from_zero() {
        assert_eq!(round_cents(766.6666), 766.67);
        assert_eq!(round_cents(0.005), 0.01);
        assert_eq!(round_cents(-1.234), -1.23);
    }
}
