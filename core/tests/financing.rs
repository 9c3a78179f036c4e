use consortium_core::{
    error::CoreError,
    financing::{calculate, FinancingTerms},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn assert_close(a: f64, b: f64, what: &str) {
    let scale = a.abs().max(b.abs()).max(1.0);
    assert!(
        (a - b).abs() <= 1e-9 * scale,
        "{what}: {a} vs {b} differ beyond 1e-9 relative"
    );
}

fn reference_terms() -> FinancingTerms {
    FinancingTerms::new(100_000.0, 120, 15.0)
        .unwrap()
        .with_down_payment(20_000.0)
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn reference_quote_without_index() {
    let b = calculate(&reference_terms());

    assert_eq!(b.credit_letter_value, 80_000.0);
    assert_eq!(b.total_admin_cost, 12_000.0);
    assert_eq!(b.index_adjustment, 0.0);
    assert_eq!(b.total_with_adjustment, 92_000.0);
    assert_close(b.monthly_payment, 766.666_666_666_666_6, "monthly_payment");
    assert_close(b.monthly_amortization, 80_000.0 / 120.0, "monthly_amortization");
    assert_close(b.monthly_admin_fee, 100.0, "monthly_admin_fee");
}

/// Average-balance approximation: half the credit letter, charged at the
/// annual index rate for the contract length in years.
#[test]
fn index_adjustment_uses_average_balance() {
    let terms = reference_terms().with_index_rate(6.0).unwrap();
    let b = calculate(&terms);

    // 40_000 × 0.06 × 10 years
    assert_close(b.index_adjustment, 24_000.0, "index_adjustment");
    assert_close(b.total_with_adjustment, 116_000.0, "total_with_adjustment");
    assert_close(b.monthly_index_adjustment(), 200.0, "monthly_index_adjustment");
}

#[test]
fn monthly_payment_times_installments_matches_total() {
    let cases = [
        (250_000.0, 200, 0.0, 18.0, 7.5),
        (45_990.0, 72, 5_000.0, 14.0, 0.0),
        (1.0, 1, 0.0, 0.0, 0.0),
        (87_654.32, 37, 12_345.67, 16.5, 3.3),
        (0.0, 12, 0.0, 10.0, 5.0),
    ];

    for (asset, n, down, admin, index) in cases {
        let terms = FinancingTerms::new(asset, n, admin)
            .unwrap()
            .with_down_payment(down)
            .unwrap()
            .with_index_rate(index)
            .unwrap();
        let b = calculate(&terms);

        assert_eq!(b.credit_letter_value, asset - down);
        assert!(b.total_with_adjustment >= b.credit_letter_value);
        assert_close(
            b.monthly_payment * n as f64,
            b.total_with_adjustment,
            &format!("asset={asset} n={n}"),
        );
    }
}

#[test]
fn zero_index_total_is_credit_plus_admin_exactly() {
    let terms = FinancingTerms::new(73_210.55, 84, 17.25)
        .unwrap()
        .with_down_payment(3_210.55)
        .unwrap();
    let b = calculate(&terms);
    assert_eq!(b.total_with_adjustment, b.credit_letter_value + b.total_admin_cost);
}

#[test]
fn schedule_has_one_line_per_installment_summing_to_total() {
    let terms = reference_terms().with_index_rate(4.0).unwrap();
    let b = calculate(&terms);
    let schedule = b.schedule();

    assert_eq!(schedule.len(), 120);
    assert_eq!(schedule.first().unwrap().number, 1);
    assert_eq!(schedule.last().unwrap().number, 120);

    let total: f64 = schedule.iter().map(|l| l.payment).sum();
    assert!((total - b.total_with_adjustment).abs() < 1e-6, "sum={total}");

    let line = schedule[0];
    assert_close(
        line.amortization + line.admin_fee + line.index_adjustment,
        line.payment,
        "line components",
    );
}

#[test]
fn calculation_is_idempotent() {
    let terms = reference_terms().with_index_rate(5.5).unwrap();
    assert_eq!(calculate(&terms), calculate(&terms));
}

// ── Boundary validation ──────────────────────────────────────────────────────

#[test]
fn zero_installments_rejected() {
    let err = FinancingTerms::new(100_000.0, 0, 15.0).unwrap_err();
    assert!(
        matches!(err, CoreError::Validation { field: "installments", .. }),
        "got {err:?}"
    );
}

#[test]
fn negative_or_non_finite_asset_rejected() {
    assert!(FinancingTerms::new(-1.0, 12, 10.0).is_err());
    assert!(FinancingTerms::new(f64::NAN, 12, 10.0).is_err());
    assert!(FinancingTerms::new(f64::INFINITY, 12, 10.0).is_err());
}

#[test]
fn down_payment_above_asset_rejected() {
    let err = FinancingTerms::new(10_000.0, 12, 10.0)
        .unwrap()
        .with_down_payment(10_000.01)
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "down_payment", .. }));
}

#[test]
fn down_payment_equal_to_asset_gives_zero_credit() {
    let terms = FinancingTerms::new(10_000.0, 12, 10.0)
        .unwrap()
        .with_down_payment(10_000.0)
        .unwrap();
    let b = calculate(&terms);
    assert_eq!(b.credit_letter_value, 0.0);
    assert_eq!(b.monthly_payment, 0.0);
}

#[test]
fn negative_rates_rejected() {
    assert!(FinancingTerms::new(10_000.0, 12, -0.5).is_err());
    let base = FinancingTerms::new(10_000.0, 12, 10.0).unwrap();
    assert!(matches!(
        base.with_index_rate(-1.0).unwrap_err(),
        CoreError::Validation { field: "index_rate_percent", .. }
    ));
}
