use consortium_core::{
    chargeback::{resolve, ChargebackRule, ChargebackSchedule},
    error::CoreError,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rule(max_payment_number: u32, percentage: f64) -> ChargebackRule {
    ChargebackRule { max_payment_number, percentage }
}

/// The 3/6/12 schedule, deliberately out of order.
fn standard_rules() -> Vec<ChargebackRule> {
    vec![rule(12, 20.0), rule(3, 100.0), rule(6, 50.0)]
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn nearest_upper_threshold_applies() {
    let rules = standard_rules();
    assert_eq!(resolve(&rules, 4), Some(50.0));
    assert_eq!(resolve(&rules, 1), Some(100.0));
    assert_eq!(resolve(&rules, 0), Some(100.0));
}

#[test]
fn threshold_is_inclusive() {
    let rules = standard_rules();
    assert_eq!(resolve(&rules, 3), Some(100.0));
    assert_eq!(resolve(&rules, 6), Some(50.0));
    assert_eq!(resolve(&rules, 12), Some(20.0));
}

#[test]
fn past_every_threshold_owes_nothing() {
    assert_eq!(resolve(&standard_rules(), 13), None);
    assert_eq!(resolve(&standard_rules(), u32::MAX), None);
}

#[test]
fn empty_rule_set_never_applies() {
    for paid in [0, 1, 5, 100] {
        assert_eq!(resolve(&[], paid), None);
    }
}

#[test]
fn resolve_leaves_input_order_untouched() {
    let rules = standard_rules();
    let before = rules.clone();
    let _ = resolve(&rules, 4);
    assert_eq!(rules, before);
}

/// For every payment count, the chosen threshold is ≥ the count and no
/// smaller threshold also qualifies.
#[test]
fn result_is_nearest_upper_threshold_for_all_counts() {
    let rules = vec![rule(2, 90.0), rule(9, 35.0), rule(5, 60.0), rule(20, 5.0)];
    for paid in 0..=25u32 {
        let expected = rules
            .iter()
            .filter(|r| r.max_payment_number >= paid)
            .min_by_key(|r| r.max_payment_number)
            .map(|r| r.percentage);
        assert_eq!(resolve(&rules, paid), expected, "paid={paid}");
    }
}

#[test]
fn resolve_is_idempotent() {
    let rules = standard_rules();
    assert_eq!(resolve(&rules, 7), resolve(&rules, 7));
}

// ── Schedule boundary ────────────────────────────────────────────────────────

#[test]
fn schedule_sorts_and_resolves() {
    let schedule = ChargebackSchedule::new("acme", "imovel_120", standard_rules()).unwrap();

    let thresholds: Vec<u32> = schedule.rules().iter().map(|r| r.max_payment_number).collect();
    assert_eq!(thresholds, vec![3, 6, 12]);
    assert_eq!(schedule.resolve(4), Some(50.0));
    assert_eq!(schedule.applicable_rule(4), Some(rule(6, 50.0)));
    assert_eq!(schedule.last_threshold(), Some(12));
    assert_eq!(schedule.resolve(13), None);
}

#[test]
fn schedule_rejects_duplicate_thresholds() {
    let err = ChargebackSchedule::new("acme", "p", vec![rule(3, 100.0), rule(3, 80.0)]).unwrap_err();
    assert!(
        matches!(err, CoreError::Validation { field: "max_payment_number", .. }),
        "got {err:?}"
    );
}

#[test]
fn schedule_rejects_out_of_range_values() {
    assert!(ChargebackSchedule::new("acme", "p", vec![rule(0, 10.0)]).is_err());
    assert!(ChargebackSchedule::new("acme", "p", vec![rule(3, 100.5)]).is_err());
    assert!(ChargebackSchedule::new("acme", "p", vec![rule(3, -1.0)]).is_err());
}

#[test]
fn empty_schedule_is_valid() {
    let schedule = ChargebackSchedule::new("acme", "p", vec![]).unwrap();
    assert!(schedule.is_empty());
    assert_eq!(schedule.resolve(1), None);
    assert_eq!(schedule.last_threshold(), None);
}
