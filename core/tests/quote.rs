use chrono::{TimeZone, Utc};
use consortium_core::{
    clock::ManualClock,
    config::CoreConfig,
    error::CoreError,
    financing::calculate,
    quote::Quote,
};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
}

#[test]
fn quote_prices_the_catalog_product() {
    let config = CoreConfig::default_test();
    let product = config.product("auto_60").unwrap();

    let quote = Quote::build("acme", product, 90_000.0, 10_000.0, &clock()).unwrap();

    assert_eq!(quote.tenant_id, "acme");
    assert_eq!(quote.product_id, "auto_60");
    assert_eq!(quote.breakdown, calculate(&quote.terms));
    assert_eq!(quote.breakdown.credit_letter_value, 80_000.0);
    assert_eq!(quote.breakdown.total_admin_cost, 9_600.0);
    assert_eq!(quote.breakdown.installments, 60);
}

#[test]
fn quotes_get_distinct_ids() {
    let config = CoreConfig::default_test();
    let product = config.product("auto_60").unwrap();
    let clock = clock();

    let a = Quote::build("acme", product, 50_000.0, 0.0, &clock).unwrap();
    let b = Quote::build("acme", product, 50_000.0, 0.0, &clock).unwrap();
    assert_ne!(a.quote_id, b.quote_id);
    assert_eq!(a.breakdown, b.breakdown);
}

#[test]
fn invalid_down_payment_surfaces_validation_error() {
    let config = CoreConfig::default_test();
    let product = config.product("auto_60").unwrap();

    let err = Quote::build("acme", product, 50_000.0, 60_000.0, &clock()).unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "down_payment", .. }));
}

#[test]
fn inactive_product_cannot_be_quoted() {
    let mut config = CoreConfig::default_test();
    let product = config.products.get_mut("auto_60").unwrap();
    product.active = false;

    let err = Quote::build("acme", product, 50_000.0, 0.0, &clock()).unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "product_id", .. }));
}
