use crate::{
    chargeback::{ChargebackRule, ChargebackSchedule},
    error::{CoreError, CoreResult},
    financing::FinancingTerms,
    rate_limit::{KeyScope, RateLimitPolicy},
    types::{Money, PaymentCount, Percent, ProductId, TenantId},
};
use serde::Deserialize;
use std::collections::{hash_map::Entry, HashMap};

// ── Product catalog ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ConsortiumProduct {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    /// Total administration fee over the whole term, in percent.
    pub administration_fee: Percent,
    pub installments: PaymentCount,
    /// Annualized index adjustment rate, in percent.
    #[serde(default)]
    pub index_rate_percent: Percent,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl ConsortiumProduct {
    /// Financing terms for a user-entered asset value and down payment.
    pub fn terms_for(&self, asset_value: Money, down_payment: Money) -> CoreResult<FinancingTerms> {
        FinancingTerms::new(asset_value, self.installments, self.administration_fee)?
            .with_down_payment(down_payment)?
            .with_index_rate(self.index_rate_percent)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProductCatalogFile {
    products: Vec<ConsortiumProduct>,
}

// ── Chargeback schedules ───────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ChargebackScheduleConfig {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub rules: Vec<ChargebackRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChargebackSchedulesFile {
    schedules: Vec<ChargebackScheduleConfig>,
}

// ── Rate limit policies ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitPolicyConfig {
    pub name: String,
    pub max_requests: u32,
    pub window_ms: u64,
    #[serde(default)]
    pub scope: KeyScope,
}

impl From<&RateLimitPolicyConfig> for RateLimitPolicy {
    fn from(cfg: &RateLimitPolicyConfig) -> Self {
        RateLimitPolicy::new(cfg.name.clone(), cfg.max_requests, cfg.window_ms)
            .with_scope(cfg.scope)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RateLimitPoliciesFile {
    policies: Vec<RateLimitPolicyConfig>,
}

/// Presets used when no policy file is supplied.
pub fn default_rate_limits() -> Vec<RateLimitPolicyConfig> {
    vec![
        RateLimitPolicyConfig {
            name: "search".into(),
            max_requests: 30,
            window_ms: 60_000,
            scope: KeyScope::User,
        },
        RateLimitPolicyConfig {
            name: "export".into(),
            max_requests: 5,
            window_ms: 3_600_000,
            scope: KeyScope::User,
        },
        RateLimitPolicyConfig {
            name: "api".into(),
            max_requests: 100,
            window_ms: 60_000,
            scope: KeyScope::Tenant,
        },
    ]
}

// ── Root config ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub products: HashMap<ProductId, ConsortiumProduct>,
    pub chargeback_schedules: HashMap<(TenantId, ProductId), ChargebackSchedule>,
    pub rate_limits: Vec<RateLimitPolicyConfig>,
}

impl CoreConfig {
    /// Load from the data/ directory.
    /// In tests, use CoreConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let product_path = format!("{data_dir}/products/product_catalog.json");
        let product_content = std::fs::read_to_string(&product_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {product_path}: {e}"))?;
        let product_file: ProductCatalogFile = serde_json::from_str(&product_content)?;
        let products = build_products(product_file.products)
            .map_err(|e| anyhow::anyhow!("{product_path}: {e}"))?;

        let chargeback_path = format!("{data_dir}/chargeback/chargeback_schedules.json");
        let chargeback_content = std::fs::read_to_string(&chargeback_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {chargeback_path}: {e}"))?;
        let chargeback_file: ChargebackSchedulesFile = serde_json::from_str(&chargeback_content)?;
        let chargeback_schedules = build_schedules(chargeback_file.schedules)
            .map_err(|e| anyhow::anyhow!("{chargeback_path}: {e}"))?;

        let rate_path = format!("{data_dir}/rate_limits/rate_limit_policies.json");
        let rate_limits = match std::fs::read_to_string(&rate_path) {
            Ok(content) => serde_json::from_str::<RateLimitPoliciesFile>(&content)?.policies,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("config: {rate_path} not found, using default rate limits");
                default_rate_limits()
            }
            Err(e) => return Err(anyhow::anyhow!("Cannot read {rate_path}: {e}")),
        };

        let config = Self { products, chargeback_schedules, rate_limits };
        log::info!(
            "config: loaded {} products, {} chargeback schedules, {} rate limit policies",
            config.products.len(),
            config.chargeback_schedules.len(),
            config.rate_limits.len()
        );
        Ok(config)
    }

    pub fn product(&self, product_id: &str) -> CoreResult<&ConsortiumProduct> {
        self.products
            .get(product_id)
            .ok_or_else(|| CoreError::UnknownProduct { product_id: product_id.to_string() })
    }

    pub fn chargeback_schedule(&self, tenant_id: &str, product_id: &str) -> Option<&ChargebackSchedule> {
        self.chargeback_schedules
            .get(&(tenant_id.to_string(), product_id.to_string()))
    }

    pub fn rate_limit_policies(&self) -> Vec<RateLimitPolicy> {
        self.rate_limits.iter().map(RateLimitPolicy::from).collect()
    }

    pub fn default_test() -> Self {
        let products = vec![
            ConsortiumProduct {
                product_id: "imovel_120".into(),
                name: "Imóvel 120 meses".into(),
                category: "real_estate".into(),
                administration_fee: 15.0,
                installments: 120,
                index_rate_percent: 6.0,
                active: true,
            },
            ConsortiumProduct {
                product_id: "auto_60".into(),
                name: "Automóvel 60 meses".into(),
                category: "vehicle".into(),
                administration_fee: 12.0,
                installments: 60,
                index_rate_percent: 0.0,
                active: true,
            },
        ];
        let products = build_products(products).expect("default_test products are unique");

        let schedules = vec![
            ChargebackScheduleConfig {
                tenant_id: "acme".into(),
                product_id: "imovel_120".into(),
                rules: vec![
                    ChargebackRule { max_payment_number: 12, percentage: 20.0 },
                    ChargebackRule { max_payment_number: 3, percentage: 100.0 },
                    ChargebackRule { max_payment_number: 6, percentage: 50.0 },
                ],
            },
            ChargebackScheduleConfig {
                tenant_id: "acme".into(),
                product_id: "auto_60".into(),
                rules: vec![
                    ChargebackRule { max_payment_number: 1, percentage: 100.0 },
                    ChargebackRule { max_payment_number: 4, percentage: 30.0 },
                ],
            },
        ];
        let chargeback_schedules =
            build_schedules(schedules).expect("default_test schedules are valid");

        Self {
            products,
            chargeback_schedules,
            rate_limits: default_rate_limits(),
        }
    }
}

/// Key the catalog by product id. A repeated id is an error.
fn build_products(
    products: Vec<ConsortiumProduct>,
) -> CoreResult<HashMap<ProductId, ConsortiumProduct>> {
    let mut by_id = HashMap::with_capacity(products.len());
    for product in products {
        match by_id.entry(product.product_id.clone()) {
            Entry::Occupied(_) => {
                return Err(CoreError::validation(
                    "product_id",
                    format!("duplicate product '{}'", product.product_id),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(product);
            }
        }
    }
    Ok(by_id)
}

/// Validate every schedule and key it by tenant/product. At most one
/// schedule per pair.
fn build_schedules(
    configs: Vec<ChargebackScheduleConfig>,
) -> CoreResult<HashMap<(TenantId, ProductId), ChargebackSchedule>> {
    let mut schedules = HashMap::with_capacity(configs.len());
    for cfg in configs {
        match schedules.entry((cfg.tenant_id.clone(), cfg.product_id.clone())) {
            Entry::Occupied(_) => {
                return Err(CoreError::validation(
                    "schedule",
                    format!("duplicate schedule for {}/{}", cfg.tenant_id, cfg.product_id),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(ChargebackSchedule::new(cfg.tenant_id, cfg.product_id, cfg.rules)?);
            }
        }
    }
    Ok(schedules)
}
