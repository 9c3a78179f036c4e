//! Fixed-window request governor.
//!
//! Guards expensive operations (search, export, API calls). Each
//! registered policy allows `max_requests` per `window_ms` for every
//! partition key its key generator produces. State per key is a counter
//! and the instant its window ends; the window does not slide.
//!
//! Expired entries are reset lazily by `check_limit()`. `sweep()` only
//! bounds memory for keys that stop being queried; correctness never
//! depends on it running.
//!
//! The governor is an owned service object. Build one at startup, share
//! it behind an `Arc`, and give tests their own instance.

use crate::{
    clock::Clock,
    error::{CoreError, CoreResult},
    types::Timestamp,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{mpsc, Arc, RwLock, Weak},
    thread::JoinHandle,
};

const ANONYMOUS: &str = "anonymous";

/// What the caller knows about the request being governed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitContext {
    #[serde(default)]
    pub user_id:   Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl RateLimitContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), tenant_id: None }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Partitioning that can be written in a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// One shared counter for everyone.
    #[default]
    Global,
    User,
    Tenant,
}

pub type KeyFn = dyn Fn(&RateLimitContext) -> String + Send + Sync;

#[derive(Clone)]
pub enum KeyGenerator {
    Scope(KeyScope),
    Custom(Arc<KeyFn>),
}

impl KeyGenerator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RateLimitContext) -> String + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    fn partition_key(&self, policy_name: &str, ctx: &RateLimitContext) -> String {
        match self {
            Self::Scope(KeyScope::Global) => policy_name.to_string(),
            Self::Scope(KeyScope::User) => {
                ctx.user_id.clone().unwrap_or_else(|| ANONYMOUS.to_string())
            }
            Self::Scope(KeyScope::Tenant) => {
                ctx.tenant_id.clone().unwrap_or_else(|| ANONYMOUS.to_string())
            }
            Self::Custom(f) => (**f)(ctx),
        }
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::Scope(KeyScope::Global)
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(scope) => f.debug_tuple("Scope").field(scope).finish(),
            Self::Custom(_)    => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub name:          String,
    pub max_requests:  u32,
    pub window_ms:     u64,
    pub key_generator: KeyGenerator,
}

impl RateLimitPolicy {
    /// A global policy: every caller shares one counter.
    pub fn new(name: impl Into<String>, max_requests: u32, window_ms: u64) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window_ms,
            key_generator: KeyGenerator::default(),
        }
    }

    pub fn with_scope(mut self, scope: KeyScope) -> Self {
        self.key_generator = KeyGenerator::Scope(scope);
        self
    }

    pub fn with_key_generator<F>(mut self, f: F) -> Self
    where
        F: Fn(&RateLimitContext) -> String + Send + Sync + 'static,
    {
        self.key_generator = KeyGenerator::custom(f);
        self
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::validation("name", "policy name must not be empty"));
        }
        if self.max_requests == 0 {
            return Err(CoreError::validation(
                "max_requests",
                format!("policy '{}' must allow at least one request", self.name),
            ));
        }
        if self.window_ms == 0 || self.window_ms > i64::MAX as u64 {
            return Err(CoreError::validation(
                "window_ms",
                format!("policy '{}' window {} ms is out of range", self.name, self.window_ms),
            ));
        }
        Ok(())
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(self.window_ms as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateLimitEntry {
    count:    u32,
    reset_at: Timestamp,
}

impl RateLimitEntry {
    fn fresh(now: Timestamp, window: Duration) -> Self {
        Self {
            count:    0,
            reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed:   bool,
    pub remaining: u32,
    pub reset_at:  Timestamp,
}

impl RateLimitDecision {
    /// Time left in the current window; zero once it has passed.
    pub fn retry_after(&self, now: Timestamp) -> Duration {
        (self.reset_at - now).max(Duration::zero())
    }

    /// Whole minutes until the window resets, rounded up.
    pub fn minutes_until_reset(&self, now: Timestamp) -> i64 {
        let ms = self.retry_after(now).num_milliseconds();
        (ms + 59_999) / 60_000
    }

    /// Turn a rejection into `CoreError::RateLimited` for `?` call sites.
    pub fn into_result(self, policy: &str, now: Timestamp) -> CoreResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(CoreError::RateLimited {
                policy:              policy.to_string(),
                retry_after_minutes: self.minutes_until_reset(now),
            })
        }
    }
}

pub struct RateGovernor {
    clock:    Arc<dyn Clock>,
    policies: RwLock<HashMap<String, RateLimitPolicy>>,
    entries:  DashMap<String, RateLimitEntry>,
}

impl RateGovernor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            policies: RwLock::new(HashMap::new()),
            entries:  DashMap::new(),
        }
    }

    /// Build a governor with `policies` already registered.
    pub fn with_policies(
        clock: Arc<dyn Clock>,
        policies: impl IntoIterator<Item = RateLimitPolicy>,
    ) -> CoreResult<Self> {
        let governor = Self::new(clock);
        for policy in policies {
            governor.register(policy)?;
        }
        Ok(governor)
    }

    /// Add a policy, replacing any previous one with the same name.
    /// Existing counters are kept.
    pub fn register(&self, policy: RateLimitPolicy) -> CoreResult<()> {
        policy.validate()?;
        log::debug!(
            "rate_limit: registered policy={} max={} window_ms={} key={:?}",
            policy.name, policy.max_requests, policy.window_ms, policy.key_generator
        );
        let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
        policies.insert(policy.name.clone(), policy);
        Ok(())
    }

    pub fn policy(&self, name: &str) -> Option<RateLimitPolicy> {
        let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
        policies.get(name).cloned()
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Admit or reject one request under `policy_name`.
    ///
    /// The reset, the admission decision and the increment all happen
    /// while the key's entry is held, so concurrent callers can never push
    /// a key past its limit. Other keys are not blocked. A rejected check
    /// changes nothing.
    pub fn check_limit(
        &self,
        policy_name: &str,
        ctx: &RateLimitContext,
    ) -> CoreResult<RateLimitDecision> {
        let (key, max_requests, window) = {
            let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
            let policy = policies
                .get(policy_name)
                .ok_or_else(|| CoreError::UnknownPolicy { name: policy_name.to_string() })?;
            let partition = policy.key_generator.partition_key(&policy.name, ctx);
            (format!("{}:{partition}", policy.name), policy.max_requests, policy.window())
        };

        let mut entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                let now = self.clock.now();
                let mut entry = occupied.into_ref();
                if now >= entry.reset_at {
                    log::debug!("rate_limit: policy={policy_name} window expired, resetting");
                    *entry = RateLimitEntry::fresh(now, window);
                }
                entry
            }
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::fresh(self.clock.now(), window))
            }
        };

        let allowed = entry.count < max_requests;
        if allowed {
            entry.count += 1;
        } else {
            log::info!(
                "rate_limit: policy={policy_name} rejected, window resets at {}",
                entry.reset_at
            );
        }

        Ok(RateLimitDecision {
            allowed,
            remaining: if allowed { max_requests.saturating_sub(entry.count) } else { 0 },
            reset_at:  entry.reset_at,
        })
    }

    /// Like `check_limit`, but any internal failure (such as an
    /// unregistered policy) admits the request.
    pub fn check_fail_open(&self, policy_name: &str, ctx: &RateLimitContext) -> RateLimitDecision {
        match self.check_limit(policy_name, ctx) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("rate_limit: check failed for policy={policy_name}, allowing: {e}");
                RateLimitDecision { allowed: true, remaining: 0, reset_at: self.clock.now() }
            }
        }
    }

    /// Drop every entry whose window has ended. Returns how many went.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = now < entry.reset_at;
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            log::debug!("rate_limit: sweep removed {removed} expired entries");
        }
        removed
    }

    /// Number of live counters (expired-but-unswept included).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Run `sweep()` every `interval` on a background thread.
    ///
    /// The thread holds only a weak reference; it exits when the handle
    /// is stopped or dropped, or when the governor itself is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> SweeperHandle {
        let governor: Weak<Self> = Arc::downgrade(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => match governor.upgrade() {
                    Some(governor) => {
                        governor.sweep();
                    }
                    None => break,
                },
                _ => break,
            }
        });

        SweeperHandle { stop_tx: Some(stop_tx), join: Some(join) }
    }
}

/// Stops the background sweeper when stopped or dropped.
pub struct SweeperHandle {
    stop_tx: Option<mpsc::Sender<()>>,
    join:    Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::warn!("rate_limit: sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
