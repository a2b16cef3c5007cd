//! Synapse configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynapseError};
use crate::types::affinity::{validate_decay_rate, HebbianDeltas, DEFAULT_DECAY_RATE};

/// Synapse service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapseConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Allow neurogenesis to provision new agents
    pub enable_dynamic_agents: bool,
    /// Reported only; the learning collaborator lives elsewhere
    pub enable_autonomous_learning: bool,
    /// Affinity ledger configuration
    pub hebbian: HebbianSettings,
    /// Capability index configuration
    pub index: IndexSettings,
    /// Neurogenesis configuration
    pub neurogenesis: NeurogenesisSettings,
    /// Router configuration
    pub router: RouterSettings,
    /// Knowledge store configuration
    pub store: StoreSettings,
}

impl Default for SynapseConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_PORT,
            enable_dynamic_agents: true,
            enable_autonomous_learning: true,
            hebbian: HebbianSettings::default(),
            index: IndexSettings::default(),
            neurogenesis: NeurogenesisSettings::default(),
            router: RouterSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl SynapseConfig {
    /// Load configuration from environment and `.env`
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Platform PORT first, SYNAPSE_PORT wins
        set_parsed(&mut cfg.port, var("PORT"));
        if let Some(host) = var("SYNAPSE_HOST") {
            cfg.host = host;
        }
        set_parsed(&mut cfg.port, var("SYNAPSE_PORT"));

        set_flag(&mut cfg.enable_dynamic_agents, var("ENABLE_DYNAMIC_AGENTS"));
        set_flag(&mut cfg.enable_autonomous_learning, var("ENABLE_AUTONOMOUS_LEARNING"));

        // Hebbian settings
        set_parsed(&mut cfg.hebbian.delta_success, var("HEBBIAN_DELTA_SUCCESS"));
        set_parsed(&mut cfg.hebbian.delta_failure, var("HEBBIAN_DELTA_FAILURE"));
        set_parsed(&mut cfg.hebbian.decay_rate, var("HEBBIAN_DECAY_RATE"));
        set_parsed(&mut cfg.hebbian.decay_interval_secs, var("HEBBIAN_DECAY_INTERVAL_SEC"));

        // Index settings
        set_parsed(&mut cfg.index.cache_ttl_secs, var("INDEX_CACHE_TTL_SEC"));
        set_parsed(&mut cfg.index.min_relevance_threshold, var("INDEX_MIN_RELEVANCE_THRESHOLD"));
        set_parsed(&mut cfg.index.max_agents_per_query, var("INDEX_MAX_AGENTS_PER_QUERY"));
        set_parsed(
            &mut cfg.index.cluster_update_interval_secs,
            var("INDEX_CLUSTER_UPDATE_INTERVAL_SEC"),
        );
        set_parsed(
            &mut cfg.index.profile_refresh_interval_secs,
            var("INDEX_PROFILE_REFRESH_INTERVAL_SEC"),
        );
        set_parsed(&mut cfg.index.performance_history_cap, var("INDEX_PERFORMANCE_HISTORY_CAP"));
        cfg.index.redis_url = var("SYNAPSE_REDIS_URL");

        // Neurogenesis settings
        cfg.neurogenesis.provisioner_url = var("PROVISIONER_URL");
        if let Some(agents) = var("RESEARCH_AGENTS") {
            cfg.neurogenesis.research_agents = agents
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
        }
        if let Some(region) = var("NEUROGENESIS_REGION") {
            cfg.neurogenesis.region = region;
        }
        set_parsed(&mut cfg.neurogenesis.research_timeout_ms, var("RESEARCH_TIMEOUT_MS"));
        set_parsed(&mut cfg.neurogenesis.provision_timeout_ms, var("PROVISION_TIMEOUT_MS"));

        // Router settings
        set_parsed(&mut cfg.router.dispatch_timeout_ms, var("DISPATCH_TIMEOUT_MS"));
        cfg.router.agents_file = var("SYNAPSE_AGENTS_FILE");

        // Store settings
        cfg.store.url = var("KNOWLEDGE_STORE_URL");
        set_parsed(&mut cfg.store.timeout_ms, var("STORE_TIMEOUT_MS"));

        cfg.hebbian.validate()?;
        Ok(cfg)
    }
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, value: Option<String>) {
    if let Some(v) = value.and_then(|v| v.parse().ok()) {
        *target = v;
    }
}

fn set_flag(target: &mut bool, value: Option<String>) {
    if let Some(v) = value {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *target = true,
            "0" | "false" | "no" | "off" => *target = false,
            _ => {}
        }
    }
}

/// Affinity ledger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HebbianSettings {
    /// Weight added on success
    pub delta_success: f64,
    /// Weight removed on failure
    pub delta_failure: f64,
    /// Scheduled decay rate
    pub decay_rate: f64,
    /// Seconds between scheduled decay passes
    pub decay_interval_secs: u64,
}

impl Default for HebbianSettings {
    fn default() -> Self {
        let deltas = HebbianDeltas::default();
        Self {
            delta_success: deltas.success,
            delta_failure: deltas.failure,
            decay_rate: DEFAULT_DECAY_RATE,
            decay_interval_secs: crate::DEFAULT_DECAY_INTERVAL_SECS,
        }
    }
}

impl HebbianSettings {
    pub fn deltas(&self) -> HebbianDeltas {
        HebbianDeltas {
            success: self.delta_success,
            failure: self.delta_failure,
        }
    }

    pub fn decay_interval(&self) -> Duration {
        Duration::from_secs(self.decay_interval_secs)
    }

    /// Deltas and decay rate must lie in [0, 1]; the decay interval must be non-zero
    pub fn validate(&self) -> Result<()> {
        self.deltas().validate()?;
        validate_decay_rate(self.decay_rate)?;
        if self.decay_interval_secs == 0 {
            return Err(SynapseError::Config(
                "HEBBIAN_DECAY_INTERVAL_SEC must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Capability index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Discovery cache lifetime in seconds
    pub cache_ttl_secs: u64,
    /// Candidates below this relevance are dropped
    pub min_relevance_threshold: f64,
    /// Maximum candidates returned per discovery
    pub max_agents_per_query: usize,
    /// Seconds between cluster rebuilds
    pub cluster_update_interval_secs: u64,
    /// Seconds between profile refreshes from the store
    pub profile_refresh_interval_secs: u64,
    /// Samples kept per agent
    pub performance_history_cap: usize,
    /// Redis URL for the shared cache tier (optional)
    pub redis_url: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: crate::DEFAULT_CACHE_TTL_SECS,
            min_relevance_threshold: crate::DEFAULT_MIN_RELEVANCE,
            max_agents_per_query: crate::DEFAULT_MAX_AGENTS_PER_QUERY,
            cluster_update_interval_secs: 3600,
            profile_refresh_interval_secs: 600,
            performance_history_cap: crate::types::agent::DEFAULT_PERFORMANCE_HISTORY_CAP,
            redis_url: None,
        }
    }
}

impl IndexSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cluster_update_interval(&self) -> Duration {
        Duration::from_secs(self.cluster_update_interval_secs)
    }

    pub fn profile_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.profile_refresh_interval_secs)
    }
}

/// Neurogenesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeurogenesisSettings {
    /// Lifecycle provisioner base URL (optional)
    pub provisioner_url: Option<String>,
    /// Fixed research agents; empty means discover them
    pub research_agents: Vec<String>,
    /// Region new agents belong to
    pub region: String,
    /// Aggregated confidence required before provisioning
    pub min_provision_confidence: f64,
    pub research_timeout_ms: u64,
    pub provision_timeout_ms: u64,
}

impl Default for NeurogenesisSettings {
    fn default() -> Self {
        Self {
            provisioner_url: None,
            research_agents: Vec::new(),
            region: "global".to_string(),
            min_provision_confidence: 0.3,
            research_timeout_ms: crate::DEFAULT_RESEARCH_TIMEOUT_MS,
            provision_timeout_ms: crate::DEFAULT_PROVISION_TIMEOUT_MS,
        }
    }
}

impl NeurogenesisSettings {
    pub fn research_timeout(&self) -> Duration {
        Duration::from_millis(self.research_timeout_ms)
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_millis(self.provision_timeout_ms)
    }
}

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    pub dispatch_timeout_ms: u64,
    /// JSON file with the static fleet (optional)
    pub agents_file: Option<String>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: crate::DEFAULT_DISPATCH_TIMEOUT_MS,
            agents_file: None,
        }
    }
}

impl RouterSettings {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// Knowledge store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Knowledge store URL; unset selects the in-memory store
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: crate::DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
