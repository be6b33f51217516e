use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use telemetry_core::{DomainConfig, DomainSimulator};

pub const DEFAULT_PORT: u16 = 8081;

/// Everything the service needs at startup. Domains are plain data so a
/// deployment can retune drift and thresholds without rebuilding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "builtin_domains")]
    pub domains: Vec<DomainConfig>,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))
}

/// The consciousness, performance and peripheral presets.
pub fn builtin_domains() -> Vec<DomainConfig> {
    vec![
        consciousness_guards::default_for_platform(),
        performance_guards::default_for_platform(),
        peripheral_guards::default_for_platform(),
    ]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            domains: builtin_domains(),
        }
    }
}

impl ServiceConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Seeds every domain from one value; domains get distinct streams.
    pub fn with_seed(mut self, seed: u64) -> Self {
        for (offset, domain) in self.domains.iter_mut().enumerate() {
            domain.seed = Some(seed.wrapping_add(offset as u64));
        }
        self
    }

    /// Validates every domain and builds its simulator. Any configuration
    /// error aborts startup.
    pub fn build_simulators(&self) -> anyhow::Result<BTreeMap<String, Arc<DomainSimulator>>> {
        if self.domains.is_empty() {
            bail!("no domains configured");
        }
        let mut simulators = BTreeMap::new();
        for domain in &self.domains {
            if simulators.contains_key(&domain.name) {
                bail!("domain `{}` is configured twice", domain.name);
            }
            let simulator = DomainSimulator::create(domain.clone())?;
            simulators.insert(domain.name.clone(), Arc::new(simulator));
        }
        Ok(simulators)
    }
}
