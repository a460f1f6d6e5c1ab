//! Pipeline configuration
//!
//! Everything is passed explicitly at construction. TOML files map onto
//! [`PipelineConfig`] one-to-one; omitted fields take their defaults.

use crate::error::PipelineError;
use pra_citation::{SkipList, VerifierConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Verification gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Verification rounds per claim, including the first
    pub max_rounds: u32,
    /// Claims verified or regenerated concurrently
    pub max_concurrent_verifications: usize,
}

impl GateConfig {
    /// With round limit
    #[inline]
    #[must_use]
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            max_concurrent_verifications: 5,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Citation verifier settings
    pub verifier: VerifierConfig,
    /// Gate settings
    pub gate: GateConfig,
    /// Overall run deadline in milliseconds
    pub pipeline_deadline_ms: u64,
    /// Timeout for each capability call in milliseconds
    pub capability_timeout_ms: u64,
    /// Hosts whose links are never treated as citations
    pub skip_hosts: SkipList,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        let config: Self =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.gate.max_rounds == 0 {
            return Err(PipelineError::Config("gate.max_rounds must be at least 1".into()));
        }
        if self.gate.max_concurrent_verifications == 0 {
            return Err(PipelineError::Config(
                "gate.max_concurrent_verifications must be at least 1".into(),
            ));
        }
        if self.pipeline_deadline_ms == 0 || self.capability_timeout_ms == 0 {
            return Err(PipelineError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// With verifier settings
    #[inline]
    #[must_use]
    pub fn with_verifier(mut self, verifier: VerifierConfig) -> Self {
        self.verifier = verifier;
        self
    }

    /// With gate settings
    #[inline]
    #[must_use]
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    /// With overall deadline
    #[inline]
    #[must_use]
    pub fn with_pipeline_deadline(mut self, deadline: Duration) -> Self {
        self.pipeline_deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With per-call capability timeout
    #[inline]
    #[must_use]
    pub fn with_capability_timeout(mut self, timeout: Duration) -> Self {
        self.capability_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With skip list
    #[inline]
    #[must_use]
    pub fn with_skip_hosts(mut self, skip: SkipList) -> Self {
        self.skip_hosts = skip;
        self
    }

    /// Overall deadline
    #[inline]
    #[must_use]
    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_millis(self.pipeline_deadline_ms)
    }

    /// Capability timeout
    #[inline]
    #[must_use]
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.capability_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verifier: VerifierConfig::default(),
            gate: GateConfig::default(),
            pipeline_deadline_ms: 600_000,
            capability_timeout_ms: 120_000,
            skip_hosts: SkipList::with_defaults(),
        }
    }
}
