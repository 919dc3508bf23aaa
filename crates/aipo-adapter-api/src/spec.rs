use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider kind, matching the stable CLI/config surface (spec.md §3, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    OpenaiCompatible,
    Anthropic,
    Bedrock,
    LocalHttp,
    Stdio,
    Mock,
    GenericHttp,
}

/// Where the endpoint lives. Exactly one of `endpoint` / `command` is set,
/// matching the provider kind (HTTP-family kinds use `endpoint`, `stdio` uses
/// `command`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Coordinates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// A credential reference. Always an environment variable *name*, never a
/// literal secret (spec.md §3, §6: "Secrets MUST reference an env var name").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthRef {
    pub env_var: String,
}

impl AuthRef {
    /// Resolve the referenced env var at call time. Never logged, never
    /// stored on the returned `AdapterSpec` or persisted with results.
    pub fn resolve(&self) -> Result<String, String> {
        std::env::var(&self.env_var).map_err(|_| {
            format!(
                "missing required environment variable `{}` for adapter auth",
                self.env_var
            )
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 250,
            max_backoff_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitParams {
    pub rps: f64,
    pub burst: u32,
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            rps: 5.0,
            burst: 5,
            jitter_ms: 0,
        }
    }
}

/// Declarative adapter configuration (spec.md §3 `AdapterSpec`, §6 "Adapter
/// configuration format"). Carries no secrets: `auth` is always an env var
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdapterSpec {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub auth: Option<AuthRef>,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub rate_limit: RateLimitParams,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl AdapterSpec {
    /// Structural validation independent of any live connection: every spec
    /// must have exactly one of endpoint/command depending on its kind, and
    /// credentials (if any) must be an env var reference, never embedded.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ProviderKind::Stdio => {
                if self.coordinates.command.as_ref().map_or(true, |c| c.is_empty()) {
                    return Err("stdio adapters require a non-empty `command`".into());
                }
            }
            ProviderKind::Mock => {}
            _ => {
                if self.coordinates.endpoint.is_none() {
                    return Err(format!(
                        "{:?} adapters require an `endpoint`",
                        self.kind
                    ));
                }
            }
        }
        if self.rate_limit.rps <= 0.0 {
            return Err("rate_limit.rps must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_requires_command() {
        let spec = AdapterSpec {
            name: "local".into(),
            kind: ProviderKind::Stdio,
            coordinates: Coordinates::default(),
            auth: None,
            params: HashMap::new(),
            rate_limit: RateLimitParams::default(),
            retry: RetryPolicy::default(),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn mock_needs_no_coordinates() {
        let spec = AdapterSpec {
            name: "m".into(),
            kind: ProviderKind::Mock,
            coordinates: Coordinates::default(),
            auth: None,
            params: HashMap::new(),
            rate_limit: RateLimitParams::default(),
            retry: RetryPolicy::default(),
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn auth_never_literal() {
        let auth = AuthRef {
            env_var: "DOES_NOT_EXIST_12345".into(),
        };
        assert!(auth.resolve().is_err());
    }
}
