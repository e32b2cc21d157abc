//! Ordered fall-through across alternative backends.
//!
//! Each phase lists its tiers once; [`run_cascade`] tries them in order,
//! logs every failure and only errors when the list is exhausted.

use std::fmt;
use std::future::Future;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Exploration backends, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExploreTier {
    Remote,
    Local,
    Inference,
}

impl ExploreTier {
    /// Remote is only worth trying when a protocol server was supplied.
    pub fn chain(with_remote: bool) -> Vec<Self> {
        let mut tiers = Vec::with_capacity(3);
        if with_remote {
            tiers.push(Self::Remote);
        }
        tiers.extend([Self::Local, Self::Inference]);
        tiers
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Inference => "inference",
        }
    }
}

impl fmt::Display for ExploreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution backends, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteTier {
    Remote,
    Local,
    Subprocess,
}

impl ExecuteTier {
    pub fn chain(with_remote: bool) -> Vec<Self> {
        let mut tiers = Vec::with_capacity(3);
        if with_remote {
            tiers.push(Self::Remote);
        }
        tiers.extend([Self::Local, Self::Subprocess]);
        tiers
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Subprocess => "subprocess",
        }
    }
}

impl fmt::Display for ExecuteTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run `attempt` for each tier until one succeeds.
///
/// Returns the value together with the tier that produced it. When every
/// tier fails the error lists each tier's failure in order.
pub async fn run_cascade<K, F, Fut, T>(phase: &str, tiers: &[K], mut attempt: F) -> Result<(T, K)>
where
    K: Copy + fmt::Display,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = Vec::with_capacity(tiers.len());

    for &tier in tiers {
        debug!(phase, tier = %tier, "Attempting tier");
        match attempt(tier).await {
            Ok(value) => {
                info!(phase, tier = %tier, "Tier succeeded");
                return Ok((value, tier));
            }
            Err(err) => {
                warn!(phase, tier = %tier, error = %err, "Tier failed, falling through");
                failures.push(format!("{tier}: {err:#}"));
            }
        }
    }

    if failures.is_empty() {
        return Err(anyhow!("No {phase} tiers available"));
    }
    Err(anyhow!("All {phase} tiers failed: {}", failures.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn remote_tier_is_optional() {
        assert_eq!(
            ExploreTier::chain(false),
            vec![ExploreTier::Local, ExploreTier::Inference]
        );
        assert_eq!(ExecuteTier::chain(true)[0], ExecuteTier::Remote);
        assert_eq!(ExecuteTier::chain(true).len(), 3);
    }

    #[tokio::test]
    async fn first_success_wins() {
        let calls = AtomicUsize::new(0);
        let (value, tier) = run_cascade("explore", &ExploreTier::chain(true), |tier| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if tier == ExploreTier::Remote {
                    bail!("connection refused");
                }
                Ok(tier.as_str().len())
            }
        })
        .await
        .unwrap();

        assert_eq!(tier, ExploreTier::Local);
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_cascade_reports_every_tier() {
        let err = run_cascade("execute", &ExecuteTier::chain(false), |tier| async move {
            Err::<(), _>(anyhow!("{tier} down"))
        })
        .await
        .unwrap_err()
        .to_string();

        assert!(err.starts_with("All execute tiers failed"));
        assert!(err.contains("local: local down"));
        assert!(err.contains("subprocess: subprocess down"));
    }

    #[tokio::test]
    async fn empty_tier_list_is_an_error() {
        let tiers: [ExecuteTier; 0] = [];
        let err = run_cascade("execute", &tiers, |_| async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No execute tiers"));
    }
}
