//! Concurrent notification fan-out.
//!
//! One POST per subscriber, all started together and joined before the round
//! returns. A failing subscriber is logged and recorded in the round report;
//! it never affects its siblings and nothing is retried.

use std::path::PathBuf;

use anyhow::{Context, Result};
use futures_util::future::join_all;
use reqwest::{Certificate, Client, Identity};
use serde_json::Value;
use url::Url;

use crate::events::Category;
use crate::logging::{log, log_delivery, log_round, log_skip, obj, v_str, Domain, Level};

/// Client certificate, private key and trust anchor, all PEM files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsBundle {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
}

impl TlsBundle {
    fn load(&self) -> Result<(Identity, Certificate)> {
        let mut pem = std::fs::read(&self.cert_path)
            .with_context(|| format!("reading client certificate {}", self.cert_path.display()))?;
        let key = std::fs::read(&self.key_path)
            .with_context(|| format!("reading private key {}", self.key_path.display()))?;
        pem.push(b'\n');
        pem.extend_from_slice(&key);
        let identity = Identity::from_pem(&pem).context("parsing client identity")?;

        let ca = std::fs::read(&self.ca_path)
            .with_context(|| format!("reading trust anchor {}", self.ca_path.display()))?;
        let ca = Certificate::from_pem(&ca).context("parsing trust anchor")?;
        Ok((identity, ca))
    }
}

/// What to do when a round's credentials cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialPolicy {
    /// Deliver the round without client authentication.
    FallbackToPlain,
    /// Log and deliver nothing.
    AbortRound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Rejected { status: u16 },
    Transport { error: String },
    /// No payload could be built for this target.
    Skipped { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryOutcome::Rejected { .. } | DeliveryOutcome::Transport { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub target: String,
    pub outcome: DeliveryOutcome,
}

/// Per-target results of one fan-out round. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub category: Category,
    pub outcomes: Vec<TargetOutcome>,
    /// Set when the round never started, e.g. credentials failed to load.
    pub aborted: Option<String>,
}

impl RoundReport {
    pub fn aborted(category: Category, reason: impl Into<String>) -> Self {
        Self { category, outcomes: Vec::new(), aborted: Some(reason.into()) }
    }

    pub fn attempted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.outcome, DeliveryOutcome::Skipped { .. }))
            .count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.attempted()
    }

    pub fn failed_targets(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome.is_failure())
            .map(|o| o.target.as_str())
            .collect()
    }
}

pub struct Dispatcher {
    client: Client,
    mutual_tls: bool,
}

impl Dispatcher {
    pub fn plain() -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .context("building http client")?;
        Ok(Self { client, mutual_tls: false })
    }

    pub fn with_mutual_tls(bundle: &TlsBundle) -> Result<Self> {
        let (identity, ca) = bundle.load()?;
        let client = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .add_root_certificate(ca)
            .build()
            .context("building mutual-tls http client")?;
        Ok(Self { client, mutual_tls: true })
    }

    /// Build the client for one delivery round. Credentials are loaded here,
    /// once per round; `None` means the round must not run.
    pub fn for_round(category: Category, bundle: Option<&TlsBundle>, policy: CredentialPolicy) -> Option<Self> {
        let Some(bundle) = bundle else {
            return Self::plain_or_log(category);
        };
        match Self::with_mutual_tls(bundle) {
            Ok(d) => Some(d),
            Err(err) => {
                let fallback = policy == CredentialPolicy::FallbackToPlain;
                log(
                    if fallback { Level::Warn } else { Level::Error },
                    Domain::Tls,
                    "credential_load_failed",
                    obj(&[
                        ("category", v_str(category.as_str())),
                        ("cert_path", v_str(&bundle.cert_path.to_string_lossy())),
                        ("action", v_str(if fallback { "fallback_plain" } else { "abort_round" })),
                        ("msg", v_str(&format!("{:#}", err))),
                    ]),
                );
                if fallback {
                    Self::plain_or_log(category)
                } else {
                    None
                }
            }
        }
    }

    fn plain_or_log(category: Category) -> Option<Self> {
        match Self::plain() {
            Ok(d) => Some(d),
            Err(err) => {
                log(
                    Level::Error,
                    Domain::Dispatch,
                    "client_build_failed",
                    obj(&[("category", v_str(category.as_str())), ("msg", v_str(&format!("{:#}", err)))]),
                );
                None
            }
        }
    }

    pub fn is_mutual_tls(&self) -> bool {
        self.mutual_tls
    }

    /// POST one payload to one target. Never fails; the outcome says what happened.
    pub async fn deliver(&self, category: Category, target: &Url, payload: &Value) -> DeliveryOutcome {
        let outcome = match self.client.post(target.clone()).json(payload).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    DeliveryOutcome::Delivered { status: status.as_u16() }
                } else {
                    DeliveryOutcome::Rejected { status: status.as_u16() }
                }
            }
            Err(err) => DeliveryOutcome::Transport { error: err.to_string() },
        };
        match &outcome {
            DeliveryOutcome::Delivered { status } => log_delivery(category.as_str(), target.as_str(), Some(*status), None),
            DeliveryOutcome::Rejected { status } => log_delivery(
                category.as_str(),
                target.as_str(),
                Some(*status),
                Some(&format!("non-success status {}", status)),
            ),
            DeliveryOutcome::Transport { error } => log_delivery(category.as_str(), target.as_str(), None, Some(error)),
            DeliveryOutcome::Skipped { .. } => {}
        }
        outcome
    }

    /// Send the same payload to every target.
    pub async fn broadcast(&self, category: Category, targets: &[Url], payload: &Value) -> RoundReport {
        self.fan_out(category, targets, |_| Ok(payload.clone())).await
    }

    /// Build a payload per target, then deliver all of them concurrently.
    ///
    /// `build` runs once per target before any request is sent; a target whose
    /// build fails is recorded as skipped and receives nothing.
    pub async fn fan_out<F>(&self, category: Category, targets: &[Url], mut build: F) -> RoundReport
    where
        F: FnMut(&Url) -> Result<Value, String>,
    {
        let mut outcomes: Vec<Option<DeliveryOutcome>> = Vec::with_capacity(targets.len());
        let mut sends = Vec::new();
        for target in targets {
            match build(target) {
                Ok(payload) => {
                    outcomes.push(None);
                    sends.push((target, payload));
                }
                Err(reason) => {
                    log_skip(Domain::Market, category.as_str(), Some(target.as_str()), &reason);
                    outcomes.push(Some(DeliveryOutcome::Skipped { reason }));
                }
            }
        }

        let results = join_all(
            sends
                .iter()
                .map(|(target, payload)| self.deliver(category, target, payload)),
        )
        .await;

        let mut results = results.into_iter();
        let outcomes: Vec<TargetOutcome> = targets
            .iter()
            .zip(outcomes)
            .map(|(target, pre)| TargetOutcome {
                target: target.to_string(),
                outcome: pre.or_else(|| results.next()).unwrap_or(DeliveryOutcome::Skipped {
                    reason: "no delivery result".to_string(),
                }),
            })
            .collect();

        let report = RoundReport { category, outcomes, aborted: None };
        log_round(
            category.as_str(),
            self.is_mutual_tls(),
            report.attempted(),
            report.delivered(),
            report.failed(),
            report.skipped(),
        );
        report
    }
}
