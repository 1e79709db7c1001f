//! HTTP reachability checks for extracted subscriptions.
//!
//! Each entry walks an attempt ladder (every identity directly, then every identity through
//! each proxy) until one attempt says the endpoint is alive. Entries are checked concurrently,
//! at most `workers` at a time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};

mod classify;
mod ladder;

pub use classify::{
    classify_failure, classify_status, io_error_kind, ProbeReason, TransportFailure, Verdict,
};
pub use ladder::{attempt_plan, Attempt, Ladder, Route};

use crate::model::{default_user_agents, SubscriptionEntry, UserAgent};
use crate::storage::AppConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub identities: Vec<UserAgent>,
    pub proxies: Vec<String>,
    pub workers: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            identities: default_user_agents(),
            proxies: Vec::new(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ProbeSettings {
    /// Defaults overridden by whatever the app config sets.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut settings = Self::default();
        if let Some(secs) = config.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        if !config.user_agents.is_empty() {
            settings.identities = config.user_agents.clone();
        }
        if let Some(workers) = config.workers {
            settings.workers = workers.get();
        }
        settings.proxies = config.proxies.clone();
        settings
    }
}

/// Split a comma separated proxy list, dropping blanks.
pub fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub entry: SubscriptionEntry,
    pub success: bool,
    pub reason: ProbeReason,
}

struct ProxyRoute {
    url: String,
    client: Result<Client, String>,
}

pub struct Verifier {
    direct: Client,
    proxies: Vec<ProxyRoute>,
    identities: Vec<UserAgent>,
    workers: usize,
}

impl Verifier {
    /// Builds every client upfront. Only the direct client is required; a proxy whose client
    /// cannot be built is skipped at probe time.
    pub fn new(settings: ProbeSettings) -> anyhow::Result<Self> {
        let direct = Client::builder()
            .no_proxy()
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let proxies = settings
            .proxies
            .iter()
            .map(|url| ProxyRoute {
                url: url.clone(),
                client: proxied_client(url, settings.timeout),
            })
            .collect();

        let identities = if settings.identities.is_empty() {
            default_user_agents()
        } else {
            settings.identities
        };

        Ok(Self {
            direct,
            proxies,
            identities,
            workers: settings.workers.max(1),
        })
    }

    pub async fn verify(&self, entry: SubscriptionEntry) -> VerificationOutcome {
        let span = info_span!("verify", name = %entry.name, url = %entry.url);
        async move {
            let mut ladder = Ladder::new(attempt_plan(self.identities.len(), self.proxies.len()));
            while let Some(attempt) = ladder.next_attempt() {
                let verdict = self.attempt(&entry.url, attempt).await;
                if let Some(reason) = ladder.record(attempt, verdict) {
                    info!(%reason, "alive");
                    return VerificationOutcome {
                        entry,
                        success: true,
                        reason,
                    };
                }
            }
            let reason = ladder.into_reason();
            warn!(%reason, "unreachable");
            VerificationOutcome {
                entry,
                success: false,
                reason,
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt(&self, url: &str, attempt: Attempt) -> Verdict {
        let (client, proxy) = match attempt.route {
            Route::Direct => (&self.direct, None),
            Route::Proxy(index) => {
                let route = &self.proxies[index];
                match &route.client {
                    Ok(client) => (client, Some(route.url.as_str())),
                    Err(message) => {
                        return Verdict::RouteDown(ProbeReason::ProxyFailed {
                            proxy: route.url.clone(),
                            message: message.clone(),
                        })
                    }
                }
            }
        };
        let identity = &self.identities[attempt.identity];

        let verdict = match client
            .head(url)
            .header(USER_AGENT, identity.value.as_str())
            .send()
            .await
        {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(err) => classify_failure(&TransportFailure::from_reqwest(&err), proxy),
        };
        info!(
            route = ?attempt.route,
            identity = %identity.name,
            verdict = ?verdict,
            "attempt finished"
        );
        verdict
    }

    /// Verify every entry, at most `workers` at a time. Results keep the input order.
    pub async fn verify_all(
        self: Arc<Self>,
        entries: Vec<SubscriptionEntry>,
    ) -> Vec<VerificationOutcome> {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(entries.len());

        for entry in entries {
            let verifier = Arc::clone(&self);
            let permits = Arc::clone(&permits);
            let fallback = entry.clone();
            let handle = tokio::spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                verifier.verify(entry).await
            });
            handles.push((fallback, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (entry, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!(url = %entry.url, error = %err, "verification task failed");
                    outcomes.push(VerificationOutcome {
                        entry,
                        success: false,
                        reason: ProbeReason::Network(err.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}

fn proxied_client(url: &str, timeout: Duration) -> Result<Client, String> {
    let proxy = Proxy::all(url).map_err(|err| format!("invalid proxy url: {err}"))?;
    Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
        .map_err(|err| format!("client build failed: {err}"))
}
