//! Execution router.
//!
//! # Responsibilities
//! - Resolve the execution path for each call (explicit per-call policy or
//!   the configured default) and carry it as data
//! - Fail the server path fast on incomplete credentials, before any I/O
//! - Normalize both paths into one outcome shape
//!
//! # Design Decisions
//! - The router never switches paths on its own; a caller that wants a
//!   fallback retries with the other policy
//! - Endpoint and parameter validation runs before either path executes,
//!   so both paths reject the same bad inputs identically

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::credentials::{CredentialSnapshot, CredentialStore};
use crate::error::GatewayError;
use crate::executor::ServerExecutor;
use crate::observability::metrics;
use crate::protocol::NotificationLevel;
use crate::registry::ConnectionRegistry;
use crate::template::{LogicalRequest, TemplateEngine};

/// Which path executes a call. Explicit caller data, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// Direct HTTP from the gateway with the stored partial credentials.
    Server,
    /// Forward to the user's connected browser session.
    Delegate,
}

impl ExecutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPolicy::Server => "server",
            ExecutionPolicy::Delegate => "delegate",
        }
    }
}

impl FromStr for ExecutionPolicy {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(ExecutionPolicy::Server),
            "delegate" => Ok(ExecutionPolicy::Delegate),
            other => Err(GatewayError::Config(format!("unknown policy: {other:?}"))),
        }
    }
}

/// Normalized success outcome of either path.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub payload: Value,
    /// Which path actually ran.
    pub policy: ExecutionPolicy,
    /// Upstream HTTP status, present on the server path only.
    pub upstream_status: Option<u16>,
}

/// Top-level entry point for gateway calls.
pub struct ExecutionGateway {
    templates: TemplateEngine,
    credentials: Arc<dyn CredentialStore>,
    server: ServerExecutor,
    registry: Arc<ConnectionRegistry>,
    default_policy: ExecutionPolicy,
    user_policies: std::collections::HashMap<String, ExecutionPolicy>,
    default_timeout: Duration,
    required_cookies: Vec<String>,
}

impl ExecutionGateway {
    pub fn new(
        config: &GatewayConfig,
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<ConnectionRegistry>,
    ) -> Result<Self, GatewayError> {
        let server = ServerExecutor::new(Duration::from_secs(config.upstream.request_timeout_secs))?;
        let mut user_policies = std::collections::HashMap::new();
        for (user_id, policy) in &config.routing.user_policies {
            user_policies.insert(user_id.clone(), policy.parse()?);
        }
        Ok(Self {
            templates: TemplateEngine::new(config.upstream.base_url.clone()),
            credentials,
            server,
            registry,
            default_policy: config.routing.default_policy.parse()?,
            user_policies,
            default_timeout: Duration::from_secs(config.routing.default_call_timeout_secs),
            required_cookies: config.upstream.required_cookies.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Execute one logical call on the requested path.
    ///
    /// `policy` and `timeout` fall back to the configured defaults. The
    /// resolved policy is fixed before execution and never changed mid-call.
    pub async fn execute(
        &self,
        user_id: &str,
        endpoint: &str,
        params: Vec<(String, String)>,
        policy: Option<ExecutionPolicy>,
        timeout: Option<Duration>,
    ) -> Result<CallOutcome, GatewayError> {
        // Explicit per-call choice wins, then the user's configured
        // default, then the global one. Resolved once, carried as data.
        let policy = policy
            .or_else(|| self.user_policies.get(user_id).copied())
            .unwrap_or(self.default_policy);
        let timeout = timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let result = self
            .execute_routed(user_id, endpoint, params, policy, timeout)
            .await;

        match &result {
            Ok(_) => {
                tracing::info!(
                    user_id = %user_id,
                    endpoint = %endpoint,
                    policy = policy.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "call succeeded"
                );
                metrics::record_call(policy.as_str(), "success", started);
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    endpoint = %endpoint,
                    policy = policy.as_str(),
                    error = %err,
                    "call failed"
                );
                metrics::record_call(policy.as_str(), err.kind(), started);
            }
        }
        result
    }

    async fn execute_routed(
        &self,
        user_id: &str,
        endpoint: &str,
        params: Vec<(String, String)>,
        policy: ExecutionPolicy,
        timeout: Duration,
    ) -> Result<CallOutcome, GatewayError> {
        // Both paths reject unknown endpoints and parameters identically;
        // a probe build against an empty snapshot validates the call shape
        // without touching credentials.
        let probe = CredentialSnapshot::new(None, Default::default());
        self.templates.build(endpoint, &params, &probe)?;

        let request = LogicalRequest::new(endpoint, params, user_id);

        match policy {
            ExecutionPolicy::Server => self.execute_server(&request).await,
            ExecutionPolicy::Delegate => self.execute_delegated(&request, timeout).await,
        }
    }

    async fn execute_server(&self, request: &LogicalRequest) -> Result<CallOutcome, GatewayError> {
        let snapshot = self
            .credentials
            .snapshot(&request.user_id)
            .await
            .ok_or_else(|| GatewayError::IncompleteCredentials(request.user_id.clone()))?;

        // Locally detectable gaps fail before any network I/O.
        if !snapshot.is_sufficient_for(&self.required_cookies) {
            return Err(GatewayError::IncompleteCredentials(request.user_id.clone()));
        }

        let built = self
            .templates
            .build(&request.endpoint, &request.params, &snapshot)?;
        let response = self.server.execute(&built).await?;

        Ok(CallOutcome {
            payload: response.payload,
            policy: ExecutionPolicy::Server,
            upstream_status: Some(response.status),
        })
    }

    async fn execute_delegated(
        &self,
        request: &LogicalRequest,
        timeout: Duration,
    ) -> Result<CallOutcome, GatewayError> {
        let handle = self
            .registry
            .lookup(&request.user_id)
            .ok_or_else(|| GatewayError::NoDelegateAvailable(request.user_id.clone()))?;

        let reply = handle.delegate(request, timeout).await?;
        if reply.success {
            Ok(CallOutcome {
                payload: reply.payload,
                policy: ExecutionPolicy::Delegate,
                upstream_status: None,
            })
        } else {
            Err(GatewayError::DelegateFailed {
                message: reply.error.unwrap_or_else(|| "unspecified failure".to_string()),
            })
        }
    }

    /// Fire-and-forget notification to a user's delegate.
    pub async fn notify(
        &self,
        user_id: &str,
        message: &str,
        level: NotificationLevel,
    ) -> Result<(), GatewayError> {
        let handle = self
            .registry
            .lookup(user_id)
            .ok_or_else(|| GatewayError::NoDelegateAvailable(user_id.to_string()))?;
        handle.notify(message, level).await
    }
}
