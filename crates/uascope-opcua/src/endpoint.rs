// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint resolver and security negotiator.
//!
//! Discovery is bounded by the configured timeout and selection demands an
//! exact match on both the requested security policy and mode. There is no
//! downgrade path: a near match is a failure carrying the server's full
//! advertised list for diagnostics.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ClientError, ConnectError, EndpointError};
use crate::transport::UaTransport;
use crate::types::{ClientConfig, SecurityMode, SecurityPolicy};

/// One server-advertised endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Endpoint URL.
    pub url: String,
    /// Advertised security policy.
    pub policy: SecurityPolicy,
    /// Advertised security mode.
    pub mode: SecurityMode,
    /// Server-assigned relative security level (higher is stronger).
    pub security_level: u8,
}

impl EndpointDescriptor {
    /// Returns `true` if this endpoint carries exactly the requested
    /// security configuration.
    pub fn matches(&self, policy: SecurityPolicy, mode: SecurityMode) -> bool {
        self.policy == policy && self.mode == mode
    }
}

/// Selects the first endpoint exactly matching the requested (policy, mode).
///
/// Ties are broken by server ordering; all exact matches are
/// protocol-equivalent for the requested configuration. Zero matches fails
/// with the full advertised list. Never downgrades.
pub fn select_endpoint(
    endpoints: &[EndpointDescriptor],
    policy: SecurityPolicy,
    mode: SecurityMode,
) -> Result<EndpointDescriptor, EndpointError> {
    if let Some(endpoint) = endpoints.iter().find(|e| e.matches(policy, mode)) {
        debug!(url = %endpoint.url, %policy, %mode, "endpoint selected");
        return Ok(endpoint.clone());
    }

    let advertised: Vec<(SecurityPolicy, SecurityMode)> =
        endpoints.iter().map(|e| (e.policy, e.mode)).collect();
    warn!(%policy, %mode, advertised = advertised.len(), "no exact endpoint match");
    Err(EndpointError::no_exact_match(policy, mode, advertised))
}

/// Discovers the server's endpoints and selects the exact match.
///
/// Discovery expiry is fatal to the connect attempt and is not retried.
pub async fn resolve<T: UaTransport + ?Sized>(
    transport: &T,
    config: &ClientConfig,
    url: &str,
    policy: SecurityPolicy,
    mode: SecurityMode,
) -> Result<EndpointDescriptor, ClientError> {
    debug!(url, %policy, %mode, "discovering endpoints");

    let endpoints = tokio::time::timeout(config.discovery_timeout, transport.discover_endpoints(url))
        .await
        .map_err(|_| ConnectError::discovery_timed_out(url, config.discovery_timeout))?
        .map_err(|e| EndpointError::discovery_failed(url, e.to_string()))?;

    debug!(url, count = endpoints.len(), "discovery answered");
    Ok(select_endpoint(&endpoints, policy, mode)?)
}
