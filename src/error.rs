// src/error.rs
use std::net::IpAddr;

use thiserror::Error;

/// Failure taxonomy for the rebind workflow.
///
/// Every variant is caught and logged where it occurs; none of them is
/// allowed to take the process down. Clients never see them either: a
/// failed rebind is observable only as the absence of a completion event.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cloudflare request failed: {0}")]
    ProviderRequest(#[from] reqwest::Error),

    #[error("cloudflare returned {status}: {body}")]
    ProviderStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("resolution failed: {0}")]
    Resolution(#[from] anyhow::Error),

    #[error("{domain} did not resolve to {target} within {attempts} attempts")]
    ResolutionTimeout {
        domain: String,
        target: IpAddr,
        attempts: u32,
    },

    #[error("no dns record found for {0}")]
    RecordNotFound(String),
}
