use async_trait::async_trait;
use reqwest::Client;

use crate::cloudflare::types::{ApiEnvelope, DnsRecord};
use crate::error::Error;
use crate::rebind::DnsProvider;

/// Cloudflare API v4 base URL.
pub const API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Clone)]
pub struct CloudflareClient {
    http: Client,
    base_url: String,
    api_token: String,
}

impl CloudflareClient {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self::with_base_url(API_BASE, api_token)
    }

    /// Point the client at a different endpoint (tests, API gateways).
    pub fn with_base_url(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.api_token)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// All DNS records of a zone.
    pub async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, Error> {
        let url = self.url(&format!("zones/{zone_id}/dns_records"));
        let res = self.auth(self.http.get(url)).send().await?;
        if !res.status().is_success() {
            return Err(status_error(res).await);
        }
        Ok(res.json::<ApiEnvelope<Vec<DnsRecord>>>().await?.result)
    }

    /// Replace a record's stored contents; returns the provider's resulting
    /// record. No retry here, the caller decides what a failure means.
    pub async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord, Error> {
        let url = self.url(&format!(
            "zones/{}/dns_records/{}",
            record.zone_id, record.id
        ));
        let res = self.auth(self.http.put(url)).json(record).send().await?;
        if !res.status().is_success() {
            return Err(status_error(res).await);
        }
        Ok(res.json::<ApiEnvelope<DnsRecord>>().await?.result)
    }

    /// Locate the record managed for `name`. Called once, at startup.
    pub async fn find_record(&self, zone_id: &str, name: &str) -> Result<DnsRecord, Error> {
        let records = self.list_records(zone_id).await?;
        records
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::RecordNotFound(name.to_string()))
    }
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord, Error> {
        CloudflareClient::update_record(self, record).await
    }
}

async fn status_error(res: reqwest::Response) -> Error {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    Error::ProviderStatus { status, body }
}
