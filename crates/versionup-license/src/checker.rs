use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, Request};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub purchase_code: String,
    pub item_id: String,
}

/// Fetches the raw validation body for a purchase code.
pub trait LicenseChecker {
    fn fetch_validation(&self, request: &PurchaseRequest) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpLicenseChecker {
    client: Client,
    endpoint: String,
}

impl HttpLicenseChecker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build license validation http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub(crate) fn build_request(&self, request: &PurchaseRequest) -> Result<Request> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("purchase_code", request.purchase_code.as_str()),
                ("item_id", request.item_id.as_str()),
            ])
            .build()
            .with_context(|| {
                format!(
                    "invalid license validation endpoint: '{}'",
                    self.endpoint
                )
            })
    }
}

impl LicenseChecker for HttpLicenseChecker {
    fn fetch_validation(&self, request: &PurchaseRequest) -> Result<String> {
        let http_request = self.build_request(request)?;
        let response = self
            .client
            .execute(http_request)
            .with_context(|| format!("license validation request failed: {}", self.endpoint))?;
        response
            .text()
            .context("failed reading license validation response body")
    }
}
