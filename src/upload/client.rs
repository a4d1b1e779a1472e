//! Minimal WATS REST client: it can upload a report and nothing else

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use super::ReportUploader;
use crate::common::config::ServerConfig;
use crate::common::{Error, Result};

/// Path of the WSJF import endpoint below the server base URL
const REPORT_ENDPOINT: &str = "api/Report/WSJF";

/// Identifier assigned by the server to an uploaded report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub id: String,
    /// Where the report can be viewed in the browser
    pub view_url: String,
}

pub struct WatsClient {
    http: reqwest::Client,
    base_url: String,
}

impl WatsClient {
    /// Create a client authenticating with `token`
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("server base URL is empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|_| Error::Config("API token contains invalid header characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Create a client for `base_url`, reading the token from the environment
    /// variable named in the server configuration
    pub fn from_env(base_url: &str, server: &ServerConfig) -> Result<Self> {
        let token = std::env::var(&server.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::MissingToken(server.token_env.clone()))?;
        Self::new(base_url, &token, Duration::from_secs(server.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url, REPORT_ENDPOINT)
    }
}

/// Read the `[{"ID": ...}]` body the server answers with
pub(crate) fn parse_receipt(base_url: &str, body: &str) -> Result<UploadReceipt> {
    let value: Value = serde_json::from_str(body)?;
    let id = match value.get(0).and_then(|entry| entry.get("ID")) {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(Error::Internal(format!(
                "upload response carries no report ID: {}",
                body
            )))
        }
    };
    Ok(UploadReceipt {
        view_url: format!("{}/Modules/ViewUUT_Report.html?id={}", base_url, id),
        id,
    })
}

#[async_trait]
impl ReportUploader for WatsClient {
    async fn upload(&self, payload: &[u8]) -> Result<UploadReceipt> {
        let url = self.endpoint();
        let response = self.http.post(&url).body(payload.to_vec()).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(%url, status = status.as_u16(), "Report upload rejected: {}", body);
            return Err(Error::Upload {
                status: status.as_u16(),
                body,
            });
        }

        let receipt = parse_receipt(&self.base_url, &body)?;
        info!("Uploaded report: {}", receipt.view_url);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = WatsClient::new("https://acme.wats.com/", "token", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://acme.wats.com");
        assert_eq!(client.endpoint(), "https://acme.wats.com/api/Report/WSJF");
    }

    #[test]
    fn test_empty_base_url() {
        assert!(matches!(
            WatsClient::new("/", "token", Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_token() {
        let server = ServerConfig {
            token_env: "WSJF_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        let err = WatsClient::from_env("https://acme.wats.com", &server).err().unwrap();
        assert!(matches!(err, Error::MissingToken(name) if name == "WSJF_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_parse_receipt() {
        let receipt = parse_receipt("https://acme.wats.com", r#"[{"ID": "1b4e28ba"}]"#).unwrap();
        assert_eq!(receipt.id, "1b4e28ba");
        assert_eq!(
            receipt.view_url,
            "https://acme.wats.com/Modules/ViewUUT_Report.html?id=1b4e28ba"
        );

        let numeric = parse_receipt("https://acme.wats.com", r#"[{"ID": 42}]"#).unwrap();
        assert_eq!(numeric.id, "42");

        assert!(parse_receipt("https://acme.wats.com", "[]").is_err());
    }
}
