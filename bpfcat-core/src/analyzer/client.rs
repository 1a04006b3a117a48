//! HTTP client for the analyzer services
//!
//! One request per analyze call, no retries: a failed analyzer call fails
//! the request that issued it and is reported upstream as a bad-gateway
//! condition.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};

use super::report::{MetadataReport, PrimitiveReport};

/// HTTP client for the metadata and primitive analyzer services
pub struct AnalyzerClient {
    http_client: reqwest::Client,
    metadata_url: String,
    primitive_url: String,
}

impl AnalyzerClient {
    /// Create a client from configuration
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            metadata_url: config.metadata_url.trim_end_matches('/').to_string(),
            primitive_url: config.primitive_url.trim_end_matches('/').to_string(),
        })
    }

    /// Request a metadata analysis for a repo
    ///
    /// Returns the parsed report together with the raw response body, which
    /// the API echoes back to the caller verbatim.
    pub async fn analyze_metadata(
        &self,
        repo_url: &str,
        repo_id: i64,
    ) -> Result<(MetadataReport, serde_json::Value)> {
        let url = format!("{}/analyze", self.metadata_url);
        let body = MetadataRequest {
            repo_url,
            repo_id,
        };

        let raw = self.post_json(&url, &body).await?;
        let report: MetadataReport = serde_json::from_value(raw.clone())
            .map_err(|e| Error::Analyzer(format!("failed to parse analyzer response: {}", e)))?;
        Ok((report, raw))
    }

    /// Request a primitive analysis for a repo
    pub async fn analyze_primitives(
        &self,
        repo_url: &str,
    ) -> Result<(PrimitiveReport, serde_json::Value)> {
        let url = format!("{}/parse", self.primitive_url);
        let body = PrimitiveRequest { repo_url };

        let raw = self.post_json(&url, &body).await?;
        let report: PrimitiveReport = serde_json::from_value(raw.clone())
            .map_err(|e| Error::Analyzer(format!("failed to parse analyzer response: {}", e)))?;
        Ok((report, raw))
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<serde_json::Value> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Analyzer(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| Error::Analyzer(format!("failed to parse response: {}", e)))
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Analyzer(format!(
                "analyzer error ({}): {}",
                status, error_text
            )))
        }
    }
}

/// Request body for the metadata analyzer's POST /analyze
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRequest<'a> {
    repo_url: &'a str,
    repo_id: i64,
}

/// Request body for the primitive analyzer's POST /parse
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrimitiveRequest<'a> {
    repo_url: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let client = AnalyzerClient::new(&AnalyzerConfig::default()).unwrap();
        assert_eq!(client.metadata_url, "http://analyzer:8001");
        assert_eq!(client.primitive_url, "http://primitive-analyzer:8002");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = AnalyzerConfig {
            metadata_url: "http://localhost:8001/".to_string(),
            primitive_url: "http://localhost:8002//".to_string(),
            timeout_secs: 5,
        };
        let client = AnalyzerClient::new(&config).unwrap();
        assert_eq!(client.metadata_url, "http://localhost:8001");
        assert_eq!(client.primitive_url, "http://localhost:8002");
    }

    #[test]
    fn test_request_body_wire_format() {
        let body = MetadataRequest {
            repo_url: "https://github.com/iovisor/bcc",
            repo_id: 7,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["repoUrl"], "https://github.com/iovisor/bcc");
        assert_eq!(json["repoId"], 7);
    }

    #[tokio::test]
    async fn test_unreachable_analyzer_is_reported() {
        let config = AnalyzerConfig {
            metadata_url: "http://127.0.0.1:1".to_string(),
            primitive_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        };
        let client = AnalyzerClient::new(&config).unwrap();
        let err = client
            .analyze_metadata("https://github.com/x/y", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Analyzer(_)));
    }
}
