use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::analysis::domain::analyzer::{Analyzer, AnalyzerResult, RawDeltas, RawDiff};

#[derive(Error, Debug)]
pub enum HttpAnalyzerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Serialize)]
struct DiffRequest<'a> {
    system: &'a str,
    left: &'a str,
    right: &'a str,
}

/// Analyzer served by a phonological analysis service over HTTP/JSON.
pub struct HttpAnalyzer {
    client: Client,
    endpoint: String,
    system: String,
    reentrant: bool,
}

impl HttpAnalyzer {
    /// Connects to `endpoint` and checks that it knows `system`.
    ///
    /// `reentrant` declares whether the service may be called concurrently.
    pub fn connect(
        endpoint: &str,
        system: &str,
        reentrant: bool,
        request_timeout: Duration,
    ) -> Result<Self, HttpAnalyzerError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(HttpAnalyzerError::Client)?;
        let analyzer = Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            system: system.to_string(),
            reentrant,
        };

        let url = analyzer.url(&format!("systems/{system}"));
        let response = analyzer
            .client
            .get(&url)
            .send()
            .map_err(|e| HttpAnalyzerError::Request {
                url: url.clone(),
                source: e,
            })?;
        check_status(&url, response)?;
        log::info!("Connected to analyzer at {} (system {system})", analyzer.endpoint);

        Ok(analyzer)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        left: &str,
        right: &str,
    ) -> Result<T, HttpAnalyzerError> {
        let url = self.url(path);
        let body = DiffRequest {
            system: &self.system,
            left,
            right,
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| HttpAnalyzerError::Request {
                url: url.clone(),
                source: e,
            })?;

        check_status(&url, response)?
            .json()
            .map_err(|e| HttpAnalyzerError::Decode { url, source: e })
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, HttpAnalyzerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(HttpAnalyzerError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

impl Analyzer for HttpAnalyzer {
    fn feature_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
        Ok(self.post("feature-diff", left, right)?)
    }

    fn phoneme_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
        Ok(self.post("phoneme-diff", left, right)?)
    }

    fn feature_deltas(&self, left: &str, right: &str) -> AnalyzerResult<RawDeltas> {
        Ok(self.post("feature-deltas", left, right)?)
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }
}
