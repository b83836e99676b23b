//! HTTP submission of a job to the coverage service.
//!
//! The job's canonical JSON travels as a single `json_file` part of a
//! `multipart/form-data` POST.

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::{CovupError, Result};
use crate::model::Job;

pub const DEFAULT_ENDPOINT: &str = "https://coveralls.io/api/v1/jobs";

const FORM_FIELD: &str = "json_file";

/// What the service says about an accepted job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct Client {
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl Client {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("covup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CovupError::Upload {
                uri: endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self::with_http(endpoint, http))
    }

    /// Use a preconfigured HTTP client (proxies, timeouts, TLS roots).
    pub fn with_http(endpoint: impl Into<String>, http: reqwest::blocking::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit `job`. Fails with `SubmissionPrecondition` before any network
    /// traffic when the job has neither a repo token nor a service name.
    pub fn submit(&self, job: &Job) -> Result<SubmitResponse> {
        if !job.is_submittable() {
            return Err(CovupError::SubmissionPrecondition);
        }

        let json = job.to_json()?;
        tracing::info!(
            endpoint = %self.endpoint,
            files = job.source_files.len(),
            bytes = json.len(),
            "submitting coverage job"
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .multipart(json_form(json)?)
            .send()
            .map_err(|e| self.upload_err(e))?;

        let status = resp.status();
        let text = resp.text().map_err(|e| self.upload_err(e))?;
        if !status.is_success() {
            return Err(self.upload_err(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        // The service answers with JSON; anything else is passed on as the
        // message.
        Ok(serde_json::from_str(&text).unwrap_or(SubmitResponse {
            message: Some(text),
            url: None,
        }))
    }

    fn upload_err(&self, message: impl ToString) -> CovupError {
        CovupError::Upload {
            uri: self.endpoint.clone(),
            message: message.to_string(),
        }
    }
}

/// The one-part form the jobs endpoint expects.
fn json_form(json: String) -> Result<Form> {
    let part = Part::text(json)
        .file_name(FORM_FIELD)
        .mime_str("application/json")
        .map_err(|e| CovupError::Format(e.to_string()))?;
    Ok(Form::new().part(FORM_FIELD, part))
}
