//! Remote conversion client: one external job per source file.
//!
//! The service exposes a three-call protocol. A job is created declaring a
//! chain of tasks (import by upload, convert, export to URL); the creation
//! response hands back a one-shot upload form; the job is then polled until
//! it reaches a terminal state; on `finished` the export task's produced
//! file is downloaded.
//!
//! ## State machine
//!
//! Each invocation walks a job through
//! `Created → Uploading → Polling → Finished` (or `Errored` / `TimedOut`).
//! Transitions are driven entirely by what the service reports; the client
//! observes state, it never infers it. No state is retained between
//! invocations.
//!
//! The bearer credential is read from [`ConvertConfig`] once at client
//! construction and never appears in log output or error messages.

use crate::config::ConvertConfig;
use crate::error::{ConvertError, JobError};
use crate::request::TargetFormat;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Observable lifecycle of one remote conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Uploading,
    Polling,
    Finished,
    Errored,
    TimedOut,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::Uploading => "uploading",
            JobState::Polling => "polling",
            JobState::Finished => "finished",
            JobState::Errored => "errored",
            JobState::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

// ── Service wire types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    data: JobData,
}

#[derive(Debug, Deserialize)]
struct JobData {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskData>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    operation: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    form: Option<UploadForm>,
    #[serde(default)]
    files: Vec<ExportedFile>,
}

/// Upload target handed back by the service. The parameters are opaque to
/// us and must be forwarded verbatim as form fields.
#[derive(Debug, Deserialize)]
struct UploadForm {
    url: String,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ExportedFile {
    url: String,
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP client for the external conversion service.
///
/// Construction fails with [`ConvertError::MissingCredential`] when no API
/// key is configured, so a misconfigured deployment is caught before any
/// file is read from scratch storage.
pub struct ConvertClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl fmt::Debug for ConvertClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertClient")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

impl ConvertClient {
    pub fn new(config: &ConvertConfig) -> Result<Self, ConvertError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ConvertError::MissingCredential)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConvertError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_poll_attempts: config.max_poll_attempts,
        })
    }

    /// Convert one file through the remote service and return the converted
    /// bytes.
    ///
    /// Walks the full job state machine; any terminal failure maps to the
    /// matching [`JobError`] variant. The caller records failures per file;
    /// this method is never retried above this layer (the poll loop already
    /// absorbs transient delay).
    pub async fn convert(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        target: TargetFormat,
    ) -> Result<Vec<u8>, JobError> {
        let job = self.create_job(target).await?;
        debug!(job_id = %job.id, file = filename, state = %JobState::Created, "Job created");

        let form = upload_form(&job)?;
        self.upload(filename, bytes, form).await?;
        debug!(job_id = %job.id, file = filename, state = %JobState::Uploading, "Upload complete");

        let final_job = self.poll(&job.id).await?;
        debug!(job_id = %job.id, file = filename, state = %JobState::Finished, "Job finished");

        let url = export_url(&final_job)?;
        self.download(&url).await
    }

    /// Step 1: create a job declaring the import → convert → export chain.
    async fn create_job(&self, target: TargetFormat) -> Result<JobData, JobError> {
        let body = json!({
            "tasks": {
                "upload": { "operation": "import/upload" },
                "convert": {
                    "operation": "convert",
                    "input": ["upload"],
                    "output_format": target.extension(),
                },
                "export": { "operation": "export/url", "input": ["convert"] },
            }
        });

        let response = self
            .http
            .post(format!("{}/jobs", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Submission {
                stage: "job creation",
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(JobError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(JobError::Submission {
                stage: "job creation",
                detail: format!("HTTP {status}"),
            });
        }

        let envelope: JobEnvelope = response.json().await.map_err(|e| JobError::Submission {
            stage: "job creation",
            detail: format!("malformed response: {e}"),
        })?;
        Ok(envelope.data)
    }

    /// Step 2: POST the file to the service-provided form target.
    ///
    /// Every service-supplied parameter is forwarded verbatim; the file
    /// bytes go under the `file` part, as the upload endpoint requires.
    async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        form: &UploadForm,
    ) -> Result<(), JobError> {
        let mut multipart = reqwest::multipart::Form::new();
        for (key, value) in &form.parameters {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            multipart = multipart.text(key.clone(), text);
        }
        multipart = multipart.part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
        );

        // The upload target is pre-signed; no credential goes with it.
        let response = self
            .http
            .post(&form.url)
            .multipart(multipart)
            .send()
            .await
            .map_err(|e| JobError::Submission {
                stage: "upload",
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(JobError::Submission {
                stage: "upload",
                detail: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }

    /// Step 3: poll job status at a fixed interval until a terminal state.
    async fn poll(&self, job_id: &str) -> Result<JobData, JobError> {
        for attempt in 1..=self.max_poll_attempts {
            sleep(self.poll_interval).await;

            let response = self
                .http
                .get(format!("{}/jobs/{}", self.api_base, job_id))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| JobError::Submission {
                    stage: "status poll",
                    detail: e.to_string(),
                })?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                return Err(JobError::Auth {
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(JobError::Submission {
                    stage: "status poll",
                    detail: format!("HTTP {status}"),
                });
            }

            let envelope: JobEnvelope =
                response.json().await.map_err(|e| JobError::Submission {
                    stage: "status poll",
                    detail: format!("malformed response: {e}"),
                })?;
            let job = envelope.data;

            match job.status.as_deref() {
                Some("finished") => return Ok(job),
                Some("error") => {
                    warn!(job_id, state = %JobState::Errored, "Service reported job error");
                    return Err(JobError::Processing {
                        detail: job_error_detail(&job),
                    });
                }
                _ => {
                    debug!(
                        job_id,
                        attempt,
                        max = self.max_poll_attempts,
                        state = %JobState::Polling,
                        "Job not terminal yet"
                    );
                }
            }
        }

        warn!(job_id, state = %JobState::TimedOut, "Poll budget exhausted");
        Err(JobError::Timeout {
            job_id: job_id.to_string(),
            attempts: self.max_poll_attempts,
        })
    }

    /// Step 4: fetch the exported file's bytes.
    async fn download(&self, url: &str) -> Result<Vec<u8>, JobError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| JobError::Download {
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(JobError::Download {
                detail: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| JobError::Download {
            detail: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Locate the `import/upload` task's form target in a creation response.
fn upload_form(job: &JobData) -> Result<&UploadForm, JobError> {
    job.tasks
        .iter()
        .find(|t| t.operation == "import/upload")
        .and_then(|t| t.result.as_ref())
        .and_then(|r| r.form.as_ref())
        .ok_or(JobError::Submission {
            stage: "job creation",
            detail: "response contains no upload form".into(),
        })
}

/// Locate the `export/url` task's produced file URL in a finished job.
fn export_url(job: &JobData) -> Result<String, JobError> {
    job.tasks
        .iter()
        .find(|t| t.operation == "export/url")
        .and_then(|t| t.result.as_ref())
        .and_then(|r| r.files.first())
        .map(|f| f.url.clone())
        .ok_or(JobError::Download {
            detail: "finished job contains no exported file".into(),
        })
}

/// Best human-readable detail for an errored job: the first task message,
/// if the service supplied one.
fn job_error_detail(job: &JobData) -> String {
    job.tasks
        .iter()
        .filter_map(|t| t.message.as_deref())
        .next()
        .unwrap_or("no detail reported")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_from_json(v: serde_json::Value) -> JobData {
        serde_json::from_value::<JobEnvelope>(v).unwrap().data
    }

    #[test]
    fn missing_credential_fails_construction() {
        let config = ConvertConfig::default();
        assert!(matches!(
            ConvertClient::new(&config),
            Err(ConvertError::MissingCredential)
        ));
    }

    #[test]
    fn debug_redacts_credential() {
        let config = ConvertConfig::builder().api_key("cc_secret_key").build().unwrap();
        let client = ConvertClient::new(&config).unwrap();
        let dbg = format!("{:?}", client);
        assert!(!dbg.contains("cc_secret_key"), "got: {dbg}");
    }

    #[test]
    fn upload_form_is_located_by_operation() {
        let job = job_from_json(serde_json::json!({
            "data": {
                "id": "j1",
                "tasks": [
                    { "operation": "convert" },
                    {
                        "operation": "import/upload",
                        "result": { "form": {
                            "url": "https://upload.example/target",
                            "parameters": { "key": "abc", "expires": 1234 }
                        }}
                    }
                ]
            }
        }));
        let form = upload_form(&job).unwrap();
        assert_eq!(form.url, "https://upload.example/target");
        assert_eq!(form.parameters.len(), 2);
    }

    #[test]
    fn missing_upload_form_is_a_submission_error() {
        let job = job_from_json(serde_json::json!({
            "data": { "id": "j1", "tasks": [{ "operation": "convert" }] }
        }));
        assert!(matches!(
            upload_form(&job),
            Err(JobError::Submission { stage: "job creation", .. })
        ));
    }

    #[test]
    fn export_url_takes_first_file() {
        let job = job_from_json(serde_json::json!({
            "data": {
                "id": "j1",
                "status": "finished",
                "tasks": [{
                    "operation": "export/url",
                    "result": { "files": [
                        { "url": "https://dl.example/out.pdf" },
                        { "url": "https://dl.example/other.pdf" }
                    ]}
                }]
            }
        }));
        assert_eq!(export_url(&job).unwrap(), "https://dl.example/out.pdf");
    }

    #[test]
    fn errored_job_detail_prefers_task_message() {
        let job = job_from_json(serde_json::json!({
            "data": {
                "id": "j1",
                "status": "error",
                "tasks": [
                    { "operation": "import/upload" },
                    { "operation": "convert", "message": "input file is corrupt" }
                ]
            }
        }));
        assert_eq!(job_error_detail(&job), "input file is corrupt");
    }

    #[test]
    fn job_state_display_names() {
        assert_eq!(JobState::Polling.to_string(), "polling");
        assert_eq!(JobState::TimedOut.to_string(), "timed_out");
    }
}
