//! FalClient - handles communication with the fal.ai queue API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use super::request::VideoRequest;
use super::retry::{is_transient_network_error, is_transient_status, parse_retry_after, RetryPolicy};

/// The environment variable name for the fal.ai API key.
pub const FAL_API_KEY_ENV: &str = "FAL_API_KEY";

/// Default base URL for the fal.ai queue API.
pub const FAL_API_BASE_URL: &str = "https://queue.fal.run";

/// Default text-to-video model.
pub const DEFAULT_MODEL: &str = "fal-ai/veo3.1/fast";

/// Default model used when reference images are supplied.
pub const DEFAULT_REFERENCE_MODEL: &str = "fal-ai/veo3.1/reference-to-video";

/// Timeout for queue API calls (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for streaming a finished clip to disk (5 minutes).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Default upper bound on waiting for one generation job (10 minutes).
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Default polling interval for status checks (5 seconds).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
const HTTP_STATUS_BAD_REQUEST: u16 = 400;
const HTTP_STATUS_FORBIDDEN: u16 = 403;

/// Keywords that indicate a content policy violation in error messages.
const CONTENT_POLICY_KEYWORDS: &[&str] = &[
    "content policy",
    "policy violation",
    "inappropriate",
    "not allowed",
    "prohibited",
    "blocked",
    "unsafe",
    "violates",
    "moderation",
    "nsfw",
];

fn is_content_policy_error(error_text: &str) -> bool {
    let lower = error_text.to_lowercase();
    CONTENT_POLICY_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// Reject empty or whitespace-only prompts before they reach the API.
pub fn validate_prompt(prompt: &str) -> Result<(), FalError> {
    if prompt.trim().is_empty() {
        return Err(FalError::EmptyPrompt);
    }
    Ok(())
}

/// Response from queue submission.
#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    /// The unique request ID for polling.
    pub request_id: String,
    #[serde(default)]
    pub status_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    /// Where the finished result document lives.
    #[serde(default)]
    response_url: Option<String>,
    /// Some endpoints inline the output in the status document.
    #[serde(default)]
    video: Option<VideoOutput>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    #[serde(default)]
    video: Option<VideoOutput>,
}

#[derive(Debug, Deserialize)]
struct VideoOutput {
    url: String,
}

/// Status of a queued generation job.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStatus {
    /// Request is queued for processing.
    Pending,
    /// Video is being generated.
    InProgress,
    /// Generation completed successfully.
    Completed { video_url: String },
    /// Generation failed with an error.
    Failed { error: String },
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Client for communicating with the fal.ai queue API.
pub struct FalClient {
    api_key: String,
    base_url: String,
    model: String,
    reference_model: String,
    poll_interval: Duration,
    generation_timeout: Duration,
    retry: RetryPolicy,
    http_client: reqwest::Client,
}

impl FalClient {
    /// Create a new FalClient by reading the API key from `FAL_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `FalError::MissingApiKey` if the variable is not set.
    pub fn new() -> Result<Self, FalError> {
        let api_key = std::env::var(FAL_API_KEY_ENV).map_err(|_| FalError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a new FalClient with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, FalError> {
        Self::with_base_url(api_key, FAL_API_BASE_URL.to_string())
    }

    /// Create a new FalClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, FalError> {
        if api_key.trim().is_empty() {
            return Err(FalError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            reference_model: DEFAULT_REFERENCE_MODEL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            retry: RetryPolicy::default(),
            http_client,
        })
    }

    /// Override the text-to-video and reference-to-video models.
    pub fn with_models(mut self, model: impl Into<String>, reference_model: impl Into<String>) -> Self {
        self.model = model.into();
        self.reference_model = reference_model.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn reference_model(&self) -> &str {
        &self.reference_model
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    /// The model endpoint a request is routed to.
    pub fn model_for(&self, request: &VideoRequest) -> &str {
        if request.has_references() {
            &self.reference_model
        } else {
            &self.model
        }
    }

    /// Submit a generation request to the queue.
    ///
    /// # Errors
    ///
    /// Returns `FalError::EmptyPrompt` if the prompt is empty,
    /// `FalError::ContentPolicyViolation` if the API rejects the prompt for content policy,
    /// `FalError::RateLimit` on 429, `FalError::ApiError` on other error responses,
    /// or `FalError::HttpError` if the request fails.
    pub async fn submit_generation(&self, request: &VideoRequest) -> Result<QueueResponse, FalError> {
        validate_prompt(&request.prompt)?;

        let url = format!("{}/{}", self.base_url, self.model_for(request));

        let response = self
            .http_client
            .post(&url)
            .timeout(DEFAULT_TIMEOUT)
            .header("Authorization", format!("Key {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::submission_error(response).await);
        }

        let queue_response: QueueResponse = response.json().await?;
        Ok(queue_response)
    }

    async fn submission_error(response: reqwest::Response) -> FalError {
        let status = response.status();

        if status.as_u16() == HTTP_STATUS_TOO_MANY_REQUESTS {
            let retry_after_secs = parse_retry_after(&response);
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Rate limit exceeded".to_string());
            log::warn!(
                "Rate limited by fal.ai API. Retry-After: {:?} seconds",
                retry_after_secs
            );
            return FalError::RateLimit {
                message,
                retry_after_secs,
            };
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if is_transient_status(status.as_u16()) {
            return FalError::ServiceUnavailable {
                status: status.as_u16(),
                message: error_text,
            };
        }

        if (status.as_u16() == HTTP_STATUS_BAD_REQUEST || status.as_u16() == HTTP_STATUS_FORBIDDEN)
            && is_content_policy_error(&error_text)
        {
            log::warn!("Prompt rejected by content policy: {}", error_text);
            return FalError::ContentPolicyViolation {
                message: error_text,
            };
        }

        FalError::ApiError(format!(
            "API request failed with status {}: {}",
            status, error_text
        ))
    }

    /// Submit with retries on transient network errors, gateway errors
    /// (502/503/504) and rate limits.
    ///
    /// Content policy and other API errors are returned immediately.
    pub async fn submit_generation_with_retry(
        &self,
        request: &VideoRequest,
    ) -> Result<QueueResponse, FalError> {
        let policy = self.retry;
        let mut network_attempt = 0u32;
        let mut rate_limit_attempt = 0u32;

        loop {
            let delay = match self.submit_generation(request).await {
                Ok(response) => return Ok(response),

                Err(e) if e.is_transient() => {
                    network_attempt += 1;
                    if network_attempt > policy.network_retries {
                        log::error!(
                            "Network error after {} attempts. Giving up. Error: {}",
                            network_attempt,
                            e
                        );
                        return Err(FalError::NetworkError {
                            message: e.to_string(),
                            attempts: network_attempt,
                        });
                    }
                    let delay = policy.backoff(network_attempt - 1);
                    log::warn!(
                        "Network error (attempt {}/{}): {}. Retrying in {:?}...",
                        network_attempt,
                        policy.network_retries + 1,
                        e,
                        delay
                    );
                    delay
                }

                Err(FalError::RateLimit {
                    message,
                    retry_after_secs,
                }) => {
                    rate_limit_attempt += 1;
                    if rate_limit_attempt > policy.rate_limit_retries {
                        log::error!(
                            "Rate limit exceeded after {} attempts. Giving up.",
                            rate_limit_attempt
                        );
                        return Err(FalError::RateLimit {
                            message,
                            retry_after_secs,
                        });
                    }
                    let delay = policy.rate_limit_delay(rate_limit_attempt - 1, retry_after_secs);
                    log::info!(
                        "Rate limited (attempt {}/{}). Retrying in {:?}...",
                        rate_limit_attempt,
                        policy.rate_limit_retries + 1,
                        delay
                    );
                    delay
                }

                Err(e) => return Err(e),
            };

            tokio::time::sleep(delay).await;
        }
    }

    /// Check the status of a queued job.
    ///
    /// A completed job without an inline video is resolved by fetching its
    /// result document from `response_url`.
    pub async fn poll_status(&self, model: &str, request_id: &str) -> Result<GenerationStatus, FalError> {
        let url = format!(
            "{}/{}/requests/{}/status",
            self.base_url, model, request_id
        );

        let response = self
            .http_client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .header("Authorization", format!("Key {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if is_transient_status(status.as_u16()) {
                return Err(FalError::ServiceUnavailable {
                    status: status.as_u16(),
                    message: error_text,
                });
            }
            return Err(FalError::ApiError(format!(
                "Status check failed with status {}: {}",
                status, error_text
            )));
        }

        let status_response: StatusResponse = response.json().await?;

        match status_response.status.to_uppercase().as_str() {
            "PENDING" | "IN_QUEUE" => Ok(GenerationStatus::Pending),
            "PROCESSING" | "IN_PROGRESS" => Ok(GenerationStatus::InProgress),
            "COMPLETED" | "OK" => {
                if let Some(video) = status_response.video {
                    Ok(GenerationStatus::Completed {
                        video_url: video.url,
                    })
                } else if let Some(response_url) = status_response.response_url {
                    let video_url = self.fetch_result(&response_url).await?;
                    Ok(GenerationStatus::Completed { video_url })
                } else {
                    Err(FalError::ApiError(
                        "Generation completed but no video URL in response".to_string(),
                    ))
                }
            }
            "FAILED" | "ERROR" => Ok(GenerationStatus::Failed {
                error: status_response
                    .error
                    .unwrap_or_else(|| "Unknown error occurred during generation".to_string()),
            }),
            unknown => Err(FalError::ApiError(format!(
                "Unknown generation status: {}",
                unknown
            ))),
        }
    }

    /// Fetch a finished job's result document and extract the clip URL.
    pub async fn fetch_result(&self, response_url: &str) -> Result<String, FalError> {
        let response = self
            .http_client
            .get(response_url)
            .timeout(DEFAULT_TIMEOUT)
            .header("Authorization", format!("Key {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FalError::ApiError(format!(
                "Result fetch failed with status {}: {}",
                status, error_text
            )));
        }

        let result: ResultResponse = response.json().await?;
        result
            .video
            .map(|v| v.url)
            .ok_or_else(|| FalError::ApiError("Result document has no video".to_string()))
    }

    /// Poll a job at a fixed interval until it reaches a terminal state.
    ///
    /// Transient status check failures are treated as still pending.
    ///
    /// # Errors
    ///
    /// Returns `FalError::Timeout` once the generation timeout elapses, or
    /// `FalError::GenerationFailed` if the job itself failed.
    pub async fn wait_for_completion(&self, model: &str, request_id: &str) -> Result<String, FalError> {
        let started = tokio::time::Instant::now();
        let mut last_status = None;

        loop {
            if started.elapsed() > self.generation_timeout {
                log::error!(
                    "Generation {} timed out after {:?}",
                    request_id,
                    self.generation_timeout
                );
                return Err(FalError::Timeout);
            }

            let status = match self.poll_status(model, request_id).await {
                Ok(status) => status,
                Err(e) if e.is_transient() => {
                    log::warn!("Status check for {} failed, still waiting: {}", request_id, e);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if last_status.as_ref() != Some(&status) {
                log::debug!("Request {}: {:?}", request_id, status);
            }

            match &status {
                GenerationStatus::Completed { video_url } => return Ok(video_url.clone()),
                GenerationStatus::Failed { error } => {
                    log::error!("Generation {} failed: {}", request_id, error);
                    return Err(FalError::GenerationFailed(error.clone()));
                }
                GenerationStatus::Pending | GenerationStatus::InProgress => {}
            }

            last_status = Some(status);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Stream a video file from a URL to disk.
    ///
    /// Parent directories of `dest` are created if missing.
    pub async fn download_video(&self, url: &str, dest: &Path) -> Result<PathBuf, FalError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .http_client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FalError::ApiError(format!(
                "Video download failed with status {}: {}",
                status, error_text
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(dest.to_path_buf())
    }

    /// Submit, wait for, and download one clip to `dest`.
    pub async fn generate_to_file(&self, request: &VideoRequest, dest: &Path) -> Result<PathBuf, FalError> {
        let model = self.model_for(request);

        let queue_response = self.submit_generation_with_retry(request).await?;
        let request_id = &queue_response.request_id;
        log::info!("Generation submitted to {}, request_id: {}", model, request_id);

        let video_url = self.wait_for_completion(model, request_id).await?;

        log::debug!("Downloading {} to {}", video_url, dest.display());
        self.download_video(&video_url, dest).await
    }
}

/// Errors that can occur during fal.ai operations.
#[derive(Debug, thiserror::Error)]
pub enum FalError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Network error: {message} (after {attempts} attempts)")]
    NetworkError { message: String, attempts: u32 },

    #[error("Content policy violation: {message}")]
    ContentPolicyViolation { message: String },

    #[error("Empty prompt")]
    EmptyPrompt,
}

impl FalError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FalError::HttpError(e) => is_transient_network_error(e),
            FalError::ServiceUnavailable { .. } => true,
            _ => false,
        }
    }
}
