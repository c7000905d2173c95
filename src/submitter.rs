//! Analysis submitter.
//!
//! Each [`Submission`] walks one state machine:
//!
//! ```text
//! Idle -> BuildingRequest -> AwaitingResponse -> Succeeded
//!     \            \                \
//!      +------------+----------------+--> Failed
//! ```
//!
//! There is no retry transition. A failed submission stays failed until the
//! caller resets it and submits again.
//!
//! Which backend answers is decided once, from the credential, when the
//! [`Submitter`] is built: a live Gemini call or the simulated canned result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, GenerationConfig};
use crate::credential::Credential;
use crate::gemini_client::{GeminiClient, GeminiError};
use crate::models::{AnalysisResult, ImageModality, SimulatedFindings};
use crate::request::{build_request, AnalysisRequest, TranscodeError, UploadedFile};
use crate::store::StoreError;

/// Input problems caught before anything is sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Patient ID required: please enter a patient ID to continue")]
    MissingPatientId,
    #[error("No files selected: please upload at least one medical image or document")]
    NoFiles,
}

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("Analysis request failed: {0}")]
    Transport(GeminiError),

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("Failed to save analysis: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SubmissionState,
        to: SubmissionState,
    },
}

impl From<GeminiError> for AnalysisError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Parse(_) | GeminiError::EmptyResponse => {
                AnalysisError::MalformedResponse(err.to_string())
            }
            other => AnalysisError::Transport(other),
        }
    }
}

/// Submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    BuildingRequest,
    AwaitingResponse,
    Succeeded,
    Failed,
}

impl SubmissionState {
    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Idle, BuildingRequest)
                | (Idle, Failed)
                | (BuildingRequest, AwaitingResponse)
                | (BuildingRequest, Failed)
                | (AwaitingResponse, Succeeded)
                | (AwaitingResponse, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Succeeded | SubmissionState::Failed)
    }
}

/// One analysis attempt: the form input plus where it is in the lifecycle
#[derive(Debug, Clone)]
pub struct Submission {
    pub patient_id: String,
    pub notes: String,
    pub image_type: ImageModality,
    pub files: Vec<UploadedFile>,
    state: SubmissionState,
}

impl Submission {
    pub fn new(
        patient_id: &str,
        notes: &str,
        image_type: ImageModality,
        files: Vec<UploadedFile>,
    ) -> Self {
        Self {
            patient_id: patient_id.trim().to_string(),
            notes: notes.to_string(),
            image_type,
            files,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Return a finished submission to `Idle` so it can be sent again
    pub fn reset(&mut self) {
        self.state = SubmissionState::Idle;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.files.is_empty() {
            return Err(ValidationError::NoFiles);
        }
        if self.patient_id.trim().is_empty() {
            return Err(ValidationError::MissingPatientId);
        }
        Ok(())
    }

    fn advance(&mut self, next: SubmissionState) -> Result<(), AnalysisError> {
        if !self.state.can_transition_to(next) {
            return Err(AnalysisError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "Submission state change");
        self.state = next;
        Ok(())
    }
}

/// Result of a successful submission
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub image_count: usize,
    pub excluded_files: Vec<String>,
}

/// Something that can answer an analysis request
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

#[async_trait]
impl AnalysisBackend for GeminiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let text = self.generate_content(&request.payload).await?;
        Ok(AnalysisResult::Generated { text })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Used when no credential is configured: waits, then returns canned findings
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    delay: Duration,
}

impl SimulatedBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AnalysisBackend for SimulatedBackend {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        info!(delay_ms = self.delay.as_millis() as u64, "Simulated analysis (API key not provided)");
        tokio::time::sleep(self.delay).await;
        Ok(AnalysisResult::Simulated(SimulatedFindings::canned()))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

/// Live or simulated, chosen once from the credential
#[derive(Debug, Clone)]
pub enum AnalysisMode {
    Live(GeminiClient),
    Simulated(SimulatedBackend),
}

impl AnalysisMode {
    pub fn select(credential: &Credential, config: &Config) -> Result<Self, GeminiError> {
        match credential {
            Credential::Configured(api_key) => {
                let client = GeminiClient::with_endpoint(
                    api_key,
                    &config.endpoint,
                    &config.model,
                    config.request_timeout_secs.map(Duration::from_secs),
                )?;
                Ok(AnalysisMode::Live(client))
            }
            Credential::Unconfigured => Ok(AnalysisMode::Simulated(SimulatedBackend::new(
                Duration::from_millis(config.simulated_delay_ms),
            ))),
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, AnalysisMode::Simulated(_))
    }

    fn into_backend(self) -> Arc<dyn AnalysisBackend> {
        match self {
            AnalysisMode::Live(client) => Arc::new(client),
            AnalysisMode::Simulated(backend) => Arc::new(backend),
        }
    }
}

/// Builds requests and hands them to the selected backend
#[derive(Clone)]
pub struct Submitter {
    backend: Arc<dyn AnalysisBackend>,
    generation: GenerationConfig,
}

impl Submitter {
    pub fn new(backend: Arc<dyn AnalysisBackend>, generation: GenerationConfig) -> Self {
        Self {
            backend,
            generation,
        }
    }

    pub fn from_mode(mode: AnalysisMode, generation: GenerationConfig) -> Self {
        Self::new(mode.into_backend(), generation)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one submission to a terminal state.
    ///
    /// Validation happens before the request is built; a submission with no
    /// files or no patient id never reaches the backend.
    pub async fn submit(
        &self,
        submission: &mut Submission,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let result = self.run(submission).await;
        if result.is_err() && !submission.state.is_terminal() {
            submission.state = SubmissionState::Failed;
        }
        if let Err(ref e) = result {
            warn!(patient_id = %submission.patient_id, backend = self.backend.name(), "Analysis failed: {}", e);
        }
        result
    }

    async fn run(&self, submission: &mut Submission) -> Result<AnalysisOutcome, AnalysisError> {
        if submission.state != SubmissionState::Idle {
            return Err(AnalysisError::InvalidTransition {
                from: submission.state,
                to: SubmissionState::BuildingRequest,
            });
        }
        submission.validate()?;

        submission.advance(SubmissionState::BuildingRequest)?;
        let request = build_request(
            &submission.files,
            &submission.notes,
            &submission.patient_id,
            &self.generation,
        )?;

        info!(
            patient_id = %submission.patient_id,
            images = request.image_count,
            excluded = request.excluded_files.len(),
            backend = self.backend.name(),
            "Submitting analysis"
        );

        submission.advance(SubmissionState::AwaitingResponse)?;
        let result = self.backend.analyze(&request).await?;

        submission.advance(SubmissionState::Succeeded)?;
        info!(patient_id = %submission.patient_id, "{}", AnalysisResult::SUCCESS_MESSAGE);

        Ok(AnalysisOutcome {
            result,
            image_count: request.image_count,
            excluded_files: request.excluded_files,
        })
    }
}
