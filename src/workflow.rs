//! Submission workflow: run an analysis and record the outcome.
//!
//! On success one [`Analysis`] and one [`Notification`] are appended to the
//! record store, each with its own read-modify-write. On failure nothing is
//! written. Once the analysis is saved the call succeeds; a failed
//! notification write is only logged.

use chrono::Utc;
use tracing::{info, warn};

use crate::ids::generate_id;
use crate::models::{Analysis, AnalysisStatus, Notification};
use crate::store::RecordStore;
use crate::submitter::{AnalysisError, Submission, Submitter};

pub const ANALYSIS_ID_PREFIX: &str = "A";
pub const NOTIFICATION_ID_PREFIX: &str = "N";
const ID_DIGITS: u32 = 6;

/// Submit, then persist the analysis record and its notification
pub async fn run_analysis(
    store: &RecordStore,
    submitter: &Submitter,
    submission: &mut Submission,
) -> Result<Analysis, AnalysisError> {
    let outcome = submitter.submit(submission).await?;

    if !outcome.excluded_files.is_empty() {
        warn!(
            files = ?outcome.excluded_files,
            "Non-image attachments were not sent for analysis"
        );
    }

    let analyses = store.ids::<Analysis>();
    let analysis = Analysis {
        id: generate_id(ANALYSIS_ID_PREFIX, ID_DIGITS, |candidate| {
            analyses.iter().any(|taken| taken == candidate)
        }),
        patient_id: submission.patient_id.clone(),
        created_at: Utc::now(),
        image_type: submission.image_type,
        notes: submission.notes.clone(),
        status: AnalysisStatus::Completed,
        result: outcome.result,
    };
    store.append(analysis.clone())?;

    let notifications = store.ids::<Notification>();
    let notification = Notification {
        id: generate_id(NOTIFICATION_ID_PREFIX, ID_DIGITS, |candidate| {
            notifications.iter().any(|taken| taken == candidate)
        }),
        title: "Analysis completed".to_string(),
        message: format!(
            "Diagnostic analysis for patient {} is ready.",
            analysis.patient_id
        ),
        timestamp: analysis.created_at,
        read: false,
    };
    if let Err(e) = store.append(notification) {
        warn!(analysis_id = %analysis.id, "Analysis saved but notification was not: {}", e);
    }

    info!(
        analysis_id = %analysis.id,
        patient_id = %analysis.patient_id,
        simulated = analysis.result.is_simulated(),
        "Analysis recorded"
    );
    Ok(analysis)
}

/// Analyses for one patient, newest first
pub fn analyses_for_patient(store: &RecordStore, patient_id: &str) -> Vec<Analysis> {
    let mut analyses: Vec<Analysis> = store
        .read_list::<Analysis>()
        .into_iter()
        .filter(|a| a.patient_id == patient_id)
        .collect();
    analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    analyses
}

pub fn find_analysis(store: &RecordStore, id: &str) -> Option<Analysis> {
    store.read_list::<Analysis>().into_iter().find(|a| a.id == id)
}
