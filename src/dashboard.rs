//! Dashboard summary over the record store

use serde::Serialize;

use crate::models::{Analysis, AnalysisStatus, Notification, Patient, SavedCase};
use crate::store::RecordStore;

const RECENT_ANALYSES: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_patients: usize,
    pub pending_analyses: usize,
    pub completed_analyses: usize,
    pub unread_notifications: usize,
    pub saved_cases: usize,
    /// Newest first
    pub recent_analyses: Vec<Analysis>,
}

impl DashboardSummary {
    pub fn load(store: &RecordStore) -> Self {
        let patients = store.read_list::<Patient>();
        let mut analyses = store.read_list::<Analysis>();
        let notifications = store.read_list::<Notification>();
        let saved_cases = store.read_list::<SavedCase>();

        let pending_analyses = analyses
            .iter()
            .filter(|a| a.status == AnalysisStatus::Pending)
            .count();
        let completed_analyses = analyses.len() - pending_analyses;

        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        analyses.truncate(RECENT_ANALYSES);

        Self {
            total_patients: patients.len(),
            pending_analyses,
            completed_analyses,
            unread_notifications: notifications.iter().filter(|n| !n.read).count(),
            saved_cases: saved_cases.len(),
            recent_analyses: analyses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, ImageModality, SimulatedFindings};
    use chrono::{Duration, Utc};

    fn analysis(id: &str, status: AnalysisStatus, minutes_ago: i64) -> Analysis {
        Analysis {
            id: id.to_string(),
            patient_id: "P-1".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            image_type: ImageModality::Xray,
            notes: String::new(),
            status,
            result: AnalysisResult::Simulated(SimulatedFindings::canned()),
        }
    }

    #[test]
    fn test_empty_store() {
        let summary = DashboardSummary::load(&RecordStore::in_memory());
        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.pending_analyses, 0);
        assert_eq!(summary.saved_cases, 0);
        assert!(summary.recent_analyses.is_empty());
    }

    #[test]
    fn test_counts_and_recent_order() {
        let store = RecordStore::in_memory();
        let mut analyses: Vec<Analysis> = (0..7)
            .map(|i| analysis(&format!("A-{}", i), AnalysisStatus::Completed, i * 10))
            .collect();
        analyses.push(analysis("A-pending", AnalysisStatus::Pending, 1000));
        store.write_list(&analyses).unwrap();

        store
            .write_list(&[
                Notification {
                    id: "N-1".to_string(),
                    title: "t".to_string(),
                    message: "m".to_string(),
                    timestamp: Utc::now(),
                    read: false,
                },
                Notification {
                    id: "N-2".to_string(),
                    title: "t".to_string(),
                    message: "m".to_string(),
                    timestamp: Utc::now(),
                    read: true,
                },
            ])
            .unwrap();

        store
            .write_list(&[SavedCase {
                id: "C-1".to_string(),
                patient_id: "P-1".to_string(),
                diagnosis: "Lobar Pneumonia".to_string(),
            }])
            .unwrap();

        let summary = DashboardSummary::load(&store);
        assert_eq!(summary.pending_analyses, 1);
        assert_eq!(summary.completed_analyses, 7);
        assert_eq!(summary.unread_notifications, 1);
        assert_eq!(summary.saved_cases, 1);

        let recent: Vec<&str> = summary.recent_analyses.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(recent, vec!["A-0", "A-1", "A-2", "A-3", "A-4"]);
    }
}
