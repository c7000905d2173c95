//! Patient registration and browsing.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::ids::generate_id;
use crate::models::{Patient, PatientStatus};
use crate::store::{RecordStore, StoreError};

pub const PATIENT_ID_PREFIX: &str = "P";
const PATIENT_ID_DIGITS: u32 = 5;

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Date of birth {0} is in the future")]
    BirthDateInFuture(NaiveDate),
    #[error("Patient consent for data processing is required")]
    ConsentRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// New-patient form
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub condition: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub upcoming_appointment: Option<NaiveDate>,
    pub consent: bool,
}

/// Whole years between `birth` and `today`.
///
/// One less than the plain year difference when today's month/day comes
/// before the birthday.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    if today < birth {
        return 0;
    }
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

impl NewPatient {
    pub fn validate(&self, today: NaiveDate) -> Result<NaiveDate, PatientError> {
        if self.first_name.trim().is_empty() {
            return Err(PatientError::MissingField("First name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(PatientError::MissingField("Last name"));
        }
        let dob = self
            .date_of_birth
            .ok_or(PatientError::MissingField("Date of birth"))?;
        if dob > today {
            return Err(PatientError::BirthDateInFuture(dob));
        }
        if !self.consent {
            return Err(PatientError::ConsentRequired);
        }
        Ok(dob)
    }

    fn into_patient(self, id: String, dob: NaiveDate, today: NaiveDate) -> Patient {
        Patient {
            id,
            name: format!("{} {}", self.first_name.trim(), self.last_name.trim()),
            age: age_on(dob, today),
            gender: self.gender.trim().to_string(),
            condition: self.condition.trim().to_string(),
            status: PatientStatus::Active,
            last_visit: today,
            upcoming_appointment: self.upcoming_appointment,
            phone: non_empty(self.phone),
            email: non_empty(self.email),
            address: non_empty(self.address),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate the form and append the new patient
pub fn register_patient(
    store: &RecordStore,
    form: NewPatient,
    today: NaiveDate,
) -> Result<Patient, PatientError> {
    let dob = form.validate(today)?;

    let existing = store.ids::<Patient>();
    let id = generate_id(PATIENT_ID_PREFIX, PATIENT_ID_DIGITS, |candidate| {
        existing.iter().any(|taken| taken == candidate)
    });

    let patient = form.into_patient(id, dob, today);
    store.append(patient.clone())?;
    info!(patient_id = %patient.id, age = patient.age, "Patient registered");
    Ok(patient)
}

/// Search box plus status dropdown
#[derive(Debug, Clone, Default)]
pub struct PatientFilter {
    pub query: String,
    /// None means "all"
    pub status: Option<PatientStatus>,
}

impl PatientFilter {
    pub fn matches(&self, patient: &Patient) -> bool {
        let query = self.query.trim().to_lowercase();
        let matches_search = query.is_empty()
            || patient.name.to_lowercase().contains(&query)
            || patient.id.to_lowercase().contains(&query)
            || patient.condition.to_lowercase().contains(&query);
        let matches_status = self.status.map_or(true, |s| patient.status == s);
        matches_search && matches_status
    }

    pub fn apply<'a>(&self, patients: &'a [Patient]) -> Vec<&'a Patient> {
        patients.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Patients with a scheduled appointment, soonest first
pub fn upcoming_appointments(patients: &[Patient]) -> Vec<&Patient> {
    let mut upcoming: Vec<&Patient> = patients
        .iter()
        .filter(|p| p.upcoming_appointment.is_some())
        .collect();
    upcoming.sort_by_key(|p| p.upcoming_appointment);
    upcoming
}

/// Most recent visits, newest first
pub fn recent_visits(patients: &[Patient], limit: usize) -> Vec<&Patient> {
    let mut recent: Vec<&Patient> = patients.iter().collect();
    recent.sort_by(|a, b| b.last_visit.cmp(&a.last_visit));
    recent.truncate(limit);
    recent
}

pub fn status_counts(patients: &[Patient]) -> HashMap<PatientStatus, usize> {
    let mut counts: HashMap<PatientStatus, usize> =
        PatientStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for patient in patients {
        *counts.entry(patient.status).or_insert(0) += 1;
    }
    counts
}
