//! Clinician profile, stored as a single value under `profile`

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{RecordStore, StoreError};

pub const PROFILE_KEY: &str = "profile";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub specialty: String,
    pub license: String,
    pub phone: String,
    pub hospital: String,
    pub department: String,
    pub bio: String,
    pub notifications_email: bool,
    pub notifications_app: bool,
    pub notifications_text: bool,
}

/// Partial edit; `None` leaves the field as it is
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub license: Option<String>,
    pub phone: Option<String>,
    pub hospital: Option<String>,
    pub department: Option<String>,
    pub bio: Option<String>,
    pub notifications_email: Option<bool>,
    pub notifications_app: Option<bool>,
    pub notifications_text: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.specialty.is_none()
            && self.license.is_none()
            && self.phone.is_none()
            && self.hospital.is_none()
            && self.department.is_none()
            && self.bio.is_none()
            && self.notifications_email.is_none()
            && self.notifications_app.is_none()
            && self.notifications_text.is_none()
    }

    pub fn apply(self, profile: &mut Profile) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }
        set(&mut profile.name, self.name);
        set(&mut profile.email, self.email);
        set(&mut profile.specialty, self.specialty);
        set(&mut profile.license, self.license);
        set(&mut profile.phone, self.phone);
        set(&mut profile.hospital, self.hospital);
        set(&mut profile.department, self.department);
        set(&mut profile.bio, self.bio);
        set(&mut profile.notifications_email, self.notifications_email);
        set(&mut profile.notifications_app, self.notifications_app);
        set(&mut profile.notifications_text, self.notifications_text);
    }
}

impl Profile {
    /// Absent or malformed profiles read as the empty default
    pub fn load(store: &RecordStore) -> Self {
        store.read_value(PROFILE_KEY)
    }

    pub fn save(&self, store: &RecordStore) -> Result<(), StoreError> {
        store.write_value(PROFILE_KEY, self)?;
        info!("Profile updated");
        Ok(())
    }
}
