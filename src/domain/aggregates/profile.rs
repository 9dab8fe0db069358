//! Partner profile aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub company_name: String,
    pub contact_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub status: PartnerStatus,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Only approved partners may place orders.
    pub fn can_order(&self) -> bool { self.status == PartnerStatus::Approved }
}

/// Partner application form.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match = "password")]
    pub confirm_password: String,
    #[validate(length(min = 1, message = "Company name is required"))]
    pub company_name: String,
    #[validate(length(min = 1, message = "Contact name is required"))]
    pub contact_name: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[serde(default)]
    pub tax_id: Option<String>,
}

/// Row written to `profiles` for a new application. Status is left to the
/// backend default (`pending`).
#[derive(Clone, Debug, Serialize)]
pub struct NewProfile<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub company_name: &'a str,
    pub contact_name: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub zip: &'a str,
    pub country: &'a str,
    pub tax_id: Option<&'a str>,
}

impl Registration {
    pub fn profile_row(&self, user_id: Uuid) -> NewProfile<'_> {
        NewProfile {
            id: user_id, email: self.email.trim(), company_name: &self.company_name,
            contact_name: &self.contact_name, phone: &self.phone, address: &self.address,
            city: &self.city, state: &self.state, zip: &self.zip, country: &self.country,
            tax_id: self.tax_id.as_deref().filter(|t| !t.is_empty()),
        }
    }
}
