//! Partner applications, approvals and the customer list.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::data::{DataClient, Filter, Select, Table};
use crate::domain::aggregates::{PartnerStatus, Profile, Registration};
use crate::domain::events::{DomainEvent, PartnerEvent};
use crate::publisher::EventPublisher;
use crate::{Result, StorefrontError};

#[derive(Serialize)]
struct StatusPatch {
    status: PartnerStatus,
}

#[derive(Clone)]
pub struct Partners {
    data: DataClient,
    events: EventPublisher,
}

impl Partners {
    pub fn new(data: DataClient, events: EventPublisher) -> Self { Self { data, events } }

    /// Files an application for an already-authenticated user. The profile
    /// starts out pending.
    pub async fn register(&self, user_id: Uuid, form: &Registration) -> Result<Profile> {
        form.validate()?;
        let profile: Profile = self.data.insert_one(Table::Profiles, &form.profile_row(user_id)).await?;
        info!(%user_id, company = %profile.company_name, "partner application received");
        self.events.publish(DomainEvent::Partner(PartnerEvent::Registered { user_id })).await;
        Ok(profile)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        self.data.select_one(&Select::from(Table::Profiles).eq("id", user_id)).await?.ok_or(StorefrontError::NotFound("profile"))
    }

    /// Approved, non-admin partners, newest first.
    pub async fn customers(&self) -> Result<Vec<Profile>> {
        let query = Select::from(Table::Profiles).eq("status", PartnerStatus::Approved).eq("is_admin", false).order_by_desc("created_at");
        Ok(self.data.select(&query).await?)
    }

    pub async fn pending(&self) -> Result<Vec<Profile>> {
        Ok(self.data.select(&Select::from(Table::Profiles).eq("status", PartnerStatus::Pending).order_by_desc("created_at")).await?)
    }

    pub async fn set_status(&self, user_id: Uuid, status: PartnerStatus) -> Result<()> {
        let updated = self.data.update(Table::Profiles, &[Filter::eq("id", user_id)], &StatusPatch { status }).await?;
        if updated == 0 { return Err(StorefrontError::NotFound("profile")); }
        info!(%user_id, ?status, "partner reviewed");
        self.events.publish(DomainEvent::Partner(PartnerEvent::Reviewed { user_id, status })).await;
        Ok(())
    }
}

/// Admin queue of applications awaiting review. The local list only changes
/// after the backend accepted the decision.
pub struct PendingApprovals {
    partners: Partners,
    pending: Vec<Profile>,
}

impl PendingApprovals {
    pub fn new(partners: Partners) -> Self { Self { partners, pending: Vec::new() } }

    pub fn pending(&self) -> &[Profile] { &self.pending }

    pub async fn refresh(&mut self) -> Result<&[Profile]> {
        self.pending = self.partners.pending().await?;
        Ok(&self.pending)
    }

    pub async fn decide(&mut self, user_id: Uuid, approve: bool) -> Result<()> {
        let status = if approve { PartnerStatus::Approved } else { PartnerStatus::Rejected };
        self.partners.set_status(user_id, status).await?;
        self.pending.retain(|p| p.id != user_id);
        Ok(())
    }
}
