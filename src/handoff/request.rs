use crate::staging::{CampaignBundle, Origin};
use crate::validation::*;

/// Raw inputs of one handoff as the routing layer received them.
#[derive(Debug, Clone, Default)]
pub struct HandoffRequest {
    pub client_id: Option<String>,
    /// Forwarded-for style address list; the first entry is the requester.
    pub origin: Option<String>,
    /// Upstream-encrypted identifier header, if the carrier injected one.
    pub legacy_identifier: Option<String>,
    pub variant: Option<String>,
    pub partner_ref: Option<String>,
    pub campaign: Option<String>,
}

impl HandoffRequest {
    pub fn new<S>(client_id: S) -> HandoffRequest where S: Into<String> {
        HandoffRequest {
            client_id: Some(client_id.into()),
            ..Default::default()
        }
    }

    pub fn with_origin<S>(mut self, origin: S) -> HandoffRequest where S: Into<String> {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_legacy_identifier<S>(mut self, legacy_identifier: S) -> HandoffRequest where S: Into<String> {
        self.legacy_identifier = Some(legacy_identifier.into());
        self
    }

    pub fn with_campaign<S>(mut self, variant: S, partner_ref: S, campaign: S) -> HandoffRequest where S: Into<String> {
        self.variant = Some(variant.into());
        self.partner_ref = Some(partner_ref.into());
        self.campaign = Some(campaign.into());
        self
    }

    pub(crate) fn validate(&self) -> ValidationResult<ValidatedRequest> {
        let client_id = validate_client_id(self.client_id.as_deref())?;
        let campaign = validate_campaign(
            self.variant.as_deref(),
            self.partner_ref.as_deref(),
            self.campaign.as_deref(),
        )?;
        // a header we cannot even parse is handled like one that does not decode
        let legacy_identifier = match self.legacy_identifier.as_deref() {
            Some(value) if !value.trim().is_empty() => Some(validate_legacy_identifier(value)),
            _ => None,
        };
        Ok(ValidatedRequest {
            client_id,
            origin: validate_origin(self.origin.as_deref()),
            legacy_identifier,
            campaign,
        })
    }
}

pub(crate) struct ValidatedRequest {
    pub client_id: ClientId,
    pub origin: Origin,
    pub legacy_identifier: Option<ValidationResult<String>>,
    pub campaign: Option<CampaignBundle>,
}
