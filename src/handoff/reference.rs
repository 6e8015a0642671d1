use std::fmt::{Debug, Formatter, Result as FormatResult};

use serde::Serialize;

use crate::misc::mask_identifier;

pub const PARAM_CLIENT_ID: &str = "clientId";
pub const PARAM_IDENTIFIER: &str = "msisdn";
pub const PARAM_FLAG: &str = "originateFromLanding";
pub const PARAM_STAGED_IDENTIFIER: &str = "redisKey";
pub const PARAM_CAMPAIGN: &str = "campaignDataKey";

/// Tokens the routing layer places in the redirect to the consuming application.
///
/// Only values produced by this service appear here: envelopes under the
/// service key and keys of staged records.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutboundReference {
    pub base_url: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_identifier: Option<String>,
    pub encrypted_flag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_identifier_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_key: Option<String>,
}

impl OutboundReference {
    /// Query parameters in the order the consuming application expects them.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![(PARAM_CLIENT_ID, self.client_id.as_str())];
        if let Some(encrypted_identifier) = &self.encrypted_identifier {
            pairs.push((PARAM_IDENTIFIER, encrypted_identifier.as_str()));
        }
        pairs.push((PARAM_FLAG, self.encrypted_flag.as_str()));
        if let Some(staged_identifier_key) = &self.staged_identifier_key {
            pairs.push((PARAM_STAGED_IDENTIFIER, staged_identifier_key.as_str()));
        }
        if let Some(campaign_key) = &self.campaign_key {
            pairs.push((PARAM_CAMPAIGN, campaign_key.as_str()));
        }
        pairs
    }
}

/// What the consuming application recovers from a payload it was handed.
#[derive(Clone, PartialEq, Eq)]
pub struct Redemption {
    pub identifier: Option<String>,
    pub originated_from_flow: bool,
}

impl Debug for Redemption {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.debug_struct("Redemption")
            .field("identifier", &self.identifier.as_deref().map(mask_identifier))
            .field("originated_from_flow", &self.originated_from_flow)
            .finish()
    }
}
