use std::fmt::{Debug, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

use crate::misc::mask_identifier;

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierStatus {
    Recovered,
    Rejected,
}

/// Identifier staged for the consuming application: the recovered value, its
/// envelope under the service key, and how it was obtained.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IdentifierBundle {
    pub decrypted: Option<String>,
    pub encrypted: Option<String>,
    pub status: IdentifierStatus,
}

impl IdentifierBundle {
    pub fn recovered<D, E>(decrypted: D, encrypted: Option<E>) -> IdentifierBundle where D: Into<String>, E: Into<String> {
        IdentifierBundle {
            decrypted: Some(decrypted.into()),
            encrypted: encrypted.map(Into::into),
            status: IdentifierStatus::Recovered,
        }
    }

    pub fn rejected() -> IdentifierBundle {
        IdentifierBundle {
            decrypted: None,
            encrypted: None,
            status: IdentifierStatus::Rejected,
        }
    }
}

impl Debug for IdentifierBundle {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        let decrypted = self.decrypted.as_deref().map(mask_identifier);
        write!(f, "IdentifierBundle({:?}, {:?})", decrypted, self.status)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CampaignBundle {
    pub variant: String,
    pub partner_id: String,
    pub campaign_name: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn wire_format() {
        let bundle = IdentifierBundle::recovered("923086094856", Some("sealed~~"));
        assert_eq!(serde_json::to_value(&bundle).unwrap(), json!({
            "decrypted": "923086094856",
            "encrypted": "sealed~~",
            "status": "recovered",
        }));
        assert_eq!(serde_json::to_value(IdentifierBundle::rejected()).unwrap(), json!({
            "decrypted": null,
            "encrypted": null,
            "status": "rejected",
        }));

        let campaign: CampaignBundle = serde_json::from_value(json!({
            "variant": "b",
            "partnerId": "partner_1",
            "campaignName": "spring-sale",
        })).unwrap();
        assert_eq!(campaign.partner_id, "partner_1");
    }

    #[test]
    fn debug_masks_identifier() {
        let bundle = IdentifierBundle::recovered("923086094856", None::<String>);
        let debug = format!("{:?}", bundle);
        assert!(!debug.contains("923086094856"), "{}", debug);
        assert!(debug.contains("92308*****56"), "{}", debug);
    }
}
