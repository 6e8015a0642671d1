use std::sync::Arc;

use serde_json::Value;

use crate::ciphers::errors::SealError;
use crate::config::{Config, DEFAULT_IDENTIFIER_TTL_SECONDS, DEFAULT_CAMPAIGN_TTL_SECONDS};
use crate::error::{ConfigurationError, CryptoError, HandoffError};
use crate::misc::mask_identifier;
use crate::secrets::SecretManager;
use crate::staging::{EphemeralStore, IdentifierBundle, CampaignBundle, Origin, StagingKey};
use crate::upstream::{IdentifierSource, HttpIdentifierSource};
use crate::validation::{ClientId, validate_encrypted_payload, validate_identifier_value};

mod outcome;
mod reference;
mod request;

pub use outcome::{Step, StepOutcome};
pub use reference::*;
pub use request::HandoffRequest;

use request::ValidatedRequest;

// plaintext of the flag telling the consuming application the user came through this flow
pub const FLOW_FLAG: &str = "true";

/// Everything a handoff needs, built once at startup and shared by all requests.
pub struct HandoffContext {
    secrets: Arc<SecretManager>,
    store: EphemeralStore,
    source: Option<Box<dyn IdentifierSource>>,
    app_url: String,
    identifier_ttl_seconds: u64,
    campaign_ttl_seconds: u64,
}

impl HandoffContext {
    pub fn new<S>(secrets: Arc<SecretManager>, store: EphemeralStore, app_url: S) -> HandoffContext where S: Into<String> {
        HandoffContext {
            secrets,
            store,
            source: None,
            app_url: app_url.into(),
            identifier_ttl_seconds: DEFAULT_IDENTIFIER_TTL_SECONDS,
            campaign_ttl_seconds: DEFAULT_CAMPAIGN_TTL_SECONDS,
        }
    }

    pub fn from_config(config: &Config) -> Result<HandoffContext, ConfigurationError> {
        let secrets = Arc::new(SecretManager::from_config(config)?);
        let store = EphemeralStore::from_config(config)?;
        let mut context = HandoffContext::new(secrets, store, config.app_url.as_str())
            .with_ttls(config.identifier_ttl_seconds, config.campaign_ttl_seconds);
        if let Some(source) = HttpIdentifierSource::from_config(config)? {
            context = context.with_identifier_source(source);
        }
        Ok(context)
    }

    pub fn with_identifier_source<S>(mut self, source: S) -> HandoffContext where S: IdentifierSource + 'static {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_ttls(mut self, identifier_ttl_seconds: u64, campaign_ttl_seconds: u64) -> HandoffContext {
        self.identifier_ttl_seconds = identifier_ttl_seconds;
        self.campaign_ttl_seconds = campaign_ttl_seconds;
        self
    }

    #[inline]
    pub fn secrets(&self) -> &SecretManager {
        &self.secrets
    }

    #[inline]
    pub fn store(&self) -> &EphemeralStore {
        &self.store
    }
}

enum Inbound {
    Recovered(String),
    // an identifier was offered but could not be used
    Rejected,
}

#[derive(Clone)]
pub struct HandoffOrchestrator {
    context: Arc<HandoffContext>,
}

impl HandoffOrchestrator {
    pub fn new(context: HandoffContext) -> HandoffOrchestrator {
        HandoffOrchestrator { context: Arc::new(context) }
    }

    #[inline]
    pub fn context(&self) -> &HandoffContext {
        &self.context
    }

    /// Runs one handoff and returns the tokens for the redirect.
    ///
    /// Only invalid input and a flag that cannot be sealed end the request;
    /// every other failure leaves its piece out of the reference.
    pub async fn process(&self, request: &HandoffRequest) -> Result<OutboundReference, HandoffError> {
        let request = request.validate()
            .map_err(|e| {
                warn!("Step {} failed: {}", Step::Validate, e);
                HandoffError::from(e)
            })?;
        debug!("Step {} completed", Step::Validate);

        let inbound = self.recover_identifier(&request).await;
        let inbound = if inbound.is_recoverable() {
            inbound.settle(Step::RecoverIdentifier)?;
            Some(Inbound::Rejected)
        } else {
            inbound.map(Inbound::Recovered).settle(Step::RecoverIdentifier)?
        };

        let identifier = match &inbound {
            Some(Inbound::Recovered(identifier)) => Some(identifier.as_str()),
            _ => None,
        };
        let encrypted_identifier = self.seal_identifier(identifier).settle(Step::SealIdentifier)?;
        let encrypted_flag = self.seal_flag().settle(Step::SealFlag)?
            .ok_or(SealError::Cipher)?;

        let bundle = inbound.map(|inbound| match inbound {
            Inbound::Recovered(identifier) => IdentifierBundle::recovered(identifier, encrypted_identifier.clone()),
            Inbound::Rejected => IdentifierBundle::rejected(),
        });
        let (staged_identifier_key, campaign_key) = futures::join!(
            self.stage_identifier(&request.origin, bundle.as_ref()),
            self.stage_campaign(&request.origin, request.campaign.as_ref()),
        );
        let staged_identifier_key = staged_identifier_key.settle(Step::StageIdentifier)?;
        let campaign_key = campaign_key.settle(Step::StageCampaign)?;

        let reference = OutboundReference {
            base_url: self.context.app_url.clone(),
            client_id: request.client_id.as_str().to_owned(),
            encrypted_identifier,
            encrypted_flag,
            staged_identifier_key,
            campaign_key,
        };
        info!(
            "Handoff for {} assembled: identifier {}, staged {}, campaign {}",
            &request.client_id,
            reference.encrypted_identifier.is_some(),
            reference.staged_identifier_key.is_some(),
            reference.campaign_key.is_some(),
        );
        debug!("Step {} completed", Step::Assemble);
        Ok(reference)
    }

    async fn recover_identifier(&self, request: &ValidatedRequest) -> StepOutcome<String> {
        match &request.legacy_identifier {
            Some(Ok(cipher_text)) => match self.context.secrets.decode_legacy(cipher_text) {
                Some(identifier) => {
                    debug!("Legacy identifier decoded to {}", mask_identifier(&identifier));
                    StepOutcome::Completed(identifier)
                },
                None => StepOutcome::Recoverable(CryptoError::Legacy.into()),
            },
            Some(Err(e)) => StepOutcome::Recoverable((*e).into()),
            None => self.fetch_identifier(&request.client_id).await,
        }
    }

    async fn fetch_identifier(&self, client_id: &ClientId) -> StepOutcome<String> {
        let source = match &self.context.source {
            Some(source) => source,
            None => return StepOutcome::Skipped,
        };
        match source.fetch_identifier(Some(client_id)).await {
            Ok(Some(identifier)) => match validate_identifier_value(Some(identifier.as_str())) {
                Ok(identifier) => StepOutcome::Completed(identifier),
                Err(e) => StepOutcome::Recoverable(e.into()),
            },
            Ok(None) => StepOutcome::Skipped,
            Err(e) => StepOutcome::Recoverable(e.into()),
        }
    }

    fn seal_identifier(&self, identifier: Option<&str>) -> StepOutcome<String> {
        match identifier {
            Some(identifier) => match self.context.secrets.seal(identifier) {
                Ok(envelope) => StepOutcome::Completed(envelope),
                Err(e) => StepOutcome::Recoverable(e.into()),
            },
            None => StepOutcome::Skipped,
        }
    }

    fn seal_flag(&self) -> StepOutcome<String> {
        match self.context.secrets.seal(FLOW_FLAG) {
            Ok(envelope) => StepOutcome::Completed(envelope),
            Err(e) => StepOutcome::Fatal(e.into()),
        }
    }

    // the key embeds the origin address, so it leaves the service sealed
    async fn stage_identifier(&self, origin: &Origin, bundle: Option<&IdentifierBundle>) -> StepOutcome<String> {
        let bundle = match bundle {
            Some(bundle) => bundle,
            None => return StepOutcome::Skipped,
        };
        match self.context.store.stage_identifier(origin, bundle, self.context.identifier_ttl_seconds).await {
            Ok(Some(key)) => match self.context.secrets.seal(&key.key_string()) {
                Ok(sealed) => StepOutcome::Completed(sealed),
                Err(e) => StepOutcome::Recoverable(e.into()),
            },
            Ok(None) => StepOutcome::Skipped,
            Err(e) => StepOutcome::Recoverable(e.into()),
        }
    }

    async fn stage_campaign(&self, origin: &Origin, bundle: Option<&CampaignBundle>) -> StepOutcome<String> {
        let bundle = match bundle {
            Some(bundle) => bundle,
            None => return StepOutcome::Skipped,
        };
        self.context.store.stage_campaign(origin, bundle, self.context.campaign_ttl_seconds).await
            .map_or_else(
                |e| StepOutcome::Recoverable(e.into()),
                |key| key.map_or(StepOutcome::Skipped, |key| StepOutcome::Completed(key.key_string())),
            )
    }

    /// Seals an identifier a browser client submitted so that only the holder
    /// of the private key can read it.
    pub fn seal_client_identifier(&self, identifier: Option<&str>) -> Result<String, HandoffError> {
        let identifier = validate_identifier_value(identifier)?;
        self.context.secrets.seal_one_way(&identifier)
            .map_err(|e| {
                error!("Cannot seal client identifier: {}", e);
                HandoffError::from(e)
            })
    }

    /// Opens a payload that came back from the consuming application.
    pub fn redeem(&self, payload: &Value) -> Result<Redemption, HandoffError> {
        let payload = validate_encrypted_payload(payload)?;
        let originated_from_flow = match &payload.originate_from_landing {
            Some(flag) => self.context.secrets.open(flag)? == FLOW_FLAG,
            None => false,
        };
        let identifier = payload.msisdn
            .map(|envelope| self.context.secrets.open(&envelope))
            .transpose()?;
        Ok(Redemption { identifier, originated_from_flow })
    }

    /// Reads the identifier bundle behind a sealed staging key.
    ///
    /// `Ok(None)` means missing or expired; store failures are returned.
    pub async fn resolve_staged_identifier(&self, sealed_key: &str) -> Result<Option<IdentifierBundle>, HandoffError> {
        let key = self.context.secrets.open(sealed_key.trim())?;
        let key = match StagingKey::parse(&key) {
            Ok(key) => key,
            Err(_) => {
                warn!("Sealed staging key does not hold a staging key");
                return Ok(None);
            },
        };
        Ok(self.context.store.identifier_bundle(&key).await?)
    }
}
