use std::fmt::{Display, Formatter, Result as FormatResult};
use std::net::IpAddr;

use regex::Regex;
use uuid::Uuid;

lazy_static! {
    static ref RE_STAGING_KEY: Regex = Regex::new(
        r"^(?P<namespace>[a-z]+):(?P<origin>unknown|[[:xdigit:].:]+):(?P<uuid>[[:xdigit:]]{8}-[[:xdigit:]]{4}-[[:xdigit:]]{4}-[[:xdigit:]]{4}-[[:xdigit:]]{12})$"
    ).expect("cannot compile regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Identifier,
    Campaign,
}

impl Namespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Identifier => "msisdn",
            Namespace::Campaign => "campaign",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Namespace> {
        match prefix {
            "msisdn" => Some(Namespace::Identifier),
            "campaign" => Some(Namespace::Campaign),
            _ => None,
        }
    }
}

/// Address of the requester a record was staged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Origin(Option<IpAddr>);

impl Origin {
    pub fn unknown() -> Origin {
        Origin(None)
    }

    #[inline]
    pub fn address(&self) -> Option<&IpAddr> {
        self.0.as_ref()
    }
}

impl From<IpAddr> for Origin {
    fn from(address: IpAddr) -> Self {
        Origin(Some(address))
    }
}

impl From<Option<IpAddr>> for Origin {
    fn from(address: Option<IpAddr>) -> Self {
        Origin(address)
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match &self.0 {
            Some(address) => write!(f, "{}", address),
            None => f.write_str("unknown"),
        }
    }
}

/// `<namespace>:<origin>:<uuid>`; the uuid keeps concurrent requests from one
/// origin apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingKey {
    namespace: Namespace,
    origin: String,
    uuid: Uuid,
}

impl StagingKey {
    pub fn new(namespace: Namespace, origin: &Origin) -> StagingKey {
        StagingKey {
            namespace,
            origin: origin.to_string(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn parse(key: &str) -> Result<StagingKey, ()> {
        let captures = RE_STAGING_KEY.captures(key).ok_or(())?;
        let namespace = captures.name("namespace")
            .and_then(|namespace| Namespace::from_prefix(namespace.as_str()))
            .ok_or(())?;
        let origin = captures.name("origin").ok_or(())?.as_str();
        if origin != "unknown" && origin.parse::<IpAddr>().is_err() {
            return Err(());
        }
        let uuid = captures.name("uuid")
            .and_then(|uuid| Uuid::parse_str(uuid.as_str()).ok())
            .ok_or(())?;
        Ok(StagingKey { namespace, origin: origin.to_owned(), uuid })
    }

    #[inline]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn key_string(&self) -> String {
        format!(
            "{namespace}:{origin}:{uuid}",
            namespace = self.namespace.prefix(),
            origin = &self.origin,
            uuid = &self.uuid,
        )
    }
}

impl Display for StagingKey {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(f, "{}", self.key_string())
    }
}
