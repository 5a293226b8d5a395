//! NAT traversal server descriptors and their conversion into the
//! parameters handed to the networking client.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reflection server used when no usable descriptor is configured.
pub const DEFAULT_REFLECTION_ADDRESS: &str = "stun.l.google.com:19302";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum RelayKind {
    /// Address discovery only.
    #[serde(rename = "stun")]
    #[value(name = "stun", alias = "reflection")]
    Reflection,
    /// Traffic relay, optionally authenticated.
    #[serde(rename = "turn")]
    #[value(name = "turn", alias = "relay")]
    Relay,
    /// Traffic relay over TLS.
    #[serde(rename = "turns")]
    #[value(name = "turns", alias = "secure-relay")]
    SecureRelay,
}

impl RelayKind {
    pub fn scheme(self) -> &'static str {
        match self {
            RelayKind::Reflection => "stun",
            RelayKind::Relay => "turn",
            RelayKind::SecureRelay => "turns",
        }
    }

    fn takes_credentials(self) -> bool {
        matches!(self, RelayKind::Relay | RelayKind::SecureRelay)
    }
}

impl fmt::Display for RelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A relay or reflection server as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayServerDescriptor {
    pub kind: RelayKind,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl RelayServerDescriptor {
    pub fn new(kind: RelayKind, address: impl Into<String>) -> RelayServerDescriptor {
        RelayServerDescriptor {
            kind,
            address: address.into(),
            username: None,
            secret: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> RelayServerDescriptor {
        self.username = Some(username.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn default_reflection() -> RelayServerDescriptor {
        RelayServerDescriptor::new(RelayKind::Reflection, DEFAULT_REFLECTION_ADDRESS)
    }

    /// Checks that a non-empty address has the `host:port` shape.
    ///
    /// Empty addresses are valid here, they are skipped by [`resolve`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let address = self.address.trim();
        if address.is_empty() {
            return Ok(());
        }

        let invalid = || ConfigError::InvalidRelay(address.to_string());
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }
        match port.parse::<u16>() {
            Ok(p) if p > 0 => Ok(()),
            _ => Err(invalid()),
        }
    }

    fn credentials(&self) -> Option<(String, String)> {
        let username = self.username.as_deref().map(str::trim).unwrap_or_default();
        let secret = self.secret.as_deref().map(str::trim).unwrap_or_default();
        if username.is_empty() || secret.is_empty() {
            return None;
        }
        Some((username.to_string(), secret.to_string()))
    }
}

/// A relay entry in the form the networking client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayParam {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl RelayParam {
    fn default_reflection() -> RelayParam {
        RelayParam {
            url: format!("{}:{}", RelayKind::Reflection.scheme(), DEFAULT_REFLECTION_ADDRESS),
            username: None,
            credential: None,
        }
    }
}

/// Converts descriptors into relay parameters, preserving order.
///
/// Descriptors without an address are skipped. Credentials are attached
/// only to relay kinds, and only when both username and secret are present.
/// An empty result is replaced by the default reflection server.
pub fn resolve(descriptors: &[RelayServerDescriptor]) -> Vec<RelayParam> {
    let params: Vec<RelayParam> = descriptors
        .iter()
        .filter_map(|d| {
            let address = d.address.trim();
            if address.is_empty() {
                return None;
            }

            let (username, credential) = match d.credentials() {
                Some((u, c)) if d.kind.takes_credentials() => (Some(u), Some(c)),
                _ => (None, None),
            };

            Some(RelayParam {
                url: format!("{}:{}", d.kind.scheme(), address),
                username,
                credential,
            })
        })
        .collect();

    if params.is_empty() {
        return vec![RelayParam::default_reflection()];
    }
    params
}

/// The ordered, never-empty list of relay descriptors a user maintains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RelayServerDescriptor>", into = "Vec<RelayServerDescriptor>")]
pub struct RelaySet(Vec<RelayServerDescriptor>);

impl RelaySet {
    pub fn descriptors(&self) -> &[RelayServerDescriptor] {
        &self.0
    }

    pub fn add(&mut self, descriptor: RelayServerDescriptor) -> Result<(), ConfigError> {
        descriptor.validate()?;
        self.0.push(descriptor);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<RelayServerDescriptor, ConfigError> {
        if index >= self.0.len() {
            return Err(ConfigError::RelayIndex(index));
        }
        if self.0.len() == 1 {
            return Err(ConfigError::LastRelay);
        }
        Ok(self.0.remove(index))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.0.iter().try_for_each(RelayServerDescriptor::validate)
    }
}

impl Default for RelaySet {
    fn default() -> Self {
        RelaySet(vec![RelayServerDescriptor::default_reflection()])
    }
}

impl From<Vec<RelayServerDescriptor>> for RelaySet {
    fn from(descriptors: Vec<RelayServerDescriptor>) -> Self {
        if descriptors.is_empty() {
            return RelaySet::default();
        }
        RelaySet(descriptors)
    }
}

impl From<RelaySet> for Vec<RelayServerDescriptor> {
    fn from(set: RelaySet) -> Self {
        set.0
    }
}
