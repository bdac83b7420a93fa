use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// URL scheme of an ICE server entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceScheme {
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl IceScheme {
    pub fn of(url: &str) -> Option<Self> {
        let (scheme, rest) = url.split_once(':')?;
        if rest.is_empty() {
            return None;
        }
        match scheme {
            "stun" => Some(IceScheme::Stun),
            "stuns" => Some(IceScheme::Stuns),
            "turn" => Some(IceScheme::Turn),
            "turns" => Some(IceScheme::Turns),
            _ => None,
        }
    }

    /// TURN relays need credentials
    pub fn needs_credentials(self) -> bool {
        matches!(self, IceScheme::Turn | IceScheme::Turns)
    }
}

/// NAT traversal server advertised to clients in the `init` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .filter_map(|url| IceScheme::of(url))
            .any(IceScheme::needs_credentials)
    }

    /// First problem with this entry, if any
    pub fn problem(&self) -> Option<String> {
        if self.urls.is_empty() {
            return Some("ICE server has no URLs".to_string());
        }
        if let Some(bad) = self.urls.iter().find(|url| IceScheme::of(url).is_none()) {
            return Some(format!("unsupported ICE server URL '{}'", bad));
        }
        if self.is_turn() && (self.username.is_none() || self.credential.is_none()) {
            return Some(format!("{} needs a username and credential", self.urls[0]));
        }
        None
    }

    pub fn default_stun_servers() -> Vec<Self> {
        ["stun:stun.l.google.com:19302", "stun:stun1.l.google.com:19302"]
            .into_iter()
            .map(Self::stun)
            .collect()
    }
}
