//! Host environment reported at registration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Web,
    Desktop,
    /// React Native webview; only accepts string payloads
    Mobile,
    #[serde(other)]
    Unknown,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Web => "web",
            Environment::Desktop => "desktop",
            Environment::Mobile => "mobile",
            Environment::Unknown => "unknown",
        }
    }

    /// Mobile hosts need envelopes serialized to JSON strings.
    pub fn requires_string_payloads(&self) -> bool {
        matches!(self, Environment::Mobile)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_environment() {
        let env: Environment = serde_json::from_str("\"desktop\"").unwrap();
        assert_eq!(env, Environment::Desktop);

        let env: Environment = serde_json::from_str("\"tv\"").unwrap();
        assert_eq!(env, Environment::Unknown);
    }

    #[test]
    fn test_string_payloads_only_on_mobile() {
        assert!(Environment::Mobile.requires_string_payloads());
        assert!(!Environment::Desktop.requires_string_payloads());
        assert!(!Environment::Web.requires_string_payloads());
    }
}
