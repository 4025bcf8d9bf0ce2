//! Editor configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Characters kept in the generated plain-text preview
    pub preview_length: usize,
}

impl EditorConfig {
    pub fn new() -> Self {
        Self { preview_length: 90 }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EditorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.preview_length, 90);
    }
}
