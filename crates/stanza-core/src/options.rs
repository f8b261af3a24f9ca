//! Compile options

use serde::{Deserialize, Serialize};

use crate::types::BuildFlag;

/// What to do with a document section whose kind has no registered component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownComponents {
    /// Report the section as an instance-level failure
    #[default]
    Reject,
    /// Log a warning and skip the section
    Warn,
}

/// Options for one compilation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub unknown_components: UnknownComponents,
    /// Extra flags unioned into the build requirements of every run
    pub build_flags: Vec<BuildFlag>,
}

impl CompileOptions {
    /// Parse options from JSON; absent keys keep their defaults.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn with_build_flag(mut self, flag: impl Into<String>) -> Self {
        self.build_flags.push(BuildFlag(flag.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let options = CompileOptions::from_json_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert_eq!(options.unknown_components, UnknownComponents::Reject);
    }

    #[test]
    fn test_parse_options() {
        let options =
            CompileOptions::from_json_str(r#"{"unknown_components": "warn", "build_flags": ["-DDEBUG"]}"#).unwrap();
        assert_eq!(options.unknown_components, UnknownComponents::Warn);
        assert_eq!(options.build_flags, vec![BuildFlag::from("-DDEBUG")]);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(CompileOptions::from_json_str(r#"{"unknown_components": "ignore"}"#).is_err());
    }
}
