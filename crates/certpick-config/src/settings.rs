use certpick_core::HintDurability;
use serde::{Deserialize, Serialize};

use crate::manifest::validate_group_name;
use crate::ConfigError;

/// Selector construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectorSettings {
    /// Certificate manifest path.
    pub manifest_path: String,
    /// Optional crypto engine properties file.
    pub engine_hint_path: Option<String>,
    /// Manifest group this selector draws candidates from.
    pub group: String,
    pub hint_durability: HintDurability,
    /// Overrides the default table of certificate-rejecting transport codes.
    pub rejection_codes: Option<Vec<u32>>,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            manifest_path: String::new(),
            engine_hint_path: None,
            group: String::new(),
            hint_durability: HintDurability::OneShot,
            rejection_codes: None,
        }
    }
}

impl SelectorSettings {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_path.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "manifest_path",
            });
        }
        validate_group_name(&self.group)?;
        if let Some(codes) = &self.rejection_codes {
            if codes.is_empty() {
                return Err(ConfigError::EmptyField {
                    field: "rejection_codes",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SelectorSettings;
    use crate::ConfigError;
    use certpick_core::HintDurability;

    #[test]
    fn parses_minimal_settings_with_defaults() {
        let settings = SelectorSettings::from_json(
            r#"{"manifest_path": "/etc/certpick/manifest.cfg", "group": "group1"}"#,
        )
        .expect("settings");
        assert_eq!(settings.hint_durability, HintDurability::OneShot);
        assert_eq!(settings.engine_hint_path, None);
        assert_eq!(settings.rejection_codes, None);
    }

    #[test]
    fn parses_snake_case_hint_durability() {
        let settings = SelectorSettings::from_json(
            r#"{
                "manifest_path": "/etc/certpick/manifest.cfg",
                "group": "group1",
                "hint_durability": "until_failure",
                "rejection_codes": [58, 35]
            }"#,
        )
        .expect("settings");
        assert_eq!(settings.hint_durability, HintDurability::UntilFailure);
        assert_eq!(settings.rejection_codes, Some(vec![58, 35]));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = SelectorSettings::from_json(
            r#"{"manifest_path": "m", "group": "g", "surprise": true}"#,
        )
        .expect_err("unknown field");
        assert!(matches!(error, ConfigError::Json(_)));
    }

    #[test]
    fn validation_requires_manifest_path_and_sane_group() {
        let mut settings = SelectorSettings {
            manifest_path: "/etc/certpick/manifest.cfg".to_string(),
            group: "group1".to_string(),
            ..SelectorSettings::default()
        };
        settings.validate().expect("valid");

        settings.manifest_path = " ".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmptyField {
                field: "manifest_path"
            })
        ));

        settings.manifest_path = "/etc/certpick/manifest.cfg".to_string();
        settings.group = "a|b".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::BadGroupName { .. })
        ));
    }

    #[test]
    fn empty_rejection_code_override_is_rejected() {
        let settings = SelectorSettings {
            manifest_path: "m".to_string(),
            group: "g".to_string(),
            rejection_codes: Some(Vec::new()),
            ..SelectorSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmptyField {
                field: "rejection_codes"
            })
        ));
    }
}
