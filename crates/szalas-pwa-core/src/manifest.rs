//! Web app manifest loading and validation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{PwaError, Result};

pub const MIN_ICONS: usize = 2;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct WebAppManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<Vec<ManifestIcon>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct ManifestIcon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub icon_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestProblem {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("expected at least {} icons, found {}", MIN_ICONS, .0)]
    TooFewIcons(usize),

    #[error("icon {index} is missing '{field}'")]
    IncompleteIcon { index: usize, field: &'static str },
}

/// A field counts as present when its key exists; the value itself is not
/// inspected.
fn present(value: &Option<String>) -> bool {
    value.is_some()
}

impl WebAppManifest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Every rule the manifest breaks, in field order.
    pub fn problems(&self) -> Vec<ManifestProblem> {
        let mut problems = Vec::new();
        let fields = [
            ("name", &self.name),
            ("short_name", &self.short_name),
            ("start_url", &self.start_url),
            ("display", &self.display),
        ];
        for (field, value) in fields {
            if !present(value) {
                problems.push(ManifestProblem::MissingField(field));
            }
        }

        let Some(icons) = &self.icons else {
            problems.push(ManifestProblem::MissingField("icons"));
            return problems;
        };
        if icons.len() < MIN_ICONS {
            problems.push(ManifestProblem::TooFewIcons(icons.len()));
        }
        for (index, icon) in icons.iter().enumerate() {
            for (field, value) in [
                ("src", &icon.src),
                ("sizes", &icon.sizes),
                ("type", &icon.icon_type),
            ] {
                if !present(value) {
                    problems.push(ManifestProblem::IncompleteIcon { index, field });
                }
            }
        }
        problems
    }

    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        let joined: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
        Err(PwaError::Manifest(joined.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r##"{
        "name": "Szałas",
        "short_name": "Szałas",
        "start_url": "/",
        "display": "standalone",
        "theme_color": "#2d5016",
        "icons": [
            {"src": "/static/icons/icon-192x192.png", "sizes": "192x192", "type": "image/png"},
            {"src": "/static/icons/icon-512x512.png", "sizes": "512x512", "type": "image/png", "purpose": "any maskable"}
        ]
    }"##;

    #[test]
    fn test_valid_manifest() {
        let manifest = WebAppManifest::from_json(VALID).unwrap();
        assert!(manifest.problems().is_empty());
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.icons.unwrap()[1].purpose.as_deref(), Some("any maskable"));
    }

    #[test]
    fn test_missing_fields_are_reported() {
        let manifest = WebAppManifest::from_json(r#"{"name": "Szałas", "short_name": null}"#).unwrap();
        assert_eq!(
            manifest.problems(),
            vec![
                ManifestProblem::MissingField("short_name"),
                ManifestProblem::MissingField("start_url"),
                ManifestProblem::MissingField("display"),
                ManifestProblem::MissingField("icons"),
            ]
        );
    }

    #[test]
    fn test_empty_values_count_as_present() {
        let manifest = WebAppManifest::from_json(
            r#"{"name": "", "short_name": "", "start_url": "", "display": "",
                "icons": [
                    {"src": "", "sizes": "", "type": ""},
                    {"src": "/i.png", "sizes": "512x512", "type": "image/png"}
                ]}"#,
        )
        .unwrap();
        assert!(manifest.problems().is_empty());
    }

    #[test]
    fn test_icon_rules() {
        let manifest = WebAppManifest::from_json(
            r#"{"name": "a", "short_name": "a", "start_url": "/", "display": "standalone",
                "icons": [{"src": "/i.png", "sizes": "192x192"}]}"#,
        )
        .unwrap();
        assert_eq!(
            manifest.problems(),
            vec![
                ManifestProblem::TooFewIcons(1),
                ManifestProblem::IncompleteIcon { index: 0, field: "type" },
            ]
        );
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, PwaError::Manifest(msg) if msg.contains("icon 0 is missing 'type'")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        let manifest = WebAppManifest::load(file.path()).unwrap();
        assert_eq!(manifest.display.as_deref(), Some("standalone"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            WebAppManifest::from_json("{not json"),
            Err(PwaError::Json(_))
        ));
    }
}
