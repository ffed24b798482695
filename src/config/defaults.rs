//! Default OS settings: typed view of a `default_settings` document.
use serde::Deserialize;
use serde_json::Value;

use crate::error::LoadError;
use crate::version::VersionRange;

/// One default-OS-setting declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    /// Unique name within the document.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Shell command that applies the setting.
    pub command: String,
    /// Shell command whose result tells whether the setting is already in
    /// effect.
    pub check_command: Option<String>,
    /// Expected trimmed stdout of `check_command`.  When absent, a zero exit
    /// of `check_command` means "already in effect".
    pub expected_check_state: Option<String>,
    /// Releases the setting applies to.
    pub range: VersionRange,
    /// Disabled settings are listed but never run.
    pub enabled: bool,
    /// Run `command` through `sudo`.
    pub run_as_sudo: bool,
    /// Capture the command's output and treat a non-zero exit as failure.
    pub check_output: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawSetting {
    name: String,
    command: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    check_command: Option<String>,
    #[serde(default)]
    expected_check_state: Option<Value>,
    #[serde(default)]
    sudo: bool,
    #[serde(default = "default_true")]
    check_output: bool,
}

/// Body of a `default_settings` document.
#[derive(Debug, Deserialize)]
pub struct DefaultSettingsDocument {
    default_settings: Vec<RawSetting>,
}

impl DefaultSettingsDocument {
    /// Resolve version bounds and produce typed settings in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Version`] if a bound names no release or the
    /// range is inverted.
    pub fn into_settings(self) -> Result<Vec<Setting>, LoadError> {
        self.default_settings
            .into_iter()
            .map(|raw| {
                let range = VersionRange::from_tokens(raw.start.as_deref(), raw.end.as_deref())
                    .map_err(|source| LoadError::Version {
                        setting: raw.name.clone(),
                        source,
                    })?;
                Ok(Setting {
                    name: raw.name,
                    description: raw.description,
                    command: raw.command,
                    check_command: raw.check_command,
                    expected_check_state: raw.expected_check_state.as_ref().map(check_state_text),
                    range,
                    enabled: raw.enabled,
                    run_as_sudo: raw.sudo,
                    check_output: raw.check_output,
                })
            })
            .collect()
    }
}

/// Text a check command prints for `value`.  Booleans follow the `defaults
/// read` convention of `1`/`0`.
fn check_state_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::version::MacVersion;

    fn parse(yaml: &str) -> Result<Vec<Setting>, LoadError> {
        serde_yaml::from_str::<DefaultSettingsDocument>(yaml)
            .unwrap()
            .into_settings()
    }

    #[test]
    fn defaults_for_optional_fields() {
        let settings = parse("default_settings:\n  - name: x\n    command: echo x\n").unwrap();
        let s = &settings[0];
        assert!(s.enabled);
        assert!(!s.run_as_sudo);
        assert!(s.check_output);
        assert_eq!(s.range, VersionRange::unbounded());
        assert!(s.check_command.is_none());
    }

    #[test]
    fn bounds_resolve_to_releases() {
        let settings = parse(
            "default_settings:\n  - name: dock\n    command: defaults write x\n    start: sierra\n    end: MOJAVE\n",
        )
        .unwrap();
        assert_eq!(settings[0].range.start(), Some(MacVersion::Sierra));
        assert_eq!(settings[0].range.end(), Some(MacVersion::Mojave));
    }

    #[test]
    fn inverted_range_names_the_setting() {
        let err = parse(
            "default_settings:\n  - name: dock\n    command: c\n    start: mojave\n    end: sierra\n",
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("setting 'dock'"), "{err}");
    }

    #[test]
    fn expected_state_is_stringified() {
        let settings = parse(
            "default_settings:\n  - {name: a, command: c, expected_check_state: true}\n  - {name: b, command: c, expected_check_state: 36}\n  - {name: c, command: c, expected_check_state: Always}\n",
        )
        .unwrap();
        let states: Vec<_> = settings
            .iter()
            .map(|s| s.expected_check_state.as_deref().unwrap())
            .collect();
        assert_eq!(states, ["1", "36", "Always"]);
    }
}
