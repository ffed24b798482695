//! Developer environment declarations.
//!
//! These are descriptive only: the engine records them on the module and
//! leaves provisioning to whatever manager they name.
use serde::Deserialize;

/// A language and the versions a module expects to be installed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DevelopmentEnvironment {
    /// Language name (e.g. `python`).
    pub language: String,
    /// Required versions, in declaration order.
    pub versions: Vec<String>,
    /// Manager responsible for the versions.
    #[serde(default)]
    pub environment_manager: Option<LanguageEnvironmentManager>,
}

/// A version manager such as `pyenv`, with its plugins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LanguageEnvironmentManager {
    /// Manager name.
    pub name: String,
    /// Plugin managers, in order.
    #[serde(default)]
    pub plugins: Vec<PluginManager>,
}

/// A manager plugin and the virtual environments it owns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginManager {
    /// Plugin name.
    pub name: String,
    /// Virtual environments created through the plugin.
    #[serde(default)]
    pub virtual_environments: Vec<VirtualEnvironment>,
}

/// A named virtual environment pinned to a language version.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualEnvironment {
    /// Environment name.
    pub name: String,
    /// Language version it is built on.
    pub version: String,
}

/// Body of a `developer_environments` document.
#[derive(Debug, Deserialize)]
pub struct DeveloperEnvironmentsDocument {
    /// The declared environments.
    pub developer_environments: Vec<DevelopmentEnvironment>,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_manager() {
        let doc: DeveloperEnvironmentsDocument = serde_yaml::from_str(
            r"
version: alpha
schema: developer_environments
developer_environments:
  - language: python
    versions: ['3.12.1', '3.11.7']
    environment_manager:
      name: pyenv
      plugins:
        - name: pyenv-virtualenv
          virtual_environments:
            - name: tools
              version: '3.12.1'
",
        )
        .unwrap();
        let env = &doc.developer_environments[0];
        assert_eq!(env.versions, ["3.12.1", "3.11.7"]);
        let manager = env.environment_manager.as_ref().unwrap();
        assert_eq!(manager.name, "pyenv");
        assert_eq!(
            manager.plugins[0].virtual_environments[0],
            VirtualEnvironment {
                name: "tools".to_string(),
                version: "3.12.1".to_string()
            }
        );
    }

    #[test]
    fn manager_is_optional() {
        let env: DevelopmentEnvironment =
            serde_json::from_str(r#"{"language": "go", "versions": ["1.22"]}"#).unwrap();
        assert!(env.environment_manager.is_none());
    }
}
