use crate::domain::StaleDeletePolicy;
use crate::infra::registry::{DEFAULT_REGISTRY_PORT, DEFAULT_STOP_TIMEOUT, RegistrySettings};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "layerbox.toml";

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub port: Option<u16>,
    pub stop_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteConfig {
    pub policy: Option<String>,
}

/// Contents of `layerbox.toml`
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct AppSettings {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub delete: DeleteConfig,
}

impl AppSettings {
    /// Merges another AppSettings into self.
    /// Values from `other` overwrite values in `self` if present.
    pub fn merge(&mut self, other: AppSettings) {
        if let Some(path) = other.tool.path {
            self.tool.path = Some(path);
        }
        if let Some(port) = other.registry.port {
            self.registry.port = Some(port);
        }
        if let Some(secs) = other.registry.stop_timeout_secs {
            self.registry.stop_timeout_secs = Some(secs);
        }
        if let Some(policy) = other.delete.policy {
            self.delete.policy = Some(policy);
        }
    }

    pub fn delete_policy(&self) -> Result<StaleDeletePolicy> {
        match self.delete.policy.as_deref() {
            None => Ok(StaleDeletePolicy::default()),
            Some(name) => StaleDeletePolicy::from_name(name)
                .with_context(|| format!("política de delete desconhecida: '{name}'")),
        }
    }

    /// Builds the registry settings, failing when no tool path was configured
    pub fn registry_settings(&self) -> Result<RegistrySettings> {
        let Some(path) = &self.tool.path else {
            bail!("Caminho do crane não informado. Use --crane ou [tool] path em {DEFAULT_CONFIG_FILE_NAME}.");
        };

        Ok(RegistrySettings {
            tool_path: expand_path(path),
            port: self.registry.port.unwrap_or(DEFAULT_REGISTRY_PORT),
            stop_timeout: self
                .registry
                .stop_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
        })
    }
}

pub fn load_settings(path: &Path) -> Result<AppSettings> {
    let content = fs::read_to_string(path).with_context(|| format!("lendo {:?}", path))?;
    parse_settings(&content).with_context(|| format!("interpretando {:?}", path))
}

pub fn parse_settings(content: &str) -> Result<AppSettings> {
    let settings: AppSettings = toml::from_str(content)?;
    if let Some(name) = &settings.delete.policy {
        if StaleDeletePolicy::from_name(name).is_none() {
            bail!("política de delete desconhecida: '{name}' (use 'lenient' ou 'strict')");
        }
    }
    Ok(settings)
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.to_string_lossy().as_ref()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let settings = parse_settings(
            r#"
[tool]
path = "/opt/crane"

[registry]
port = 5055
stop_timeout_secs = 2

[delete]
policy = "strict"
"#,
        )
        .unwrap();

        let registry = settings.registry_settings().unwrap();
        assert_eq!(registry.tool_path, PathBuf::from("/opt/crane"));
        assert_eq!(registry.port, 5055);
        assert_eq!(registry.stop_timeout, Duration::from_secs(2));
        assert_eq!(settings.delete_policy().unwrap(), StaleDeletePolicy::Strict);
    }

    #[test]
    fn test_defaults() {
        let settings = parse_settings("[tool]\npath = \"/opt/crane\"\n").unwrap();
        let registry = settings.registry_settings().unwrap();
        assert_eq!(registry.port, DEFAULT_REGISTRY_PORT);
        assert_eq!(registry.stop_timeout, DEFAULT_STOP_TIMEOUT);
        assert_eq!(settings.delete_policy().unwrap(), StaleDeletePolicy::Lenient);
    }

    #[test]
    fn test_missing_tool_path() {
        let settings = AppSettings::default();
        assert!(settings.registry_settings().is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(parse_settings("[delete]\npolicy = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = parse_settings("[tool]\npath = \"/a\"\n[registry]\nport = 1\n").unwrap();
        let other = AppSettings {
            registry: RegistryConfig {
                port: Some(2),
                stop_timeout_secs: None,
            },
            ..Default::default()
        };
        base.merge(other);

        assert_eq!(base.tool.path, Some(PathBuf::from("/a")));
        assert_eq!(base.registry.port, Some(2));
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_path(Path::new("~/bin/crane"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("bin/crane"));
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE_NAME);
        fs::write(&path, "[registry]\nport = 7000\n").unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.registry.port, Some(7000));
    }
}
