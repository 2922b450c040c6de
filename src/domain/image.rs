use anyhow::{Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Separator the image tool expects for list-valued string flags (`--cmd`, `--entrypoint`, `-f`)
pub const LIST_SEPARATOR: &str = ",";

/// A registry-qualified image reference (`host:port/name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    host: String,
    port: u16,
    name: String,
}

impl ImageRef {
    /// Reference on the local ephemeral registry
    pub fn local(port: u16, name: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port,
            name: name.into(),
        }
    }

    /// Base reference, named after the last path component of the base image
    pub fn for_base_path(port: u16, base: &Path) -> Result<Self> {
        let Some(name) = base_name(base) else {
            bail!("imagem base {:?} não tem nome de arquivo", base);
        };
        Ok(Self::local(port, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Last path component of `path`, if it has one (`/` and `..` do not)
pub fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.name)
    }
}

/// Ordered list of layer archives; order is application order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerSet(Vec<PathBuf>);

impl LayerSet {
    pub fn new(layers: Vec<PathBuf>) -> Self {
        Self(layers)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Comma-joined form consumed by `append -f`
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR)
    }
}

/// Runtime metadata of an image, as reported by the `config` inspection
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ImageConfig {
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub env: Option<Vec<String>>,
}

impl ImageConfig {
    pub fn joined_cmd(&self) -> Option<String> {
        self.cmd.as_ref().map(|c| c.join(LIST_SEPARATOR))
    }

    pub fn joined_entrypoint(&self) -> Option<String> {
        self.entrypoint.as_ref().map(|e| e.join(LIST_SEPARATOR))
    }
}

/// Top-level document printed by `config <ref>`
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub config: ImageConfig,
}

/// Metadata overrides supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub env: Vec<String>,
    pub entrypoint: Option<String>,
    pub cmd: Option<String>,
    pub user: Option<String>,
    pub workdir: Option<String>,
}

impl ConfigOverrides {
    /// Entrypoint override, treating an empty string as not supplied
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref().filter(|s| !s.is_empty())
    }

    /// Command override, treating an empty string as not supplied
    pub fn cmd(&self) -> Option<&str> {
        self.cmd.as_deref().filter(|s| !s.is_empty())
    }
}

/// Everything needed for one build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub base: PathBuf,
    pub layers: LayerSet,
    pub overrides: ConfigOverrides,
    pub output: PathBuf,
    pub name: String,
}

/// A single `mutate` flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutateArg {
    Env(String),
    Entrypoint(String),
    Cmd(String),
    User(String),
    Workdir(String),
}

impl MutateArg {
    pub fn to_flag(&self) -> String {
        match self {
            Self::Env(v) => format!("--env={v}"),
            Self::Entrypoint(v) => format!("--entrypoint={v}"),
            Self::Cmd(v) => format!("--cmd={v}"),
            Self::User(v) => format!("--user={v}"),
            Self::Workdir(v) => format!("--workdir={v}"),
        }
    }
}

impl fmt::Display for MutateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(v) => write!(f, "env={v}"),
            Self::Entrypoint(v) => write!(f, "entrypoint={v}"),
            Self::Cmd(v) => write!(f, "cmd={v}"),
            Self::User(v) => write!(f, "user={v}"),
            Self::Workdir(v) => write!(f, "workdir={v}"),
        }
    }
}

/// On-disk format produced by `pull`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PullFormat {
    /// OCI image layout directory
    #[default]
    Oci,
}

impl PullFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oci => "oci",
        }
    }
}
