use crate::domain::{BuildRequest, ConfigOverrides, LayerSet, StaleDeletePolicy, base_name};
use crate::infra::config::{AppSettings, DeleteConfig, RegistryConfig, ToolConfig};
use crate::infra::CraneAdapter;
use crate::services::Orchestrator;
use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Caminho do binário crane
    #[arg(long, env = "LAYERBOX_CRANE")]
    pub crane: Option<PathBuf>,

    /// Imagem base (diretório OCI ou tarball)
    #[arg(long)]
    pub base: PathBuf,

    /// Tarballs das camadas, na ordem de aplicação
    #[arg(long, num_args = 1..)]
    pub tars: Vec<PathBuf>,

    /// Variável de ambiente KEY=VALUE (pode repetir)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub envs: Vec<String>,

    /// Entrypoint da imagem
    #[arg(long, allow_hyphen_values = true)]
    pub entrypoint: Option<String>,

    /// Cmd da imagem
    #[arg(long, allow_hyphen_values = true)]
    pub cmd: Option<String>,

    /// Diretório de saída (layout OCI)
    #[arg(long)]
    pub output: PathBuf,

    /// Nome da imagem
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub workdir: Option<String>,

    /// Porta do registry efêmero (default: 61978)
    #[arg(long, env = "LAYERBOX_REGISTRY_PORT")]
    pub port: Option<u16>,

    /// Falha se o delete da imagem antiga der erro diferente de "não encontrada"
    #[arg(long)]
    pub strict_delete: bool,
}

impl BuildArgs {
    /// Flags expressed as settings, to be merged over the settings file
    pub fn settings(&self) -> AppSettings {
        AppSettings {
            tool: ToolConfig {
                path: self.crane.clone(),
            },
            registry: RegistryConfig {
                port: self.port,
                stop_timeout_secs: None,
            },
            delete: DeleteConfig {
                policy: self.strict_delete.then(|| "strict".to_string()),
            },
        }
    }

    pub fn request(&self) -> Result<BuildRequest> {
        if self.name.trim().is_empty() {
            bail!("--name não pode ser vazio");
        }
        if base_name(&self.base).is_none() {
            bail!("--base {:?} precisa terminar em um nome de imagem", self.base);
        }

        Ok(BuildRequest {
            base: self.base.clone(),
            layers: LayerSet::new(self.tars.clone()),
            overrides: ConfigOverrides {
                env: self.envs.clone(),
                entrypoint: self.entrypoint.clone(),
                cmd: self.cmd.clone(),
                user: self.user.clone(),
                workdir: self.workdir.clone(),
            },
            output: self.output.clone(),
            name: self.name.clone(),
        })
    }
}

pub fn run(args: BuildArgs, mut settings: AppSettings) -> Result<()> {
    settings.merge(args.settings());

    let registry = settings.registry_settings()?;
    let policy: StaleDeletePolicy = settings.delete_policy()?;
    let request = args.request()?;

    let tool = Arc::new(CraneAdapter::new(registry.tool_path.clone()));
    let orchestrator = Orchestrator::new(registry, tool, policy);

    let report = orchestrator.run(&request)?;
    info!(
        "✅ {} gerada a partir de {} em {:?}",
        report.target_ref, report.base_ref, request.output
    );
    Ok(())
}

fn parse_env(value: &str) -> Result<String, String> {
    match value.split_once('=') {
        Some((key, _)) if !key.is_empty() => Ok(value.to_string()),
        _ => Err(format!("esperado KEY=VALUE, recebido '{value}'")),
    }
}
