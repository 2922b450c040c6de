use super::reconciler::{ConfigReconciler, ResolvedConfig};
use crate::domain::{
    BuildError, BuildRequest, DeleteOutcome, ImageRef, ImageTool, MutateArg, PullFormat,
    StaleDeletePolicy,
};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    PushBase,
    DeleteStale,
    AppendLayers,
    ReadConfig,
    ReconcileConfig,
    Mutate,
    Pull,
    Done,
}

impl BuildStage {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::PushBase => Some(Self::DeleteStale),
            Self::DeleteStale => Some(Self::AppendLayers),
            Self::AppendLayers => Some(Self::ReadConfig),
            Self::ReadConfig => Some(Self::ReconcileConfig),
            Self::ReconcileConfig => Some(Self::Mutate),
            Self::Mutate => Some(Self::Pull),
            Self::Pull => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PushBase => "push-base",
            Self::DeleteStale => "delete-stale",
            Self::AppendLayers => "append-layers",
            Self::ReadConfig => "read-config",
            Self::ReconcileConfig => "reconcile-config",
            Self::Mutate => "mutate",
            Self::Pull => "pull",
            Self::Done => "done",
        };
        write!(f, "{name}")
    }
}

/// What a finished build did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub base_ref: ImageRef,
    pub target_ref: ImageRef,
    pub resolved: ResolvedConfig,
    pub mutate_args: Vec<MutateArg>,
    pub stale_delete: DeleteOutcome,
    pub stage: BuildStage,
}

/// Runs push, delete, append, config, mutate and pull against the local registry
pub struct ImageBuilder {
    tool: Arc<dyn ImageTool>,
    port: u16,
    delete_policy: StaleDeletePolicy,
}

impl ImageBuilder {
    pub fn new(tool: Arc<dyn ImageTool>, port: u16) -> Self {
        Self {
            tool,
            port,
            delete_policy: StaleDeletePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, policy: StaleDeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let base_ref = ImageRef::for_base_path(self.port, &request.base)?;
        let target_ref = ImageRef::local(self.port, request.name.as_str());

        let mut stage = BuildStage::PushBase;
        info!(" Enviando imagem base {:?} para {base_ref}", request.base);
        self.tool
            .push(&request.base, &base_ref)
            .with_context(|| format!("etapa {stage}"))?;

        stage = advance(stage);
        info!(" Removendo imagem antiga {target_ref}");
        let stale_delete = self.delete_stale(&target_ref)?;

        stage = advance(stage);
        info!(
            " Adicionando {} camada(s) sobre {base_ref}",
            request.layers.len()
        );
        self.tool
            .append(&target_ref, &request.layers, &base_ref)
            .with_context(|| format!("etapa {stage}"))?;

        stage = advance(stage);
        info!(" Lendo config da imagem base {base_ref}");
        let base_config = self
            .tool
            .get_config(&base_ref)
            .with_context(|| format!("etapa {stage}"))?;
        debug!("config base: {:?}", base_config);

        stage = advance(stage);
        let resolved = ConfigReconciler::resolve(&request.overrides, &base_config);
        let mutate_args = ConfigReconciler::mutate_args(&request.overrides, &resolved);
        debug!(
            "argumentos de mutate: {}",
            mutate_args
                .iter()
                .map(MutateArg::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        );

        stage = advance(stage);
        info!(" Gerando nova imagem {target_ref}");
        self.tool
            .mutate(&target_ref, &mutate_args)
            .with_context(|| format!("etapa {stage}"))?;

        // mutate cannot write a layout directly; pull the result back out
        stage = advance(stage);
        info!(" Baixando {target_ref} para {:?}", request.output);
        self.tool
            .pull(&target_ref, &request.output, PullFormat::Oci)
            .with_context(|| format!("etapa {stage}"))?;

        stage = advance(stage);
        info!(" Imagem {} pronta em {:?}", request.name, request.output);

        Ok(BuildReport {
            base_ref,
            target_ref,
            resolved,
            mutate_args,
            stale_delete,
            stage,
        })
    }

    fn delete_stale(&self, target: &ImageRef) -> Result<DeleteOutcome> {
        let outcome = match self.tool.delete(target) {
            Ok(outcome) => outcome,
            Err(e) => DeleteOutcome::Failed {
                output: format!("{e:#}"),
            },
        };

        match (&outcome, self.delete_policy) {
            (DeleteOutcome::Deleted, _) => debug!("{target} removida"),
            (DeleteOutcome::NotFound, _) => debug!("{target} não existia"),
            (DeleteOutcome::Failed { output }, StaleDeletePolicy::Lenient) => {
                warn!("  Não foi possível remover {target} (ignorado): {output}")
            }
            (DeleteOutcome::Failed { output }, StaleDeletePolicy::Strict) => {
                return Err(BuildError::StaleDelete {
                    reference: target.to_string(),
                    detail: output.clone(),
                })
                .with_context(|| format!("etapa {}", BuildStage::DeleteStale));
            }
        }

        Ok(outcome)
    }
}

fn advance(stage: BuildStage) -> BuildStage {
    stage.next().unwrap_or(BuildStage::Done)
}
