use super::builder::{BuildReport, ImageBuilder};
use crate::domain::{BuildRequest, ImageTool, StaleDeletePolicy};
use crate::infra::registry::{RegistryGuard, RegistrySettings, write_diagnostics};
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Starts the ephemeral registry, runs one build against it and always tears it down
pub struct Orchestrator {
    settings: RegistrySettings,
    builder: ImageBuilder,
}

impl Orchestrator {
    pub fn new(
        settings: RegistrySettings,
        tool: Arc<dyn ImageTool>,
        delete_policy: StaleDeletePolicy,
    ) -> Self {
        let builder = ImageBuilder::new(tool, settings.port).with_delete_policy(delete_policy);
        Self { settings, builder }
    }

    /// Runs the build, writing the registry's captured output to stderr
    pub fn run(&self, request: &BuildRequest) -> Result<BuildReport> {
        self.run_with_diagnostics(request, &mut std::io::stderr())
    }

    /// Runs the build, writing the registry's captured output to `diagnostics`
    pub fn run_with_diagnostics(
        &self,
        request: &BuildRequest,
        diagnostics: &mut dyn Write,
    ) -> Result<BuildReport> {
        let registry = RegistryGuard::start(&self.settings)?;
        debug!("registry ativo (pid {:?})", registry.pid());

        // On panic the guard's Drop stops the registry instead
        let outcome = self.builder.build(request);

        match registry.release() {
            Ok(log) => {
                if let Err(e) = write_diagnostics(diagnostics, &log) {
                    warn!("não foi possível escrever o log do registry: {e}");
                }
            }
            Err(e) => warn!("falha ao encerrar o registry: {e:#}"),
        }

        outcome
    }
}
