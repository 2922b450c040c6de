use thiserror::Error;

/// Failures surfaced by the build pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    /// The image tool exited with a non-zero status
    #[error("{operation} falhou ({status}): {command}\n{output}")]
    ToolInvocation {
        operation: &'static str,
        command: String,
        status: String,
        output: String,
    },

    /// The image tool binary could not be executed at all
    #[error("não foi possível executar {command}")]
    ToolLaunch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The registry could not be bound or launched
    #[error("registry em {address} não iniciou: {reason}")]
    RegistryStart { address: String, reason: String },

    /// `config` printed something that is not an image config document
    #[error("config de {reference} inválida")]
    ConfigParse {
        reference: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stale target could not be removed and the policy treats it as fatal
    #[error("não foi possível remover {reference}: {detail}")]
    StaleDelete { reference: String, detail: String },
}
