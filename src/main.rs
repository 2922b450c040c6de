use anyhow::Result;
use clap::{Parser, Subcommand};
use layerbox::cli::{self, BuildArgs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "layerbox",
    about = "Monta imagens OCI adicionando camadas a uma imagem base via crane"
)]
struct Cli {
    /// Arquivo de configuração (default: ./layerbox.toml, se existir)
    #[arg(long, env = "LAYERBOX_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gera o layout OCI: base + camadas + metadados
    Build(BuildArgs),
    /// Verifica se o crane configurado pode ser executado
    Check {
        /// Caminho do binário crane
        #[arg(long, env = "LAYERBOX_CRANE")]
        crane: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli::resolve_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(args) => cli::build::run(args, settings),
        Commands::Check { crane } => cli::check::run(crane, settings),
    }
}
