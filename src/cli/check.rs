use crate::domain::ImageTool;
use crate::infra::{AppSettings, CraneAdapter};
use anyhow::Result;
use std::path::PathBuf;

/// Reports whether the configured crane binary runs
pub fn run(crane: Option<PathBuf>, mut settings: AppSettings) -> Result<()> {
    if let Some(path) = crane {
        settings.tool.path = Some(path);
    }
    let registry = settings.registry_settings()?;

    println!("🔧 Checando ferramentas de build...");
    let adapter = CraneAdapter::new(registry.tool_path.clone());
    if adapter.is_available() {
        println!("✅ {:?} disponível", adapter.binary());
    } else {
        println!("⚠️  {:?} não pôde ser executado", adapter.binary());
    }
    println!("ℹ️  Registry efêmero em {}", registry.bind_address());
    Ok(())
}
