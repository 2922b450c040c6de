use crate::domain::{
    DeleteOutcome, ImageConfig, ImageRef, ImageTool, LayerSet, MutateArg, PullFormat,
};
use anyhow::{Result, bail};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory stand-in for crane that records every call
pub struct MockImageTool {
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<Option<String>>,
    base_config: RwLock<ImageConfig>,
    delete_outcome: RwLock<DeleteOutcome>,
    mutations: RwLock<Vec<Vec<MutateArg>>>,
    write_output: RwLock<bool>,
}

impl MockImageTool {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
            base_config: RwLock::new(ImageConfig::default()),
            delete_outcome: RwLock::new(DeleteOutcome::NotFound),
            mutations: RwLock::new(Vec::new()),
            write_output: RwLock::new(false),
        }
    }

    pub fn set_fail_on(&self, operation: &str) {
        *self.fail_on.write().unwrap() = Some(operation.to_string());
    }

    pub fn set_base_config(&self, config: ImageConfig) {
        *self.base_config.write().unwrap() = config;
    }

    pub fn set_delete_outcome(&self, outcome: DeleteOutcome) {
        *self.delete_outcome.write().unwrap() = outcome;
    }

    /// Makes `pull` create the output directory with an `index.json`
    pub fn write_output_on_pull(&self) {
        *self.write_output.write().unwrap() = true;
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    /// Argument sets passed to `mutate`, one entry per call
    pub fn get_mutations(&self) -> Vec<Vec<MutateArg>> {
        self.mutations.read().unwrap().clone()
    }

    fn record_command(&self, cmd: &str) {
        self.commands.write().unwrap().push(cmd.to_string());
    }

    fn check_fail(&self, operation: &str) -> Result<()> {
        if let Some(ref fail_on) = *self.fail_on.read().unwrap() {
            if fail_on == operation {
                bail!("Mock failure on: {}", operation);
            }
        }
        Ok(())
    }
}

impl Default for MockImageTool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockImageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockImageTool")
            .field("commands", &self.get_commands())
            .finish()
    }
}

impl ImageTool for MockImageTool {
    fn push(&self, local: &Path, reference: &ImageRef) -> Result<()> {
        self.record_command(&format!("push:{}->{}", local.display(), reference));
        self.check_fail("push")
    }

    fn delete(&self, reference: &ImageRef) -> Result<DeleteOutcome> {
        self.record_command(&format!("delete:{}", reference));
        self.check_fail("delete")?;
        Ok(self.delete_outcome.read().unwrap().clone())
    }

    fn append(&self, target: &ImageRef, layers: &LayerSet, base: &ImageRef) -> Result<()> {
        self.record_command(&format!("append:{}+[{}]->{}", base, layers.joined(), target));
        self.check_fail("append")
    }

    fn get_config(&self, reference: &ImageRef) -> Result<ImageConfig> {
        self.record_command(&format!("config:{}", reference));
        self.check_fail("config")?;
        Ok(self.base_config.read().unwrap().clone())
    }

    fn mutate(&self, reference: &ImageRef, args: &[MutateArg]) -> Result<()> {
        self.record_command(&format!("mutate:{}", reference));
        self.check_fail("mutate")?;
        self.mutations.write().unwrap().push(args.to_vec());
        Ok(())
    }

    fn pull(&self, reference: &ImageRef, output: &Path, format: PullFormat) -> Result<()> {
        self.record_command(&format!(
            "pull:{}->{}:{}",
            reference,
            format.as_str(),
            output.display()
        ));
        self.check_fail("pull")?;

        if *self.write_output.read().unwrap() {
            fs::create_dir_all(output)?;
            fs::write(output.join("index.json"), reference.to_string())?;
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.record_command("is_available");
        true
    }
}

/// Writes an executable `/bin/sh` script, used as a fake crane binary
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Asks the OS for a currently unused loopback port
pub fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
