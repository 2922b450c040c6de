use crate::domain::{
    BuildError, ConfigFile, DeleteOutcome, ImageConfig, ImageRef, ImageTool, LayerSet, MutateArg,
    PullFormat,
};
use anyhow::Result;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Registry error codes in a failed delete when nothing is stored under the name
const NOT_FOUND_MARKERS: &[&str] = &["NAME_UNKNOWN", "MANIFEST_UNKNOWN", "404 Not Found"];

/// Drives the `crane` binary
#[derive(Debug, Clone)]
pub struct CraneAdapter {
    binary: PathBuf,
}

impl CraneAdapter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn run<I, S>(&self, operation: &'static str, args: I) -> Result<(String, Output), BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|item| item.as_ref().to_os_string())
            .collect();
        let command = render_command(&self.binary, &args);
        info!("{operation}: {command}");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| BuildError::ToolLaunch {
                command: command.clone(),
                source,
            })?;

        Ok((command, output))
    }

    /// Runs the tool and fails with `ToolInvocation` on a non-zero exit
    fn crane<I, S>(&self, operation: &'static str, args: I) -> Result<Output, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (command, output) = self.run(operation, args)?;
        ensure_success(operation, command, output)
    }
}

impl ImageTool for CraneAdapter {
    fn push(&self, local: &Path, reference: &ImageRef) -> Result<()> {
        self.crane(
            "push",
            [
                OsStr::new("push"),
                local.as_os_str(),
                OsStr::new(&reference.to_string()),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, reference: &ImageRef) -> Result<DeleteOutcome> {
        let target = reference.to_string();
        let (_, output) = self.run("delete", ["delete", target.as_str()])?;

        if output.status.success() {
            return Ok(DeleteOutcome::Deleted);
        }

        let text = combined_output(&output);
        debug!("delete de {target} retornou {:?}: {text}", output.status);
        Ok(classify_delete_failure(text))
    }

    fn append(&self, target: &ImageRef, layers: &LayerSet, base: &ImageRef) -> Result<()> {
        self.crane(
            "append",
            [
                "append".to_string(),
                "-t".to_string(),
                target.to_string(),
                "-f".to_string(),
                layers.joined(),
                "-b".to_string(),
                base.to_string(),
            ],
        )?;
        Ok(())
    }

    fn get_config(&self, reference: &ImageRef) -> Result<ImageConfig> {
        let target = reference.to_string();
        let output = self.crane("config", ["config", target.as_str()])?;
        Ok(parse_config(&target, &output.stdout)?)
    }

    fn mutate(&self, reference: &ImageRef, args: &[MutateArg]) -> Result<()> {
        let mut argv = vec!["mutate".to_string(), reference.to_string()];
        argv.extend(args.iter().map(MutateArg::to_flag));
        self.crane("mutate", argv)?;
        Ok(())
    }

    fn pull(&self, reference: &ImageRef, output: &Path, format: PullFormat) -> Result<()> {
        let format_flag = format!("--format={}", format.as_str());
        self.crane(
            "pull",
            [
                OsStr::new("pull"),
                OsStr::new(&format_flag),
                OsStr::new(&reference.to_string()),
                output.as_os_str(),
            ],
        )?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

pub(crate) fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut parts = vec![binary.to_string_lossy().into_owned()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}

fn ensure_success(
    operation: &'static str,
    command: String,
    output: Output,
) -> Result<Output, BuildError> {
    if output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{operation}: {}", stderr.trim());
        }
        return Ok(output);
    }

    Err(BuildError::ToolInvocation {
        operation,
        command,
        status: output.status.to_string(),
        output: combined_output(&output),
    })
}

fn classify_delete_failure(output: String) -> DeleteOutcome {
    let not_found = NOT_FOUND_MARKERS
        .iter()
        .any(|marker| output.contains(marker));

    if not_found {
        DeleteOutcome::NotFound
    } else {
        DeleteOutcome::Failed { output }
    }
}

fn parse_config(reference: &str, stdout: &[u8]) -> Result<ImageConfig, BuildError> {
    serde_json::from_slice::<ConfigFile>(stdout)
        .map(|file| file.config)
        .map_err(|source| BuildError::ConfigParse {
            reference: reference.to_string(),
            source,
        })
}
