use crate::domain::BuildError;
use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_REGISTRY_PORT: u16 = 61978;
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Where and how the ephemeral registry runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub tool_path: PathBuf,
    pub port: u16,
    pub stop_timeout: Duration,
}

impl RegistrySettings {
    pub fn new(tool_path: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            tool_path: tool_path.into(),
            port,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }
}

/// A running `registry serve` process and the file capturing its output
#[derive(Debug)]
pub struct RegistryHandle {
    child: Child,
    log: File,
    address: String,
}

/// Launches the registry; does not wait for it to accept connections
pub fn start(settings: &RegistrySettings) -> Result<RegistryHandle> {
    let address = settings.bind_address();

    // Fail fast when something already owns the port
    TcpListener::bind(&address).map_err(|e| BuildError::RegistryStart {
        address: address.clone(),
        reason: e.to_string(),
    })?;

    let log = tempfile::tempfile().context("criando arquivo de log do registry")?;
    let stdout = log.try_clone().context("duplicando log do registry")?;
    let stderr = log.try_clone().context("duplicando log do registry")?;

    info!(
        "Iniciando registry em {address} ({:?})",
        settings.tool_path
    );
    let mut child = Command::new(&settings.tool_path)
        .args(["registry", "serve", "--address", address.as_str()])
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| BuildError::RegistryStart {
            address: address.clone(),
            reason: e.to_string(),
        })?;

    let exited = match child.try_wait() {
        Ok(exited) => exited,
        Err(e) => {
            abandon(&mut child);
            return Err(e).context("checando processo do registry");
        }
    };

    if let Some(status) = exited {
        let mut log = log;
        let output = drain(&mut log).unwrap_or_default();
        return Err(BuildError::RegistryStart {
            address,
            reason: format!("processo encerrou com {status}: {}", output.trim()),
        }
        .into());
    }

    debug!("registry iniciado com pid {}", child.id());
    Ok(RegistryHandle {
        child,
        log,
        address,
    })
}

impl RegistryHandle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Terminates the registry (SIGTERM, then SIGKILL after `timeout`) and returns its output
    pub fn stop(mut self, timeout: Duration) -> Result<String> {
        let pid = Pid::from_raw(self.child.id() as i32);
        info!("Encerrando registry em {}", self.address);

        if let Err(e) = kill(pid, Signal::SIGTERM) {
            debug!("SIGTERM para o registry falhou: {e}");
        }

        let status = match wait_bounded(&mut self.child, timeout) {
            Ok(status) => status,
            Err(e) => {
                abandon(&mut self.child);
                return Err(e);
            }
        };
        debug!("registry encerrado: {status}");

        drain(&mut self.log)
    }
}

fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait().context("aguardando o registry")? {
            return Ok(status);
        }

        if Instant::now() >= deadline {
            warn!("registry não encerrou em {:?}, forçando", timeout);
            child.kill().context("matando o registry")?;
            return child.wait().context("aguardando o registry");
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills and reaps a child whose state could not be observed
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("kill do registry falhou: {e}");
    }
    if let Err(e) = child.wait() {
        warn!("não foi possível aguardar o registry (pid {}): {e}", child.id());
    }
}

fn drain(log: &mut File) -> Result<String> {
    log.seek(SeekFrom::Start(0))
        .context("lendo log do registry")?;
    let mut bytes = Vec::new();
    log.read_to_end(&mut bytes)
        .context("lendo log do registry")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Owns the registry for the duration of a build; stops it on drop if not released
#[derive(Debug)]
pub struct RegistryGuard {
    handle: Option<RegistryHandle>,
    stop_timeout: Duration,
}

impl RegistryGuard {
    pub fn start(settings: &RegistrySettings) -> Result<Self> {
        Ok(Self {
            handle: Some(start(settings)?),
            stop_timeout: settings.stop_timeout,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().map(RegistryHandle::pid)
    }

    /// Stops the registry now and hands back its captured output
    pub fn release(mut self) -> Result<String> {
        match self.handle.take() {
            Some(handle) => handle.stop(self.stop_timeout),
            None => Ok(String::new()),
        }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            match handle.stop(self.stop_timeout) {
                Ok(log) => {
                    let _ = write_diagnostics(&mut std::io::stderr(), &log);
                }
                Err(e) => warn!("falha ao encerrar o registry: {e:#}"),
            }
        }
    }
}

/// Writes the captured registry output to `sink`
pub fn write_diagnostics(sink: &mut dyn Write, log: &str) -> std::io::Result<()> {
    if log.trim().is_empty() {
        return Ok(());
    }
    writeln!(sink, "--- registry log ---")?;
    sink.write_all(log.as_bytes())?;
    if !log.ends_with('\n') {
        writeln!(sink)?;
    }
    writeln!(sink, "--- fim do registry log ---")
}
