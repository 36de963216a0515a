//! Process manager for llama-server.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::LlamaCppClient;
use crate::error::LocalAIError;
use crate::paths::llama_server_path;
use crate::DEFAULT_PORT;

/// Time a server gets to exit after SIGTERM before it is killed.
const STOP_GRACE: Duration = Duration::from_millis(500);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Manager for one llama-server process serving one model file.
pub struct LlamaCppServer {
    port: u16,
    model_path: PathBuf,
    binary_path: PathBuf,
    context_size: u32,
    process: Option<Child>,
}

impl LlamaCppServer {
    /// Create a new server manager for a model file.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            port: DEFAULT_PORT,
            model_path: model_path.into(),
            binary_path: llama_server_path(),
            context_size: 4096,
            process: None,
        }
    }

    /// Set a custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use a llama-server binary other than the one in the data directory.
    pub fn with_binary(mut self, binary_path: impl Into<PathBuf>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    pub fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    /// Get the port this server is configured to use.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Start the llama-server process.
    pub fn start(&mut self) -> Result<(), LocalAIError> {
        if !self.binary_path.exists() {
            return Err(LocalAIError::ServerBinaryNotFound(
                self.binary_path.display().to_string(),
            ));
        }

        if !self.model_path.is_file() {
            return Err(LocalAIError::ModelNotFound(
                self.model_path.display().to_string(),
            ));
        }

        info!(
            "Starting llama-server on port {} with model {:?}",
            self.port, self.model_path
        );

        let child = Command::new(&self.binary_path)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--ctx-size")
            .arg(self.context_size.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LocalAIError::ServerStartFailed(e.to_string()))?;

        debug!("llama-server process started with PID: {}", child.id());
        self.process = Some(child);

        Ok(())
    }

    /// Wait for the server to become ready.
    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), LocalAIError> {
        let client = self.client();
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        info!("Waiting for llama-server to become ready...");

        while start.elapsed() < timeout {
            if client.check_health().await.is_ok() {
                info!("llama-server is ready");
                return Ok(());
            }
            if !self.is_running() {
                return Err(LocalAIError::ServerStartFailed(
                    "process exited before becoming ready".to_string(),
                ));
            }
            sleep(check_interval).await;
        }

        Err(LocalAIError::ServerStartTimeout)
    }

    /// Stop the server process without blocking the runtime.
    ///
    /// Sends SIGTERM, waits up to the grace period for the process to exit,
    /// then kills it.
    pub async fn shutdown(&mut self) -> Result<(), LocalAIError> {
        if let Some(mut child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());
            request_exit(&child);

            let deadline = std::time::Instant::now() + STOP_GRACE;
            while std::time::Instant::now() < deadline {
                if !matches!(child.try_wait(), Ok(None)) {
                    break;
                }
                sleep(STOP_POLL_INTERVAL).await;
            }
            reap(child);
        }
        Ok(())
    }

    /// Stop the server process, blocking the current thread during the grace
    /// period. Async callers use [`LlamaCppServer::shutdown`].
    pub fn stop(&mut self) -> Result<(), LocalAIError> {
        if let Some(child) = self.process.take() {
            info!("Stopping llama-server (PID: {})", child.id());
            request_exit(&child);
            std::thread::sleep(STOP_GRACE);
            reap(child);
        }
        Ok(())
    }

    /// Check if the server process is running.
    pub fn is_running(&mut self) -> bool {
        if let Some(ref mut child) = self.process {
            match child.try_wait() {
                Ok(Some(_)) => {
                    self.process = None;
                    false
                }
                Ok(None) => true,
                Err(_) => false,
            }
        } else {
            false
        }
    }

    /// Get a client connected to this server.
    pub fn client(&self) -> LlamaCppClient {
        LlamaCppClient::with_port(self.port)
    }
}

/// Ask the process to exit.
fn request_exit(child: &Child) {
    #[cfg(unix)]
    {
        // SAFETY: the pid belongs to a child we spawned and have not reaped yet.
        unsafe {
            libc::kill(child.id() as i32, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    let _ = child;
}

/// Collect the exit status, killing the process if it is still alive.
fn reap(mut child: Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("Server exited with status: {:?}", status);
        }
        Ok(None) => {
            warn!("Server didn't exit gracefully, killing...");
            let _ = child.kill();
            let _ = child.wait();
        }
        Err(e) => {
            warn!("Error checking server status: {}", e);
            let _ = child.kill();
        }
    }
}

impl Drop for LlamaCppServer {
    fn drop(&mut self) {
        if self.process.is_some() {
            let _ = self.stop();
        }
    }
}
