use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use super::types::{ExtractionStrategy, StrategyInput, StrategyOutput};
use crate::common::encoding::strip_control;
use crate::common::error::{Error, Result};
use crate::config::ExternalToolConfig;

const PATH_PLACEHOLDER: &str = "{path}";

/// Bytes of stderr kept for the failure reason.
const STDERR_LIMIT: u64 = 64 * 1024;

/// Runs an external text extraction program and reads its stdout.
///
/// The child is killed when the extraction future is dropped, so a
/// strategy timeout never leaves a process behind. Stdout beyond
/// `max_output` bytes fails the strategy and kills the child.
#[derive(Debug, Clone)]
pub struct ExternalToolStrategy {
    config: ExternalToolConfig,
    max_output: u64,
}

impl ExternalToolStrategy {
    pub fn new(config: ExternalToolConfig, max_output: u64) -> Self {
        Self { config, max_output }
    }

    fn command_args(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PATH_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(PATH_PLACEHOLDER, &path)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(path.into_owned());
        }
        args
    }
}

#[async_trait]
impl ExtractionStrategy for ExternalToolStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn probe(&self) -> bool {
        find_program(&self.config.program).is_some()
    }

    async fn extract(&self, input: &StrategyInput) -> Result<StrategyOutput> {
        let args = self.command_args(&input.path);
        debug!(tool = %self.config.program, ?args, "running external tool");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::strategy(self.name(), e))?;

        // Drained separately so a chatty stderr cannot stall stdout
        let stderr = tokio::spawn(read_capped(child.stderr.take(), STDERR_LIMIT));
        let stdout = read_capped(child.stdout.take(), self.max_output.saturating_add(1))
            .await
            .map_err(|e| Error::strategy(self.name(), e))?;
        if stdout.len() as u64 > self.max_output {
            return Err(Error::strategy(
                self.name(),
                format!("output exceeds {} bytes", self.max_output),
            ));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::strategy(self.name(), e))?;
        if !status.success() {
            let stderr = stderr.await.ok().and_then(|r| r.ok()).unwrap_or_default();
            let stderr = String::from_utf8_lossy(&stderr);
            let reason = stderr.lines().next().unwrap_or("").trim();
            return Err(Error::strategy(
                self.name(),
                format!("exited with {}: {}", status, reason),
            ));
        }

        let text = strip_control(&String::from_utf8_lossy(&stdout));
        let mut result = StrategyOutput::new(text.trim());
        result.confidence = self.config.confidence;
        Ok(result)
    }
}

async fn read_capped<R>(pipe: Option<R>, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.take(limit).read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Resolve a program name against `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
