use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::config::ProviderConfig;
use crate::process::{ChildGuard, isolate_process_group};

use super::{GenerationProvider, GenerationRequest, ProviderError};

/// Provider adapter that shells out to a configured command.
///
/// The prompt arrives on stdin and the generated code is expected on
/// stdout; model, temperature and context travel as `PASSBENCH_*`
/// environment variables. This is the seam a provider-specific CLI (or a
/// thin SDK wrapper script) plugs into.
pub struct CommandProvider {
    name: String,
    model_id: String,
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let argv = shell_words::split(&config.command)
            .with_context(|| format!("invalid command for provider {}", config.name))?;
        if argv.is_empty() {
            anyhow::bail!("provider {} has an empty command", config.name);
        }
        Ok(Self {
            name: config.name.clone(),
            model_id: config.model.clone(),
            argv,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl GenerationProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_code(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .env("PASSBENCH_MODEL", &self.model_id)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());
        if let Some(temperature) = request.temperature {
            cmd.env("PASSBENCH_TEMPERATURE", temperature.to_string());
        }
        if let Some(context) = &request.context {
            cmd.env("PASSBENCH_CONTEXT", context);
        }
        isolate_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(ProviderError::Spawn)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Other("provider child missing stdin".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::Other("provider child missing stdout".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProviderError::Other("provider child missing stderr".into()))?;
        let mut guard = ChildGuard::new(child);

        let prompt = request.prompt.clone();
        let exchange = async {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(ProviderError::Spawn)?;
            // Close stdin so commands that read to EOF can proceed.
            drop(stdin);

            let mut out = Vec::new();
            let mut err = Vec::new();
            tokio::try_join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err))
                .map_err(ProviderError::Spawn)?;
            let status = guard.wait().await.map_err(ProviderError::Spawn)?;
            Ok::<_, ProviderError>((status, out, err))
        };

        // The guard is still armed if the timeout wins the race, so the
        // whole process group goes down with the dropped future.
        let (status, out, err) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        if !status.success() {
            return Err(ProviderError::Failed {
                code: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(command: &str, timeout_secs: u64) -> CommandProvider {
        CommandProvider::from_config(&ProviderConfig {
            name: "local".into(),
            model: "test-model".into(),
            command: command.into(),
            timeout_secs,
        })
        .unwrap()
    }

    #[test]
    fn rejects_empty_command() {
        let result = CommandProvider::from_config(&ProviderConfig {
            name: "local".into(),
            model: "test-model".into(),
            command: "".into(),
            timeout_secs: 10,
        });
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echoes_prompt_through_stdin() {
        let provider = provider("cat", 10);
        let request = GenerationRequest {
            prompt: "<p>generate me</p>".into(),
            temperature: Some(0.0),
            context: None,
        };
        let code = provider.generate_code(&request).await.unwrap();
        assert_eq!(code, "<p>generate me</p>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exposes_model_and_temperature_to_the_command() {
        let provider = provider("sh -c 'echo $PASSBENCH_MODEL:$PASSBENCH_TEMPERATURE'", 10);
        let request = GenerationRequest {
            prompt: String::new(),
            temperature: Some(0.0),
            context: None,
        };
        let code = provider.generate_code(&request).await.unwrap();
        assert_eq!(code.trim(), "test-model:0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_provider_error() {
        let provider = provider("sh -c 'echo boom >&2; exit 3'", 10);
        let err = provider
            .generate_code(&GenerationRequest::default())
            .await
            .unwrap_err();
        match err {
            ProviderError::Failed { code, stderr } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_commands_time_out() {
        let provider = provider("sleep 5", 1);
        let err = provider
            .generate_code(&GenerationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(1)));
    }
}
