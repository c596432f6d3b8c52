//! Exec tunnel through the cluster orchestrator
//!
//! Runs `kubectl -n {namespace} exec {pod} -- curl -X POST
//! http://127.0.0.1:{port}/{operation}` and inspects the captured output.
//! The only signal is the literal success token in stdout; there is no
//! structured envelope on this path.

use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::TunnelTarget;
use crate::error::ArkError;
use crate::models::Operation;

/// Token whose presence in stdout marks a successful probe
pub const SUCCESS_TOKEN: &str = "SUCCESS";

const METHOD: &str = "EXEC";

/// Transcript of one exec tunnel run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelProbe {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub succeeded: bool,
}

/// Spawns the orchestrator exec command for cluster coordinates
#[derive(Debug, Clone)]
pub struct ExecTunnel {
    exec_program: String,
    http_probe_program: String,
}

impl ExecTunnel {
    pub fn new(exec_program: impl Into<String>, http_probe_program: impl Into<String>) -> Self {
        Self {
            exec_program: exec_program.into(),
            http_probe_program: http_probe_program.into(),
        }
    }

    /// Arguments passed to the exec program
    pub fn args(&self, target: &TunnelTarget, operation: Operation) -> Vec<String> {
        vec![
            "-n".to_string(),
            target.namespace.clone(),
            "exec".to_string(),
            target.pod.clone(),
            "--".to_string(),
            self.http_probe_program.clone(),
            "-X".to_string(),
            "POST".to_string(),
            format!("http://127.0.0.1:{}/{}", target.port, operation.path()),
        ]
    }

    pub fn command_line(&self, target: &TunnelTarget, operation: Operation) -> String {
        std::iter::once(self.exec_program.clone())
            .chain(self.args(target, operation))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the tunnel and classify its stdout.
    ///
    /// A process that cannot start or exits non-zero is a
    /// [`ArkError::TunnelExec`]. A clean exit yields a [`TunnelProbe`] whose
    /// `succeeded` flag reflects the success token. On cancellation the child
    /// is killed and reaped before returning.
    pub async fn probe(
        &self,
        target: &TunnelTarget,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<TunnelProbe, ArkError> {
        let command_line = self.command_line(target, operation);
        if cancel.is_cancelled() {
            return Err(ArkError::cancelled(METHOD, command_line));
        }

        debug!(command = %command_line, "Spawning exec tunnel");

        let mut child = Command::new(&self.exec_program)
            .args(self.args(target, operation))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ArkError::TunnelExec {
                operation,
                command: command_line.clone(),
                reason: format!("could not be started: {}", e),
                stderr: String::new(),
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                reap(&mut child).await;
                return Err(ArkError::TunnelExec {
                    operation,
                    command: command_line,
                    reason: "has no output pipes".to_string(),
                    stderr: String::new(),
                });
            }
        };

        let drained = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reap(&mut child).await;
                debug!(command = %command_line, "Exec tunnel cancelled");
                return Err(ArkError::cancelled(METHOD, command_line));
            }
            result = drain(&mut child, stdout, stderr) => result,
        };

        let (status, stdout, stderr) = match drained {
            Ok(output) => output,
            Err(e) => {
                reap(&mut child).await;
                return Err(ArkError::TunnelExec {
                    operation,
                    command: command_line,
                    reason: format!("output could not be read: {}", e),
                    stderr: String::new(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            warn!(command = %command_line, status = %status, "Exec tunnel exited abnormally");
            return Err(ArkError::TunnelExec {
                operation,
                command: command_line,
                reason: format!("exited with {}", status),
                stderr,
            });
        }

        Ok(TunnelProbe {
            succeeded: stdout.contains(SUCCESS_TOKEN),
            command: command_line,
            stdout,
            stderr,
        })
    }
}

/// Read both pipes to the end, then wait for exit
async fn drain(
    child: &mut Child,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let (read_out, read_err) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
    read_out?;
    read_err?;
    let status = child.wait().await?;
    Ok((status, out, err))
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Exec tunnel already exited");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "Failed to reap exec tunnel process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TunnelTarget {
        TunnelTarget {
            namespace: "staging".to_string(),
            pod: "base-0".to_string(),
            port: 1238,
        }
    }

    #[test]
    fn test_command_line() {
        let tunnel = ExecTunnel::new("kubectl", "curl");
        assert_eq!(
            tunnel.command_line(&target(), Operation::Health),
            "kubectl -n staging exec base-0 -- curl -X POST http://127.0.0.1:1238/health"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_exec_error() {
        let tunnel = ExecTunnel::new("/nonexistent/ark-exec-tunnel", "curl");
        let err = tunnel
            .probe(&target(), Operation::Health, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ArkError::TunnelExec { .. }));
        assert!(err.to_string().contains("could not be started"));
    }

    #[tokio::test]
    async fn test_precancelled_probe_does_not_spawn() {
        let tunnel = ExecTunnel::new("/nonexistent/ark-exec-tunnel", "curl");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tunnel.probe(&target(), Operation::Health, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[cfg(unix)]
    mod fake_exec {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::time::Duration;

        /// Write an executable shell script standing in for the orchestrator
        fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-kubectl");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        fn tunnel_for(path: &PathBuf) -> ExecTunnel {
            ExecTunnel::new(path.to_string_lossy().into_owned(), "curl")
        }

        #[tokio::test]
        async fn test_success_token_in_stdout() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, r#"echo '{"code":"SUCCESS","data":{}}'"#);
            let probe = tunnel_for(&path)
                .probe(&target(), Operation::Health, &CancellationToken::new())
                .await
                .unwrap();
            assert!(probe.succeeded);
            assert!(probe.stdout.contains("SUCCESS"));
            assert!(probe.command.ends_with("curl -X POST http://127.0.0.1:1238/health"));
        }

        #[tokio::test]
        async fn test_missing_token_is_not_success() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, r#"echo '{"code":"FAILED"}'; echo 'warn' >&2"#);
            let probe = tunnel_for(&path)
                .probe(&target(), Operation::Health, &CancellationToken::new())
                .await
                .unwrap();
            assert!(!probe.succeeded);
            assert_eq!(probe.stderr.trim(), "warn");
        }

        #[tokio::test]
        async fn test_arguments_reach_the_program() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, r#"printf '%s SUCCESS\n' "$*""#);
            let probe = tunnel_for(&path)
                .probe(&target(), Operation::Health, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(
                probe.stdout.trim(),
                "-n staging exec base-0 -- curl -X POST http://127.0.0.1:1238/health SUCCESS"
            );
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, r#"echo 'Error from server (NotFound): pods "base-0" not found' >&2; exit 1"#);
            let err = tunnel_for(&path)
                .probe(&target(), Operation::Health, &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, ArkError::TunnelExec { .. }));
            assert_eq!(
                err.subprocess_output(),
                vec![r#"Error from server (NotFound): pods "base-0" not found"#]
            );
        }

        #[tokio::test]
        async fn test_cancel_kills_running_tunnel() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, "sleep 30");
            let tunnel = tunnel_for(&path);
            let cancel = CancellationToken::new();

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let err = tokio::time::timeout(
                Duration::from_secs(10),
                tunnel.probe(&target(), Operation::Health, &cancel),
            )
            .await
            .expect("cancelled probe should return promptly")
            .unwrap_err();

            assert!(err.is_cancelled());
            assert!(err.to_string().starts_with("EXEC \""));
        }
    }
}
