use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Result of a spawned subprocess, used by frobs, the shell built-in tool,
/// and MCP stdio transports.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

pub struct SpawnOptions<'a> {
    pub cwd: Option<&'a Path>,
    pub env: HashMap<String, String>,
    pub stdin: Option<&'a [u8]>,
    pub timeout: Duration,
}

impl Default for SpawnOptions<'_> {
    fn default() -> Self {
        SpawnOptions {
            cwd: None,
            env: HashMap::new(),
            stdin: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Spawns `program` with `args`, isolated into its own process group via
/// `setsid()` so that a timeout kill takes any children with it. Captures
/// stdout/stderr and writes `stdin` (if any) with its own short timeout,
/// mirroring the teacher's process-management idiom.
pub async fn spawn(program: &str, args: &[String], options: SpawnOptions<'_>) -> Result<ExecutionResult> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = options.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &options.env {
        command.env(key, value);
    }

    // SAFETY: `setsid()` is async-signal-safe and only affects the child
    // process after fork, before exec.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = command.spawn().with_context(|| format!("spawning {program}"))?;
    let pid = child.id();

    if let Some(input) = options.stdin {
        let mut stdin = child.stdin.take().expect("piped stdin");
        let input = input.to_vec();
        let write = tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
            drop(stdin);
        });
        if tokio::time::timeout(Duration::from_secs(5), write).await.is_err() {
            tracing::warn!(program, "timed out writing stdin");
        }
    } else {
        drop(child.stdin.take());
    }

    let mut stdout_pipe = child.stdout.take().expect("piped stdout");
    let mut stderr_pipe = child.stderr.take().expect("piped stderr");

    let run = async {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let (stdout_result, stderr_result, status) = tokio::join!(
            stdout_pipe.read_to_end(&mut stdout),
            stderr_pipe.read_to_end(&mut stderr),
            child.wait(),
        );
        stdout_result.context("reading stdout")?;
        stderr_result.context("reading stderr")?;
        let status = status.context("waiting for child")?;
        Ok::<_, anyhow::Error>((stdout, stderr, status.code()))
    };

    match tokio::time::timeout(options.timeout, run).await {
        Ok(result) => {
            let (stdout, stderr, exit_code) = result?;
            Ok(ExecutionResult {
                stdout,
                stderr,
                exit_code,
            })
        }
        Err(_) => {
            if let Some(pid) = pid {
                // SAFETY: killing the whole process group we created via setsid.
                unsafe {
                    libc::kill(-(pid as i32), libc::SIGKILL);
                }
            }
            anyhow::bail!("timed out after {:?} running {program}", options.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_captures_stdout() {
        let result = spawn("echo", &["hello".to_string()], SpawnOptions::default())
            .await
            .unwrap();
        assert_eq!(result.stdout_string().trim(), "hello");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_spawn_nonzero_exit() {
        let result = spawn("false", &[], SpawnOptions::default()).await.unwrap();
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_spawn_writes_stdin() {
        let result = spawn(
            "cat",
            &[],
            SpawnOptions {
                stdin: Some(b"piped input"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(result.stdout_string(), "piped input");
    }

    #[tokio::test]
    async fn test_spawn_times_out() {
        let result = spawn(
            "sleep",
            &["5".to_string()],
            SpawnOptions {
                timeout: Duration::from_millis(100),
                ..Default::default()
            },
        )
        .await;
        assert!(result.is_err());
    }
}
