use crate::model::{CommandLine, ExecutionResult, ExitInfo};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::time::{Duration, timeout};

/// Chat messages are capped well below the platform's 40k character limit.
const MAX_OUTPUT_CHARS: usize = 38_000;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, line: &CommandLine) -> ExecutionResult;

    /// How the executed command is shown back to the user.
    fn display(&self, line: &CommandLine) -> String {
        format!("kubectl {line}")
    }
}

#[derive(Debug, Clone)]
pub struct KubectlRunner {
    binary: String,
    context: Option<String>,
    timeout: Duration,
}

impl KubectlRunner {
    pub fn new(binary: impl Into<String>, context: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            context,
            timeout,
        }
    }
}

#[async_trait]
impl CommandRunner for KubectlRunner {
    async fn run(&self, line: &CommandLine) -> ExecutionResult {
        let mut cmd = TokioCommand::new(&self.binary);
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(line.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return ExecutionResult {
                    success: false,
                    output: String::new(),
                    exit: ExitInfo::SpawnFailed(format!("{}: {error}", self.binary)),
                };
            }
            Err(_) => {
                return ExecutionResult {
                    success: false,
                    output: String::new(),
                    exit: ExitInfo::TimedOut(self.timeout),
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = if stderr.trim().is_empty() {
            stdout.to_string()
        } else if stdout.trim().is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}{stderr}")
        };

        ExecutionResult {
            success: output.status.success(),
            output: combined,
            exit: match output.status.code() {
                Some(code) => ExitInfo::Exited(code),
                None => ExitInfo::Signaled,
            },
        }
    }

    fn display(&self, line: &CommandLine) -> String {
        format!("{} {line}", self.binary)
    }
}

/// Chat text for a finished command: output on success, prefixed output on failure.
pub fn render_result(shown: &str, result: &ExecutionResult) -> String {
    match &result.exit {
        ExitInfo::TimedOut(after) => {
            format!(
                "Command timed out after {}s: `{shown}`",
                after.as_secs_f64().round() as u64
            )
        }
        ExitInfo::SpawnFailed(reason) => {
            format!("Error executing command:\n```\n{reason}\n```")
        }
        _ if result.success => format!("```\n{}\n```", code_block_body(&result.output)),
        _ => format!(
            "Error executing command:\n```\n{}\n```",
            code_block_body(&result.output)
        ),
    }
}

fn code_block_body(output: &str) -> String {
    let output = output.trim_end();
    if output.is_empty() {
        return "(no output)".to_string();
    }
    truncate(output, MAX_OUTPUT_CHARS)
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut out = value.chars().take(max).collect::<String>();
    out.push_str("\n… (truncated)");
    out
}

#[cfg(test)]
mod tests {
    use super::{CommandRunner, KubectlRunner, render_result, truncate};
    use crate::error::ExecutionError;
    use crate::model::{CommandLine, ExecutionResult, ExitInfo};
    use tokio::time::Duration;

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let runner = KubectlRunner::new("echo", None, Duration::from_secs(5));
        let line = CommandLine::listing("get", "pods", "prod");
        let result = runner.run(&line).await;

        assert!(result.success);
        assert_eq!(result.output, "get pods -n prod\n");
        assert_eq!(result.exit, ExitInfo::Exited(0));
        assert_eq!(result.error(), None);
        assert_eq!(runner.display(&line), "echo get pods -n prod");
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let runner = KubectlRunner::new("false", None, Duration::from_secs(5));
        let result = runner
            .run(&CommandLine::instance("logs", "web-1", "prod", true))
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error(),
            Some(ExecutionError::NonZeroExit { code: Some(1) })
        );
    }

    #[tokio::test]
    async fn stderr_follows_stdout_in_failed_output() {
        let runner = KubectlRunner::new("sh", None, Duration::from_secs(5));
        let line = CommandLine::from_args(["-c", "echo out; echo err >&2; exit 3"]);
        let result = runner.run(&line).await;

        assert!(!result.success);
        assert_eq!(result.output, "out\nerr\n");
        assert_eq!(result.exit, ExitInfo::Exited(3));
        let rendered = render_result(&runner.display(&line), &result);
        assert!(rendered.starts_with("Error executing command:"));
        assert!(rendered.contains("err"));
    }

    #[tokio::test]
    async fn hung_command_times_out() {
        let runner = KubectlRunner::new("sleep", None, Duration::from_millis(100));
        let line = CommandLine::from_args(["5"]);
        let result = runner.run(&line).await;

        assert!(!result.success);
        assert_eq!(result.exit, ExitInfo::TimedOut(Duration::from_millis(100)));
        assert!(matches!(
            result.error(),
            Some(ExecutionError::TimedOut { .. })
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let runner = KubectlRunner::new("kubechat-no-such-binary", None, Duration::from_secs(5));
        let result = runner
            .run(&CommandLine::listing("get", "nodes", "default"))
            .await;
        assert!(matches!(result.exit, ExitInfo::SpawnFailed(_)));
    }

    #[test]
    fn failed_output_is_prefixed_as_error() {
        let result = ExecutionResult {
            success: false,
            output: "no such pod\n".to_string(),
            exit: ExitInfo::Exited(1),
        };
        assert_eq!(
            render_result("kubectl logs web-1 -n prod", &result),
            "Error executing command:\n```\nno such pod\n```"
        );
    }

    #[test]
    fn success_output_is_wrapped_in_code_block() {
        let result = ExecutionResult {
            success: true,
            output: String::new(),
            exit: ExitInfo::Exited(0),
        };
        assert_eq!(render_result("kubectl get", &result), "```\n(no output)\n```");
    }

    #[test]
    fn timeout_message_names_the_command() {
        let result = ExecutionResult {
            success: false,
            output: String::new(),
            exit: ExitInfo::TimedOut(Duration::from_secs(30)),
        };
        assert_eq!(
            render_result("kubectl logs web-1 -n prod", &result),
            "Command timed out after 30s: `kubectl logs web-1 -n prod`"
        );
    }

    #[test]
    fn long_output_is_truncated() {
        let rendered = truncate("abcdef", 3);
        assert_eq!(rendered, "abc\n… (truncated)");
        assert_eq!(truncate("abc", 3), "abc");
    }
}
