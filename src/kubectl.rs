use crate::error::QueryError;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tokio::time::{Duration, timeout};
use tracing::debug;

const NAME_JSONPATH: &str = "jsonpath='{.items[*].metadata.name}'";

/// Read-only listings used to build the namespace and pod menus.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>, QueryError>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>, QueryError>;
}

#[derive(Debug, Clone)]
pub struct KubectlQuery {
    binary: String,
    context: Option<String>,
    timeout: Duration,
}

impl KubectlQuery {
    pub fn new(binary: impl Into<String>, context: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            context,
            timeout,
        }
    }

    async fn run_listing(&self, args: &[&str]) -> Result<Vec<String>, QueryError> {
        let mut cmd = TokioCommand::new(&self.binary);
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(args)
            .arg("-o")
            .arg(NAME_JSONPATH)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("running {} {}", self.binary, args.join(" "));
        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| QueryError::TimedOut(self.timeout))?
            .map_err(|source| QueryError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(QueryError::Exit {
                binary: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout)?;
        Ok(parse_name_list(&stdout))
    }
}

#[async_trait]
impl ClusterQuery for KubectlQuery {
    async fn list_namespaces(&self) -> Result<Vec<String>, QueryError> {
        self.run_listing(&["get", "namespaces"]).await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>, QueryError> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(QueryError::EmptyNamespace);
        }
        self.run_listing(&["get", "pods", "-n", namespace]).await
    }
}

/// Splits jsonpath name output into names, dropping the quotes kubectl echoes back.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_matches('\'')
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
