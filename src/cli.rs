use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum QueryBackend {
    /// Shell out to the kubectl binary
    Kubectl,
    /// Use the Kubernetes API directly
    Api,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubechat",
    version,
    about = "Slack bot that builds and runs kubectl inspection commands from menus."
)]
pub struct CliArgs {
    /// Address the webhook server listens on
    #[arg(long, env = "KUBECHAT_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// kubectl binary used for listings and commands
    #[arg(long, env = "KUBECHAT_KUBECTL", default_value = "kubectl")]
    pub kubectl: String,

    /// kubeconfig context to run against
    #[arg(long, env = "KUBECHAT_KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// How namespace and pod menus are populated
    #[arg(long, env = "KUBECHAT_QUERY_BACKEND", value_enum, default_value_t = QueryBackend::Kubectl)]
    pub query_backend: QueryBackend,

    /// Timeout for namespace/pod listings in seconds
    #[arg(long, env = "KUBECHAT_QUERY_TIMEOUT_SECS", default_value_t = 10)]
    pub query_timeout_secs: u64,

    /// Timeout for the selected command in seconds
    #[arg(long, env = "KUBECHAT_COMMAND_TIMEOUT_SECS", default_value_t = 30)]
    pub command_timeout_secs: u64,

    /// Slack Web API base url
    #[arg(long, env = "KUBECHAT_SLACK_API_BASE", default_value = "https://slack.com/api")]
    pub slack_api_base: String,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, env = "KUBECHAT_LOG_FILTER", default_value = "info")]
    pub log_filter: String,
}
