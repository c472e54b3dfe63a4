mod cli;
mod config;
mod dispatcher;
mod error;
mod executor;
mod k8s;
mod kubectl;
mod menu;
mod model;
mod server;
mod slack;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CliArgs, QueryBackend};
use config::Secrets;
use dispatcher::Dispatcher;
use executor::KubectlRunner;
use k8s::KubeApiQuery;
use kubectl::{ClusterQuery, KubectlQuery};
use menu::MenuBuilder;
use server::AppState;
use slack::SlackClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let secrets = Secrets::from_env()?;
    let snapshot = config::load_catalog()?;
    match &snapshot.source {
        Some(source) => info!("loaded command catalog from {source}"),
        None => info!("using built-in command catalog"),
    }
    let catalog = Arc::new(snapshot.catalog);

    let query_timeout = Duration::from_secs(args.query_timeout_secs.max(1));
    let query: Arc<dyn ClusterQuery> = match args.query_backend {
        QueryBackend::Kubectl => Arc::new(KubectlQuery::new(
            args.kubectl.clone(),
            args.kube_context.clone(),
            query_timeout,
        )),
        QueryBackend::Api => {
            Arc::new(KubeApiQuery::new(args.kube_context.clone(), query_timeout).await?)
        }
    };
    let runner = Arc::new(KubectlRunner::new(
        args.kubectl.clone(),
        args.kube_context.clone(),
        Duration::from_secs(args.command_timeout_secs.max(1)),
    ));
    let messenger = Arc::new(SlackClient::new(&args.slack_api_base, &secrets.bot_token)?);

    let dispatcher = Dispatcher::new(
        catalog.clone(),
        MenuBuilder::new(catalog, query),
        runner,
        messenger,
    );
    let router = server::build_router(AppState::new(dispatcher, secrets));

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("kubechat listening on {}", args.bind);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server failed")?;

    Ok(())
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
