use crate::error::QueryError;
use crate::kubectl::ClusterQuery;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tokio::time::{Duration, timeout};

/// Lists namespaces and pods through the Kubernetes API instead of the CLI.
#[derive(Clone)]
pub struct KubeApiQuery {
    client: Client,
    timeout: Duration,
}

impl KubeApiQuery {
    pub async fn new(context: Option<String>, timeout: Duration) -> Result<Self> {
        let config = match Kubeconfig::read().ok() {
            Some(kubeconfig) => {
                let options = KubeConfigOptions {
                    context: context.clone(),
                    cluster: None,
                    user: None,
                };
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("failed to load Kubernetes configuration from kubeconfig")?
            }
            None => {
                if context.is_some() {
                    anyhow::bail!("kubeconfig not found; --kube-context cannot be applied");
                }
                Config::infer()
                    .await
                    .context("failed to infer Kubernetes configuration")?
            }
        };

        let client = Client::try_from(config).context("failed to create Kubernetes client")?;
        Ok(Self { client, timeout })
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, QueryError>
    where
        F: std::future::Future<Output = Result<T, kube::Error>>,
    {
        timeout(self.timeout, request)
            .await
            .map_err(|_| QueryError::TimedOut(self.timeout))?
            .map_err(QueryError::from)
    }

    /// Follows continue tokens so the result matches a full `kubectl get`.
    async fn list_names<K>(&self, api: &Api<K>) -> Result<Vec<String>, QueryError>
    where
        K: Resource + Clone + DeserializeOwned + Debug,
    {
        let mut names = Vec::new();
        let mut params = list_params(None);
        loop {
            let page = self.bounded(api.list(&params)).await?;
            names.extend(page.items.iter().map(|item| item.name_any()));
            match next_page(page.metadata.continue_) {
                Some(next) => params = next,
                None => return Ok(names),
            }
        }
    }
}

#[async_trait]
impl ClusterQuery for KubeApiQuery {
    async fn list_namespaces(&self) -> Result<Vec<String>, QueryError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        self.list_names(&api).await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<String>, QueryError> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(QueryError::EmptyNamespace);
        }
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        self.list_names(&api).await
    }
}

const PAGE_SIZE: u32 = 500;

fn list_params(continue_token: Option<&str>) -> ListParams {
    let params = ListParams::default().limit(PAGE_SIZE);
    match continue_token {
        Some(token) => params.continue_token(token),
        None => params,
    }
}

fn next_page(continue_token: Option<String>) -> Option<ListParams> {
    continue_token
        .filter(|token| !token.is_empty())
        .map(|token| list_params(Some(&token)))
}

#[cfg(test)]
mod tests {
    use super::{PAGE_SIZE, list_params, next_page};

    #[test]
    fn first_page_has_no_continue_token() {
        let params = list_params(None);
        assert_eq!(params.limit, Some(PAGE_SIZE));
        assert_eq!(params.continue_token, None);
    }

    #[test]
    fn continue_token_requests_the_next_page() {
        let params = next_page(Some("eyJ2IjoibWV0YSJ9".to_string())).unwrap();
        assert_eq!(params.continue_token.as_deref(), Some("eyJ2IjoibWV0YSJ9"));
        assert_eq!(params.limit, Some(PAGE_SIZE));
    }

    #[test]
    fn missing_or_empty_token_ends_paging() {
        assert!(next_page(None).is_none());
        assert!(next_page(Some(String::new())).is_none());
    }
}
