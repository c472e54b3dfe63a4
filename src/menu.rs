use crate::kubectl::ClusterQuery;
use crate::model::{CommandCatalog, Menu, Step};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct MenuBuilder {
    catalog: Arc<CommandCatalog>,
    query: Arc<dyn ClusterQuery>,
}

impl MenuBuilder {
    pub fn new(catalog: Arc<CommandCatalog>, query: Arc<dyn ClusterQuery>) -> Self {
        Self { catalog, query }
    }

    pub fn top_level(&self, user_id: &str) -> Menu {
        Menu::new(
            Step::Command,
            format!("Hello <@{user_id}>! Please select a kubectl command:"),
            self.catalog.verbs(),
        )
    }

    pub fn sub_commands(&self, command: &str) -> Menu {
        Menu::new(
            Step::SubCommand,
            "Please select a sub-command:",
            self.catalog.resources(command).iter().cloned(),
        )
    }

    pub async fn namespaces(&self) -> Menu {
        let namespaces = match self.query.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(error) => {
                warn!("namespace listing failed: {error}");
                Vec::new()
            }
        };
        Menu::new(Step::Namespace, "Please select a namespace:", namespaces)
    }

    pub async fn pods(&self, namespace: &str) -> Menu {
        let pods = match self.query.list_pods(namespace).await {
            Ok(pods) => pods,
            Err(error) => {
                warn!("pod listing failed for namespace {namespace}: {error}");
                Vec::new()
            }
        };
        Menu::new(Step::Pod, "Please select a pod:", pods)
    }
}
