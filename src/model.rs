use crate::error::{ExecutionError, StateError};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Sub-resource that drills down into a per-pod menu for per-instance verbs.
pub const DRILL_DOWN_RESOURCE: &str = "pods";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Step {
    Command,
    SubCommand,
    Namespace,
    Pod,
}

impl Step {
    pub const ALL: [Self; 4] = [Self::Command, Self::SubCommand, Self::Namespace, Self::Pod];

    pub fn action_id(self) -> &'static str {
        match self {
            Self::Command => "kubectl_command_select",
            Self::SubCommand => "kubectl_sub_command_select",
            Self::Namespace => "kubectl_namespace_select",
            Self::Pod => "kubectl_pod_select",
        }
    }

    pub fn from_action_id(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.action_id() == tag)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::SubCommand => "sub-command",
            Self::Namespace => "namespace",
            Self::Pod => "pod",
        }
    }

    pub fn placeholder(self) -> String {
        format!("Select a {}", self.title())
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CatalogEntry {
    pub verb: String,
    pub resources: Vec<String>,
    pub per_instance: bool,
}

impl CatalogEntry {
    pub fn new(verb: &str, resources: &[&str], per_instance: bool) -> Self {
        Self {
            verb: verb.to_string(),
            resources: resources.iter().map(|value| value.to_string()).collect(),
            per_instance,
        }
    }
}

/// Verbs and the sub-resources each one accepts. Built once at startup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandCatalog {
    entries: Vec<CatalogEntry>,
}

impl CommandCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn verbs(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.verb.as_str())
    }

    pub fn resources(&self, verb: &str) -> &[String] {
        self.entry(verb)
            .map(|entry| entry.resources.as_slice())
            .unwrap_or(&[])
    }

    pub fn allows(&self, verb: &str, resource: &str) -> bool {
        self.resources(verb).iter().any(|known| known == resource)
    }

    pub fn is_per_instance(&self, verb: &str) -> bool {
        self.entry(verb).is_some_and(|entry| entry.per_instance)
    }

    /// Whether selecting a namespace should lead to a pod menu instead of execution.
    pub fn drills_down(&self, verb: &str, resource: &str) -> bool {
        resource == DRILL_DOWN_RESOURCE && self.is_per_instance(verb)
    }

    fn entry(&self, verb: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.verb == verb)
    }
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self::new(vec![
            CatalogEntry::new("get", &["pods", "nodes", "services"], false),
            CatalogEntry::new("describe", &["pods", "nodes", "services"], true),
            CatalogEntry::new("logs", &["pods"], true),
        ])
    }
}

/// In-progress selection for one conversation.
///
/// Fields are only ever filled in order (command, sub-command, namespace, pod);
/// the setters clear everything downstream of the field they write.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SelectionRecord {
    pub command: Option<String>,
    pub sub_command: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub offered_namespaces: Vec<String>,
    pub offered_pods: Vec<String>,
}

impl SelectionRecord {
    pub fn select_command(&mut self, command: impl Into<String>) {
        *self = Self {
            command: Some(command.into()),
            ..Self::default()
        };
    }

    pub fn select_sub_command(&mut self, sub_command: impl Into<String>) -> Result<(), StateError> {
        if self.command.is_none() {
            return Err(StateError::MissingField("command"));
        }
        self.sub_command = Some(sub_command.into());
        self.namespace = None;
        self.pod = None;
        self.offered_namespaces.clear();
        self.offered_pods.clear();
        Ok(())
    }

    pub fn select_namespace(&mut self, namespace: impl Into<String>) -> Result<(), StateError> {
        if self.sub_command.is_none() {
            return Err(StateError::MissingField("sub-command"));
        }
        self.namespace = Some(namespace.into());
        self.pod = None;
        self.offered_pods.clear();
        Ok(())
    }

    pub fn select_pod(&mut self, pod: impl Into<String>) -> Result<(), StateError> {
        if self.namespace.is_none() {
            return Err(StateError::MissingField("namespace"));
        }
        self.pod = Some(pod.into());
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MenuOption {
    pub label: String,
    pub value: String,
}

/// Labeled choices for one step, routed back through the step's action tag.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Menu {
    pub step: Step,
    pub prompt: String,
    pub options: Vec<MenuOption>,
}

impl Menu {
    pub fn new<I, S>(step: Step, prompt: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = values
            .into_iter()
            .map(|value| {
                let value = value.into();
                MenuOption {
                    label: value.clone(),
                    value,
                }
            })
            .collect();
        Self {
            step,
            prompt: prompt.into(),
            options,
        }
    }

    pub fn action_id(&self) -> &'static str {
        self.step.action_id()
    }

    pub fn values(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|option| option.value.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Arguments handed to the cluster CLI, without the binary itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandLine {
    args: Vec<String>,
}

impl CommandLine {
    pub fn listing(command: &str, sub_command: &str, namespace: &str) -> Self {
        Self::from_args([command, sub_command, "-n", namespace])
    }

    pub fn instance(command: &str, pod: &str, namespace: &str, per_instance: bool) -> Self {
        if per_instance {
            Self::from_args([command, pod, "-n", namespace])
        } else {
            Self::from_args([command, "pod", pod, "-n", namespace])
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn from_args<const N: usize>(args: [&str; N]) -> Self {
        Self {
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ExitInfo {
    Exited(i32),
    Signaled,
    TimedOut(Duration),
    SpawnFailed(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub exit: ExitInfo,
}

impl ExecutionResult {
    pub fn error(&self) -> Option<ExecutionError> {
        match &self.exit {
            ExitInfo::Exited(_) if self.success => None,
            ExitInfo::Exited(code) => Some(ExecutionError::NonZeroExit { code: Some(*code) }),
            ExitInfo::Signaled => Some(ExecutionError::NonZeroExit { code: None }),
            ExitInfo::TimedOut(after) => Some(ExecutionError::TimedOut { after: *after }),
            ExitInfo::SpawnFailed(reason) => Some(ExecutionError::Spawn(reason.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandCatalog, CommandLine, Menu, SelectionRecord, Step};
    use crate::error::StateError;

    #[test]
    fn action_ids_map_back_to_steps() {
        for step in Step::ALL {
            assert_eq!(Step::from_action_id(step.action_id()), Some(step));
        }
        assert_eq!(Step::from_action_id("kubectl_container_select"), None);
    }

    #[test]
    fn default_catalog_matches_builtin_verbs() {
        let catalog = CommandCatalog::default();
        assert_eq!(
            catalog.verbs().collect::<Vec<_>>(),
            vec!["get", "describe", "logs"]
        );
        assert_eq!(catalog.resources("logs"), ["pods".to_string()]);
        assert!(catalog.resources("delete").is_empty());
        assert!(catalog.drills_down("describe", "pods"));
        assert!(catalog.drills_down("logs", "pods"));
        assert!(!catalog.drills_down("get", "pods"));
        assert!(!catalog.drills_down("describe", "nodes"));
    }

    #[test]
    fn record_fields_fill_in_order() {
        let mut record = SelectionRecord::default();
        assert_eq!(
            record.select_pod("web-1"),
            Err(StateError::MissingField("namespace"))
        );
        assert_eq!(
            record.select_namespace("prod"),
            Err(StateError::MissingField("sub-command"))
        );
        assert_eq!(
            record.select_sub_command("pods"),
            Err(StateError::MissingField("command"))
        );

        record.select_command("logs");
        record.select_sub_command("pods").unwrap();
        record.select_namespace("prod").unwrap();
        record.select_pod("web-1").unwrap();
        assert_eq!(record.pod.as_deref(), Some("web-1"));
        assert_eq!(record.namespace.as_deref(), Some("prod"));
    }

    #[test]
    fn reselecting_a_field_clears_downstream_fields() {
        let mut record = SelectionRecord::default();
        record.select_command("describe");
        record.select_sub_command("pods").unwrap();
        record.select_namespace("prod").unwrap();
        record.offered_pods = vec!["web-1".to_string()];
        record.select_pod("web-1").unwrap();

        record.select_sub_command("nodes").unwrap();
        assert_eq!(record.namespace, None);
        assert_eq!(record.pod, None);
        assert!(record.offered_pods.is_empty());

        record.select_command("get");
        assert_eq!(record.sub_command, None);
    }

    #[test]
    fn command_lines_render_like_the_cli() {
        assert_eq!(
            CommandLine::listing("get", "services", "default").to_string(),
            "get services -n default"
        );
        assert_eq!(
            CommandLine::instance("logs", "web-1", "prod", true).to_string(),
            "logs web-1 -n prod"
        );
        assert_eq!(
            CommandLine::instance("get", "web-1", "prod", false).to_string(),
            "get pod web-1 -n prod"
        );
    }

    #[test]
    fn menu_values_follow_option_order() {
        let menu = Menu::new(Step::Namespace, "Please select a namespace:", ["b", "a"]);
        assert_eq!(menu.values(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(menu.action_id(), "kubectl_namespace_select");
    }
}
