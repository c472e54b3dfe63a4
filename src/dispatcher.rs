use crate::error::StateError;
use crate::executor::{CommandRunner, render_result};
use crate::menu::MenuBuilder;
use crate::model::{CommandCatalog, CommandLine, Menu, SelectionRecord, Step};
use crate::slack::{MentionEvent, Messenger};
use crate::store::SelectionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One selection made from a previously posted menu.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Interaction {
    pub channel: String,
    pub user: String,
    pub action_id: String,
    pub value: Option<String>,
}

enum StepOutcome {
    Menu(Menu),
    Execute(CommandLine),
}

/// Drives a conversation from command selection to execution.
pub struct Dispatcher {
    catalog: Arc<CommandCatalog>,
    store: SelectionStore,
    menus: MenuBuilder,
    runner: Arc<dyn CommandRunner>,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<CommandCatalog>,
        menus: MenuBuilder,
        runner: Arc<dyn CommandRunner>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            catalog,
            store: SelectionStore::new(),
            menus,
            runner,
            messenger,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &SelectionStore {
        &self.store
    }

    pub async fn handle_mention(&self, event: &MentionEvent) {
        if let Some(subtype) = &event.subtype {
            debug!("ignoring mention with subtype {subtype} in {}", event.channel);
            return;
        }
        let Some(user) = event.user.as_deref() else {
            debug!("ignoring mention without a user in {}", event.channel);
            return;
        };
        debug!("mention in {}: {:?}", event.channel, event.text);

        self.store
            .update(&event.channel, SelectionRecord::reset)
            .await;
        let menu = self.menus.top_level(user);
        info!("starting selection flow in {} for {user}", event.channel);
        self.post_menu(&event.channel, &menu).await;
    }

    pub async fn handle_interaction(&self, interaction: Interaction) {
        let Some(step) = Step::from_action_id(&interaction.action_id) else {
            debug!(
                "ignoring unknown action {} in {}",
                interaction.action_id, interaction.channel
            );
            return;
        };
        let Some(value) = interaction.value.as_deref() else {
            debug!("ignoring {step} action without a selected option");
            return;
        };
        let channel = interaction.channel.as_str();

        let mut record = self.store.lock(channel).await;
        debug!("{} selected {step} {value} in {channel}", interaction.user);
        let outcome = match step {
            Step::Command => Ok(self.on_command(&mut record, value)),
            Step::SubCommand => self.on_sub_command(&mut record, value).await,
            Step::Namespace => self.on_namespace(&mut record, value).await,
            Step::Pod => self.on_pod(&mut record, value),
        };

        match outcome {
            Ok(StepOutcome::Menu(menu)) => self.post_menu(channel, &menu).await,
            Ok(StepOutcome::Execute(line)) => {
                record.reset();
                self.execute(channel, &line).await;
            }
            Err(error) => {
                warn!("{step} selection rejected in {channel}: {error}");
                record.reset();
                self.post_text(channel, error.user_message()).await;
            }
        }
    }

    /// Runs `line` and reports the outcome to `channel`, whatever it is.
    async fn execute(&self, channel: &str, line: &CommandLine) {
        let shown = self.runner.display(line);
        info!("running `{shown}` for {channel}");
        let result = self.runner.run(line).await;
        if let Some(error) = result.error() {
            warn!("`{shown}` failed: {error}");
        }
        self.post_text(channel, &render_result(&shown, &result))
            .await;
    }

    fn on_command(&self, record: &mut SelectionRecord, command: &str) -> StepOutcome {
        record.select_command(command);
        StepOutcome::Menu(self.menus.sub_commands(command))
    }

    async fn on_sub_command(
        &self,
        record: &mut SelectionRecord,
        sub_command: &str,
    ) -> Result<StepOutcome, StateError> {
        let command = record
            .command
            .clone()
            .ok_or(StateError::MissingField("command"))?;
        if !self.catalog.allows(&command, sub_command) {
            return Err(rejected(Step::SubCommand, sub_command));
        }
        record.select_sub_command(sub_command)?;

        let menu = self.menus.namespaces().await;
        record.offered_namespaces = menu.values();
        Ok(StepOutcome::Menu(menu))
    }

    async fn on_namespace(
        &self,
        record: &mut SelectionRecord,
        namespace: &str,
    ) -> Result<StepOutcome, StateError> {
        let command = record
            .command
            .clone()
            .ok_or(StateError::MissingField("command"))?;
        let sub_command = record
            .sub_command
            .clone()
            .ok_or(StateError::MissingField("sub-command"))?;
        if !record.offered_namespaces.iter().any(|known| known == namespace) {
            return Err(rejected(Step::Namespace, namespace));
        }
        record.select_namespace(namespace)?;

        if self.catalog.drills_down(&command, &sub_command) {
            let menu = self.menus.pods(namespace).await;
            record.offered_pods = menu.values();
            return Ok(StepOutcome::Menu(menu));
        }
        Ok(StepOutcome::Execute(CommandLine::listing(
            &command,
            &sub_command,
            namespace,
        )))
    }

    fn on_pod(&self, record: &mut SelectionRecord, pod: &str) -> Result<StepOutcome, StateError> {
        let namespace = record
            .namespace
            .clone()
            .ok_or(StateError::MissingField("namespace"))?;
        let command = record
            .command
            .clone()
            .ok_or(StateError::MissingField("command"))?;
        if !record.offered_pods.iter().any(|known| known == pod) {
            return Err(rejected(Step::Pod, pod));
        }
        record.select_pod(pod)?;

        Ok(StepOutcome::Execute(CommandLine::instance(
            &command,
            pod,
            &namespace,
            self.catalog.is_per_instance(&command),
        )))
    }

    async fn post_menu(&self, channel: &str, menu: &Menu) {
        if menu.is_empty() {
            debug!("posting empty {} menu to {channel}", menu.step);
        }
        if let Err(error) = self.messenger.post_menu(channel, menu).await {
            warn!("failed to post {} menu to {channel}: {error}", menu.step);
        }
    }

    async fn post_text(&self, channel: &str, text: &str) {
        if let Err(error) = self.messenger.post_text(channel, text).await {
            warn!("failed to post message to {channel}: {error}");
        }
    }
}

fn rejected(step: Step, value: &str) -> StateError {
    StateError::RejectedValue {
        step,
        value: value.to_string(),
    }
}
