//! The stack orchestrator.
//!
//! [`Stack`] decides between create, update and delete, drives the remote
//! operation, then polls until the stack settles, streaming each new stack
//! event to the registered handler along the way.
//!
//! While an operation runs, the stack is addressed by the id CloudFormation
//! assigned to it rather than by name, so a concurrent delete and re-create
//! under the same name cannot be mistaken for the operation in flight. The id
//! is dropped again when the operation ends, whatever its outcome.

use super::api::{ChangeSetSummary, CloudFormationApi, StackDescription, StackRequest};
use super::change_set::ChangeSet;
use super::errors::{Result, StackError};
use super::events::{EventWatcher, StackEvent};
use super::options::StackOptions;
use super::status::StackStatus;
use crate::app::source;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay between status polls while waiting for a stack to settle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Callback invoked once per newly observed stack event.
pub type EventHandler = Box<dyn Fn(&StackEvent) + Send + Sync>;

fn log_event(event: &StackEvent) {
    info!("{}", event.format_line());
}

/// The mutating call that starts an operation.
pub(crate) enum StackAction<'a> {
    Create(&'a StackRequest),
    Update(&'a StackRequest),
    Delete,
    CancelUpdate,
    ExecuteChangeSet(&'a str),
    /// Attach to whatever is already happening.
    Nothing,
}

/// Handle on one named stack.
pub struct Stack {
    name: String,
    client: Arc<dyn CloudFormationApi>,
    stack_id: Option<String>,
    poll_interval: Duration,
    event_handler: EventHandler,
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("stack_id", &self.stack_id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Stack {
    pub fn new(name: impl Into<String>, client: Arc<dyn CloudFormationApi>) -> Self {
        Self {
            name: name.into(),
            client,
            stack_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_handler: Box::new(log_event),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the event handler. The default logs each event at `info`.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: Fn(&StackEvent) + Send + Sync + 'static,
    {
        self.event_handler = Box::new(handler);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) fn client(&self) -> &dyn CloudFormationApi {
        self.client.as_ref()
    }

    /// Stack id while an operation is in flight, the name otherwise.
    fn identifier(&self) -> &str {
        self.stack_id.as_deref().unwrap_or(&self.name)
    }

    pub async fn describe(&self) -> Result<StackDescription> {
        Ok(self.client.describe_stack(self.identifier()).await?)
    }

    /// Current status; [`StackError::NoSuchStack`] if the stack is absent.
    pub async fn status(&self) -> Result<StackStatus> {
        Ok(self.describe().await?.status)
    }

    pub async fn exists(&self) -> Result<bool> {
        match self.status().await {
            Ok(_) => Ok(true),
            Err(StackError::NoSuchStack) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Bring the stack in line with `options`.
    ///
    /// Returns the final status, or `None` when the stack already matched and
    /// no update was required. An absent stack is created. A stack left in
    /// `CREATE_FAILED` or `ROLLBACK_COMPLETE` is deleted and then created,
    /// since CloudFormation cannot update it in place.
    pub async fn create_or_update(&mut self, options: &StackOptions) -> Result<Option<StackStatus>> {
        options.validate()?;

        match self.status().await {
            Err(StackError::NoSuchStack) => {
                debug!("Stack {} does not exist, creating it", self.name);
                return self.create(options).await.map(Some);
            }
            Err(err) => return Err(err),
            Ok(status) if status.requires_replacement() => {
                warn!(
                    "Stack {} is {} and cannot be updated, deleting it first",
                    self.name, status
                );
                self.delete().await?;
                return self.create(options).await.map(Some);
            }
            Ok(_) => {}
        }

        match self.update(options).await {
            Ok(status) => Ok(Some(status)),
            Err(StackError::NoUpdateRequired) => {
                info!("No updates are required for stack {}", self.name);
                Ok(None)
            }
            Err(StackError::NoSuchStack) => {
                debug!("Stack {} disappeared before update, creating it", self.name);
                self.create(options).await.map(Some)
            }
            Err(err) => Err(err),
        }
    }

    /// Create the stack and wait for `CREATE_COMPLETE`.
    pub async fn create(&mut self, options: &StackOptions) -> Result<StackStatus> {
        let request = options.create_request(&self.name)?;
        info!("Creating stack {}", self.name);
        let status = self.modify_stack(StackAction::Create(&request)).await?;
        expect_status(status, "stack creation", |s| *s == StackStatus::CreateComplete)
    }

    /// Update the stack and wait for `UPDATE_COMPLETE`.
    pub async fn update(&mut self, options: &StackOptions) -> Result<StackStatus> {
        let request = options.update_request(&self.name)?;
        info!("Updating stack {}", self.name);
        let status = self.modify_stack(StackAction::Update(&request)).await?;
        expect_status(status, "stack update", |s| *s == StackStatus::UpdateComplete)
    }

    /// Delete the stack and wait for it to go away.
    ///
    /// Returns `None` if there was nothing to delete.
    pub async fn delete(&mut self) -> Result<Option<StackStatus>> {
        let description = match self.describe().await {
            Ok(description) => description,
            Err(StackError::NoSuchStack) => {
                debug!("Stack {} does not exist, nothing to delete", self.name);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        info!("Deleting stack {}", self.name);
        self.stack_id = description.stack_id;
        let status = self.modify_stack(StackAction::Delete).await?;
        match status {
            None | Some(StackStatus::DeleteComplete) => Ok(Some(StackStatus::DeleteComplete)),
            Some(other) => {
                error!("Deletion of stack {} ended in {}", self.name, other);
                Err(StackError::StackUpdate(format!(
                    "stack deletion failed: {}",
                    other
                )))
            }
        }
    }

    /// Cancel an update in progress and wait for the rollback to finish.
    ///
    /// Returns `None` if the stack was not in a cancellable state.
    pub async fn cancel_update(&mut self) -> Result<Option<StackStatus>> {
        let description = self.describe().await?;
        self.stack_id = description.stack_id;

        info!("Cancelling update of stack {}", self.name);
        match self.modify_stack(StackAction::CancelUpdate).await {
            Ok(status) => expect_status(status, "update cancellation", StackStatus::is_complete)
                .map(Some),
            Err(StackError::InvalidState(message)) => {
                info!("Nothing to cancel for stack {}: {}", self.name, message);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Wait for any operation already in progress to settle.
    ///
    /// Returns the settled status, or `None` if the stack does not exist.
    pub async fn wait(&mut self) -> Result<Option<StackStatus>> {
        self.modify_stack(StackAction::Nothing).await
    }

    /// Template body exactly as CloudFormation returns it.
    pub async fn template_body(&self) -> Result<String> {
        Ok(self.client.get_template(self.identifier()).await?)
    }

    /// Template parsed into structured data.
    pub async fn template(&self) -> Result<serde_json::Value> {
        let body = self.template_body().await?;
        Ok(source::parse_document(&self.name, &body)?)
    }

    pub async fn parameters(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.describe().await?.parameter_map())
    }

    pub async fn tags(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.describe().await?.tag_map())
    }

    pub async fn outputs(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.describe().await?.output_map())
    }

    /// Logical resource id → physical resource id.
    pub async fn resources(&self) -> Result<BTreeMap<String, Option<String>>> {
        Ok(self
            .client
            .list_stack_resources(self.identifier())
            .await?
            .into_iter()
            .map(|r| (r.logical_id, r.physical_id))
            .collect())
    }

    /// Full event history, oldest first.
    pub async fn events(&self) -> Result<Vec<StackEvent>> {
        if !self.exists().await? {
            return Err(StackError::NoSuchStack);
        }
        EventWatcher::new()
            .drain_new_events(self.client(), self.identifier())
            .await
    }

    pub fn change_set(&mut self, name: impl Into<String>) -> ChangeSet<'_> {
        ChangeSet::new(name, self)
    }

    pub async fn change_sets(&self) -> Result<Vec<ChangeSetSummary>> {
        Ok(self.client.list_change_sets(self.identifier()).await?)
    }

    /// Run `action` and wait for the stack to settle.
    ///
    /// Returns the settled status, `None` if the stack is gone. The captured
    /// stack id is cleared on every exit path.
    pub(crate) async fn modify_stack(
        &mut self,
        action: StackAction<'_>,
    ) -> Result<Option<StackStatus>> {
        let result = self.run_action(action).await;
        self.stack_id = None;
        result
    }

    async fn run_action(&mut self, action: StackAction<'_>) -> Result<Option<StackStatus>> {
        let mut watcher = EventWatcher::new();
        watcher
            .mark_all_seen(self.client.as_ref(), self.identifier())
            .await?;

        match action {
            StackAction::Create(request) => {
                let stack_id = self.client.create_stack(request).await?;
                self.capture_id(stack_id);
            }
            StackAction::Update(request) => {
                let stack_id = self.client.update_stack(request).await?;
                self.capture_id(stack_id);
            }
            StackAction::Delete => self.client.delete_stack(self.identifier()).await?,
            StackAction::CancelUpdate => self.client.cancel_update_stack(self.identifier()).await?,
            StackAction::ExecuteChangeSet(change_set) => {
                self.client
                    .execute_change_set(self.identifier(), change_set)
                    .await?
            }
            StackAction::Nothing => {}
        }

        self.wait_for_stability(&mut watcher).await
    }

    fn capture_id(&mut self, stack_id: String) {
        if !stack_id.is_empty() {
            debug!("Stack {} has id {}", self.name, stack_id);
            self.stack_id = Some(stack_id);
        }
    }

    async fn wait_for_stability(&self, watcher: &mut EventWatcher) -> Result<Option<StackStatus>> {
        loop {
            self.report_events(watcher).await?;

            let status = match self.status().await {
                Ok(status) => Some(status),
                Err(StackError::NoSuchStack) => None,
                Err(err) => return Err(err),
            };

            match status {
                Some(status) if !status.is_terminal() => {
                    debug!("Stack {} is {}, polling again", self.name, status);
                    tokio::time::sleep(self.poll_interval).await;
                }
                settled => {
                    self.report_events(watcher).await?;
                    match &settled {
                        Some(status) => info!("Stack {} settled in {}", self.name, status),
                        None => info!("Stack {} no longer exists", self.name),
                    }
                    return Ok(settled);
                }
            }
        }
    }

    async fn report_events(&self, watcher: &mut EventWatcher) -> Result<()> {
        let events = watcher
            .drain_new_events(self.client.as_ref(), self.identifier())
            .await?;
        for event in &events {
            (self.event_handler)(event);
        }
        Ok(())
    }
}

/// Check a settled status against the operation's success predicate.
pub(crate) fn expect_status(
    status: Option<StackStatus>,
    operation: &str,
    accept: impl Fn(&StackStatus) -> bool,
) -> Result<StackStatus> {
    match status {
        Some(status) if accept(&status) => Ok(status),
        Some(status) => {
            error!("{} ended in {}", operation, status);
            Err(StackError::StackUpdate(format!(
                "{} failed: {}",
                operation, status
            )))
        }
        None => {
            error!("{} ended with the stack gone", operation);
            Err(StackError::StackUpdate(format!(
                "{} failed: stack does not exist",
                operation
            )))
        }
    }
}
