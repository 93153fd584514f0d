//! Named, previewable change-sets on a stack.

use super::api::{ChangeSetDescription, ChangeSetType};
use super::errors::{Result, StackError};
use super::options::{is_empty_change_set_reason, ChangeSetOptions};
use super::stack::{expect_status, Stack, StackAction};
use super::status::{ChangeSetStatus, StackStatus};
use tracing::{debug, error, info};

/// Outcome of [`ChangeSet::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetCreation {
    /// The change-set is ready to execute.
    Complete(ChangeSetStatus),
    /// Nothing would change; carries CloudFormation's explanation.
    NoChanges(String),
}

/// Handle on one change-set of a [`Stack`].
#[derive(Debug)]
pub struct ChangeSet<'a> {
    name: String,
    stack: &'a mut Stack,
}

impl<'a> ChangeSet<'a> {
    pub(crate) fn new(name: impl Into<String>, stack: &'a mut Stack) -> Self {
        Self {
            name: name.into(),
            stack,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the change-set and wait until CloudFormation has computed it.
    ///
    /// A stack that does not exist yet (or only exists as the placeholder of
    /// an earlier, unexecuted create change-set) gets a `CREATE` change-set,
    /// anything else an `UPDATE` one.
    pub async fn create(&mut self, options: &ChangeSetOptions) -> Result<ChangeSetCreation> {
        let change_set_type = match self.stack.status().await {
            Ok(StackStatus::ReviewInProgress) | Err(StackError::NoSuchStack) => {
                ChangeSetType::Create
            }
            Ok(_) => ChangeSetType::Update,
            Err(err) => return Err(err),
        };

        if options.force {
            self.delete().await?;
        }

        let request = options.request(self.stack.name(), &self.name, change_set_type)?;
        info!(
            "Creating {} change-set {} for stack {}",
            change_set_type.as_str(),
            self.name,
            self.stack.name()
        );
        self.stack.client().create_change_set(&request).await?;

        let description = loop {
            let description = self.describe().await?;
            if description.status.is_terminal() {
                break description;
            }
            debug!("Change-set {} is {}, polling again", self.name, description.status);
            tokio::time::sleep(self.stack.poll_interval()).await;
        };

        if description.status.is_failed() {
            let reason = description.status_reason.unwrap_or_default();
            if options.allow_empty_change_set && is_empty_change_set_reason(&reason) {
                info!("Change-set {} contains no changes", self.name);
                return Ok(ChangeSetCreation::NoChanges(reason));
            }
            error!("Change-set {} failed: {}", self.name, reason);
            return Err(StackError::StackUpdate(format!(
                "change-set creation failed: {}",
                reason
            )));
        }

        info!("Change-set {} is {}", self.name, description.status);
        Ok(ChangeSetCreation::Complete(description.status))
    }

    /// Apply the change-set and wait for the stack to settle.
    pub async fn execute(&mut self) -> Result<StackStatus> {
        info!(
            "Executing change-set {} on stack {}",
            self.name,
            self.stack.name()
        );
        let status = self
            .stack
            .modify_stack(StackAction::ExecuteChangeSet(&self.name))
            .await?;
        expect_status(status, "change-set execution", |s| {
            matches!(s, StackStatus::CreateComplete | StackStatus::UpdateComplete)
        })
    }

    /// Delete the change-set. Deleting one that does not exist is not an error.
    pub async fn delete(&mut self) -> Result<()> {
        match self
            .stack
            .client()
            .delete_change_set(self.stack.name(), &self.name)
            .await
        {
            Ok(()) => {
                debug!("Deleted change-set {}", self.name);
                Ok(())
            }
            Err(err) => match StackError::from(err) {
                StackError::NoSuchChangeSet | StackError::NoSuchStack => {
                    debug!("Change-set {} does not exist, nothing to delete", self.name);
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    pub async fn describe(&self) -> Result<ChangeSetDescription> {
        Ok(self
            .stack
            .client()
            .describe_change_set(self.stack.name(), &self.name)
            .await?)
    }

    pub async fn status(&self) -> Result<ChangeSetStatus> {
        Ok(self.describe().await?.status)
    }
}
