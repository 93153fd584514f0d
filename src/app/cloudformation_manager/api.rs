//! The remote CloudFormation surface the orchestrator drives.
//!
//! [`CloudFormationApi`] is the seam between lifecycle logic and the AWS
//! SDK. The production implementation lives in
//! [`aws_client`](super::aws_client); tests substitute a scripted fake. All
//! methods report raw [`ApiError`]s; translation into
//! [`StackError`](super::errors::StackError) happens on the caller's side.

use super::errors::ApiError;
use super::events::StackEvent;
use super::options::OnFailure;
use super::parameters::{ParameterRecord, Tag};
use super::status::{ChangeSetStatus, StackStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One entry of a stack's `Outputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub export_name: Option<String>,
}

/// Snapshot of a stack as returned by `DescribeStacks`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackDescription {
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    pub description: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub last_updated_time: Option<DateTime<Utc>>,
    pub parameters: Vec<ParameterRecord>,
    pub tags: Vec<Tag>,
    pub outputs: Vec<StackOutput>,
}

impl StackDescription {
    /// A description carrying only a name and status.
    pub fn new(stack_name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            stack_id: None,
            stack_name: stack_name.into(),
            status,
            status_reason: None,
            description: None,
            creation_time: None,
            last_updated_time: None,
            parameters: Vec::new(),
            tags: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Parameter key → value; values CloudFormation withholds map to "".
    pub fn parameter_map(&self) -> BTreeMap<String, String> {
        self.parameters
            .iter()
            .map(|p| (p.key.clone(), p.value.clone().unwrap_or_default()))
            .collect()
    }

    pub fn tag_map(&self) -> BTreeMap<String, String> {
        self.tags
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect()
    }

    pub fn output_map(&self) -> BTreeMap<String, String> {
        self.outputs
            .iter()
            .map(|o| (o.key.clone(), o.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResourceSummary {
    pub logical_id: String,
    pub physical_id: Option<String>,
    pub resource_type: String,
    pub status: String,
}

/// One page of `DescribeStackEvents`, newest event first.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<StackEvent>,
    pub next_token: Option<String>,
}

/// Fully resolved arguments for `CreateStack` / `UpdateStack`.
///
/// Fields that do not apply to the call being made are ignored by the client
/// (`on_failure` and `timeout_in_minutes` only exist on create,
/// `use_previous_template` and the during-update policy only on update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub use_previous_template: bool,
    pub parameters: Vec<ParameterRecord>,
    pub tags: Vec<Tag>,
    pub capabilities: Vec<String>,
    pub disable_rollback: Option<bool>,
    pub on_failure: Option<OnFailure>,
    pub stack_policy_body: Option<String>,
    pub stack_policy_url: Option<String>,
    pub stack_policy_during_update_body: Option<String>,
    pub stack_policy_during_update_url: Option<String>,
    pub timeout_in_minutes: Option<i32>,
    pub notification_arns: Vec<String>,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetType {
    Create,
    Update,
}

impl ChangeSetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetType::Create => "CREATE",
            ChangeSetType::Update => "UPDATE",
        }
    }
}

/// Fully resolved arguments for `CreateChangeSet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSetRequest {
    pub stack_name: String,
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
    pub description: Option<String>,
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub use_previous_template: bool,
    pub parameters: Vec<ParameterRecord>,
    pub tags: Vec<Tag>,
    pub capabilities: Vec<String>,
    pub notification_arns: Vec<String>,
    pub resource_types: Vec<String>,
    pub role_arn: Option<String>,
}

/// A single planned resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceChange {
    pub action: String,
    pub logical_id: String,
    pub physical_id: Option<String>,
    pub resource_type: String,
    pub replacement: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSetDescription {
    pub change_set_id: Option<String>,
    pub change_set_name: String,
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub status: ChangeSetStatus,
    pub status_reason: Option<String>,
    pub execution_status: Option<String>,
    pub changes: Vec<ResourceChange>,
}

impl ChangeSetDescription {
    pub fn new(
        stack_name: impl Into<String>,
        change_set_name: impl Into<String>,
        status: ChangeSetStatus,
    ) -> Self {
        Self {
            change_set_id: None,
            change_set_name: change_set_name.into(),
            stack_id: None,
            stack_name: stack_name.into(),
            status,
            status_reason: None,
            execution_status: None,
            changes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetSummary {
    pub change_set_id: Option<String>,
    pub change_set_name: String,
    pub status: String,
    pub execution_status: Option<String>,
    pub status_reason: Option<String>,
}

/// Remote CloudFormation operations.
///
/// `stack` arguments accept either a stack name or a stack id.
#[async_trait]
pub trait CloudFormationApi: Send + Sync {
    /// Describe one stack. An unknown stack is reported the way the provider
    /// does it: a `ValidationError` saying `Stack with id ... does not exist`.
    async fn describe_stack(&self, stack: &str) -> ApiResult<StackDescription>;

    /// Names of all stacks that have not been deleted.
    async fn list_stack_names(&self) -> ApiResult<Vec<String>>;

    /// Returns the new stack id.
    async fn create_stack(&self, request: &StackRequest) -> ApiResult<String>;

    /// Returns the stack id.
    async fn update_stack(&self, request: &StackRequest) -> ApiResult<String>;

    async fn delete_stack(&self, stack: &str) -> ApiResult<()>;

    async fn cancel_update_stack(&self, stack: &str) -> ApiResult<()>;

    /// One page of events, newest first. Pass the previous page's
    /// `next_token` to continue.
    async fn describe_stack_events(
        &self,
        stack: &str,
        next_token: Option<String>,
    ) -> ApiResult<EventPage>;

    async fn list_stack_resources(&self, stack: &str) -> ApiResult<Vec<StackResourceSummary>>;

    /// The template body as originally submitted.
    async fn get_template(&self, stack: &str) -> ApiResult<String>;

    /// Returns the change-set id.
    async fn create_change_set(&self, request: &ChangeSetRequest) -> ApiResult<String>;

    async fn describe_change_set(
        &self,
        stack: &str,
        change_set: &str,
    ) -> ApiResult<ChangeSetDescription>;

    async fn execute_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()>;

    async fn delete_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()>;

    async fn list_change_sets(&self, stack: &str) -> ApiResult<Vec<ChangeSetSummary>>;
}
