//! Create/update and change-set option structures.

use super::api::{ChangeSetRequest, ChangeSetType, StackRequest};
use super::errors::{Result, StackError};
use super::parameters::{Parameters, Tags, Template};
use std::str::FromStr;

/// Capabilities acknowledged when the caller does not name any.
pub const DEFAULT_CAPABILITIES: &[&str] = &["CAPABILITY_NAMED_IAM"];

/// Change-set failure reasons that mean "nothing to change".
pub const EMPTY_CHANGE_SET_REASONS: &[&str] = &[
    "The submitted information didn't contain changes. Submit different information to create a change set.",
    "No updates are to be performed.",
];

/// What CloudFormation does when stack creation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Rollback,
    Delete,
    DoNothing,
}

impl OnFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnFailure::Rollback => "ROLLBACK",
            OnFailure::Delete => "DELETE",
            OnFailure::DoNothing => "DO_NOTHING",
        }
    }
}

impl FromStr for OnFailure {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "ROLLBACK" => Ok(OnFailure::Rollback),
            "DELETE" => Ok(OnFailure::Delete),
            "DO_NOTHING" => Ok(OnFailure::DoNothing),
            _ => Err(StackError::InvalidArgument(format!(
                "unknown on-failure action: {}",
                s
            ))),
        }
    }
}

/// A stack policy, inline or by S3 location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackPolicy {
    Body(String),
    Url(String),
}

impl StackPolicy {
    fn split(policy: Option<&StackPolicy>) -> (Option<String>, Option<String>) {
        match policy {
            Some(StackPolicy::Body(body)) => (Some(body.clone()), None),
            Some(StackPolicy::Url(url)) => (None, Some(url.clone())),
            None => (None, None),
        }
    }
}

/// Options for [`Stack::create_or_update`](super::stack::Stack::create_or_update).
#[derive(Debug, Clone, PartialEq)]
pub struct StackOptions {
    pub template: Option<Template>,
    pub use_previous_template: bool,
    pub parameters: Parameters,
    pub tags: Tags,
    /// `None` acknowledges [`DEFAULT_CAPABILITIES`].
    pub capabilities: Option<Vec<String>>,
    pub disable_rollback: Option<bool>,
    pub on_failure: Option<OnFailure>,
    pub stack_policy: Option<StackPolicy>,
    pub stack_policy_during_update: Option<StackPolicy>,
    pub timeout_in_minutes: Option<i32>,
    pub notification_arns: Vec<String>,
    pub role_arn: Option<String>,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            template: None,
            use_previous_template: false,
            parameters: Parameters::new(),
            tags: Tags::new(),
            capabilities: None,
            disable_rollback: None,
            on_failure: None,
            stack_policy: None,
            stack_policy_during_update: None,
            timeout_in_minutes: None,
            notification_arns: Vec::new(),
            role_arn: None,
        }
    }
}

impl StackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_use_previous_template(mut self, use_previous_template: bool) -> Self {
        self.use_previous_template = use_previous_template;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_disable_rollback(mut self, disable_rollback: bool) -> Self {
        self.disable_rollback = Some(disable_rollback);
        self
    }

    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = Some(on_failure);
        self
    }

    pub fn with_stack_policy(mut self, policy: StackPolicy) -> Self {
        self.stack_policy = Some(policy);
        self
    }

    pub fn with_stack_policy_during_update(mut self, policy: StackPolicy) -> Self {
        self.stack_policy_during_update = Some(policy);
        self
    }

    pub fn with_timeout_in_minutes(mut self, minutes: i32) -> Self {
        self.timeout_in_minutes = Some(minutes);
        self
    }

    pub fn with_notification_arn(mut self, arn: impl Into<String>) -> Self {
        self.notification_arns.push(arn.into());
        self
    }

    pub fn with_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.role_arn = Some(arn.into());
        self
    }

    /// Reject option combinations CloudFormation would refuse.
    pub fn validate(&self) -> Result<()> {
        if self.disable_rollback.is_some() && self.on_failure.is_some() {
            return Err(StackError::InvalidArgument(
                "disable_rollback and on_failure cannot be combined".to_string(),
            ));
        }
        if self.template.is_some() && self.use_previous_template {
            return Err(StackError::InvalidArgument(
                "a template and use_previous_template cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn effective_capabilities(&self) -> Vec<String> {
        effective_capabilities(self.capabilities.as_deref())
    }

    /// Request for `CreateStack`. A template is mandatory.
    pub(crate) fn create_request(&self, stack_name: &str) -> Result<StackRequest> {
        self.validate()?;
        let template = self.template.as_ref().ok_or_else(|| {
            StackError::InvalidArgument(format!("a template is required to create {}", stack_name))
        })?;
        let (stack_policy_body, stack_policy_url) = StackPolicy::split(self.stack_policy.as_ref());

        Ok(StackRequest {
            stack_name: stack_name.to_string(),
            template_body: template.body()?,
            template_url: template.url().map(str::to_string),
            use_previous_template: false,
            parameters: self.parameters.to_records(),
            tags: self.tags.to_records(),
            capabilities: self.effective_capabilities(),
            disable_rollback: self.disable_rollback,
            on_failure: self.on_failure,
            stack_policy_body,
            stack_policy_url,
            stack_policy_during_update_body: None,
            stack_policy_during_update_url: None,
            timeout_in_minutes: self.timeout_in_minutes,
            notification_arns: self.notification_arns.clone(),
            role_arn: self.role_arn.clone(),
        })
    }

    /// Request for `UpdateStack`. Without a template the previous one is reused.
    pub(crate) fn update_request(&self, stack: &str) -> Result<StackRequest> {
        self.validate()?;
        let (template_body, template_url) = match &self.template {
            Some(template) => (template.body()?, template.url().map(str::to_string)),
            None => (None, None),
        };
        let (stack_policy_body, stack_policy_url) = StackPolicy::split(self.stack_policy.as_ref());
        let (during_update_body, during_update_url) =
            StackPolicy::split(self.stack_policy_during_update.as_ref());

        Ok(StackRequest {
            stack_name: stack.to_string(),
            use_previous_template: self.template.is_none(),
            template_body,
            template_url,
            parameters: self.parameters.to_records(),
            tags: self.tags.to_records(),
            capabilities: self.effective_capabilities(),
            disable_rollback: self.disable_rollback,
            on_failure: None,
            stack_policy_body,
            stack_policy_url,
            stack_policy_during_update_body: during_update_body,
            stack_policy_during_update_url: during_update_url,
            timeout_in_minutes: None,
            notification_arns: self.notification_arns.clone(),
            role_arn: self.role_arn.clone(),
        })
    }
}

fn effective_capabilities(capabilities: Option<&[String]>) -> Vec<String> {
    match capabilities {
        Some(capabilities) => capabilities.to_vec(),
        None => DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
    }
}

/// Options for [`ChangeSet::create`](super::change_set::ChangeSet::create).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSetOptions {
    pub template: Option<Template>,
    pub use_previous_template: bool,
    pub parameters: Parameters,
    pub tags: Tags,
    /// `None` acknowledges [`DEFAULT_CAPABILITIES`].
    pub capabilities: Option<Vec<String>>,
    pub description: Option<String>,
    pub notification_arns: Vec<String>,
    pub resource_types: Vec<String>,
    pub role_arn: Option<String>,
    /// Delete an existing change-set of the same name first.
    pub force: bool,
    /// Treat "nothing to change" as success.
    pub allow_empty_change_set: bool,
}

impl ChangeSetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_use_previous_template(mut self, use_previous_template: bool) -> Self {
        self.use_previous_template = use_previous_template;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_resource_types<I, S>(mut self, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = resource_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_notification_arn(mut self, arn: impl Into<String>) -> Self {
        self.notification_arns.push(arn.into());
        self
    }

    pub fn with_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.role_arn = Some(arn.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_allow_empty_change_set(mut self, allow: bool) -> Self {
        self.allow_empty_change_set = allow;
        self
    }

    pub(crate) fn request(
        &self,
        stack_name: &str,
        change_set_name: &str,
        change_set_type: ChangeSetType,
    ) -> Result<ChangeSetRequest> {
        let (template_body, template_url) = match &self.template {
            Some(template) => (template.body()?, template.url().map(str::to_string)),
            None => (None, None),
        };
        if self.template.is_none() && change_set_type == ChangeSetType::Create {
            return Err(StackError::InvalidArgument(format!(
                "a template is required to create {}",
                stack_name
            )));
        }

        Ok(ChangeSetRequest {
            stack_name: stack_name.to_string(),
            change_set_name: change_set_name.to_string(),
            change_set_type,
            description: self.description.clone(),
            use_previous_template: self.use_previous_template || self.template.is_none(),
            template_body,
            template_url,
            parameters: self.parameters.to_records(),
            tags: self.tags.to_records(),
            capabilities: effective_capabilities(self.capabilities.as_deref()),
            notification_arns: self.notification_arns.clone(),
            resource_types: self.resource_types.clone(),
            role_arn: self.role_arn.clone(),
        })
    }
}

/// True when a change-set failed only because it would change nothing.
pub fn is_empty_change_set_reason(reason: &str) -> bool {
    EMPTY_CHANGE_SET_REASONS.contains(&reason)
}
