//! [`CloudFormationApi`] backed by the AWS SDK.

use super::api::{
    ApiResult, ChangeSetDescription, ChangeSetRequest, ChangeSetSummary, CloudFormationApi,
    EventPage, ResourceChange, StackDescription, StackOutput, StackRequest, StackResourceSummary,
};
use super::errors::ApiError;
use super::events::StackEvent;
use super::parameters::{ParameterRecord, Tag};
use async_trait::async_trait;
use aws_sdk_cloudformation as cfn;
use aws_sdk_cloudformation::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// Thin adapter from the SDK client to the orchestrator's API seam.
#[derive(Clone, Debug)]
pub struct AwsCloudFormation {
    client: cfn::Client,
}

impl AwsCloudFormation {
    pub fn new(client: cfn::Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_types::SdkConfig) -> Self {
        Self::new(cfn::Client::new(config))
    }
}

/// Collapse an SDK failure into the provider's `code: message` pair.
///
/// Transport failures carry no error code; they are reported with the full
/// error chain as the message.
fn api_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => ApiError::new(code, err.message().unwrap_or_default()),
        None => ApiError::new("SdkError", DisplayErrorContext(&err).to_string()),
    }
}

pub(crate) fn to_chrono(time: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn sdk_parameters(records: &[ParameterRecord]) -> Option<Vec<cfn::types::Parameter>> {
    if records.is_empty() {
        return None;
    }
    Some(
        records
            .iter()
            .map(|record| {
                let builder = cfn::types::Parameter::builder().parameter_key(&record.key);
                if record.use_previous_value {
                    builder.use_previous_value(true).build()
                } else {
                    builder.set_parameter_value(record.value.clone()).build()
                }
            })
            .collect(),
    )
}

fn sdk_tags(tags: &[Tag]) -> Option<Vec<cfn::types::Tag>> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|tag| cfn::types::Tag::builder().key(&tag.key).value(&tag.value).build())
            .collect(),
    )
}

fn sdk_capabilities(capabilities: &[String]) -> Option<Vec<cfn::types::Capability>> {
    if capabilities.is_empty() {
        return None;
    }
    Some(
        capabilities
            .iter()
            .map(|c| cfn::types::Capability::from(c.as_str()))
            .collect(),
    )
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn stack_description(stack: &cfn::types::Stack) -> StackDescription {
    StackDescription {
        stack_id: stack.stack_id().map(str::to_string),
        stack_name: stack.stack_name().unwrap_or_default().to_string(),
        status: stack
            .stack_status()
            .map(|s| s.as_str())
            .unwrap_or_default()
            .into(),
        status_reason: stack.stack_status_reason().map(str::to_string),
        description: stack.description().map(str::to_string),
        creation_time: stack.creation_time().and_then(to_chrono),
        last_updated_time: stack.last_updated_time().and_then(to_chrono),
        parameters: stack
            .parameters()
            .iter()
            .map(|p| ParameterRecord {
                key: p.parameter_key().unwrap_or_default().to_string(),
                value: p.parameter_value().map(str::to_string),
                use_previous_value: p.use_previous_value().unwrap_or(false),
            })
            .collect(),
        tags: stack
            .tags()
            .iter()
            .map(|t| Tag {
                key: t.key().unwrap_or_default().to_string(),
                value: t.value().unwrap_or_default().to_string(),
            })
            .collect(),
        outputs: stack
            .outputs()
            .iter()
            .map(|o| StackOutput {
                key: o.output_key().unwrap_or_default().to_string(),
                value: o.output_value().unwrap_or_default().to_string(),
                description: o.description().map(str::to_string),
                export_name: o.export_name().map(str::to_string),
            })
            .collect(),
    }
}

fn resource_change(change: &cfn::types::ResourceChange) -> ResourceChange {
    ResourceChange {
        action: change
            .action()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default(),
        logical_id: change.logical_resource_id().unwrap_or_default().to_string(),
        physical_id: change.physical_resource_id().map(str::to_string),
        resource_type: change.resource_type().unwrap_or_default().to_string(),
        replacement: change.replacement().map(|r| r.as_str().to_string()),
    }
}

#[async_trait]
impl CloudFormationApi for AwsCloudFormation {
    async fn describe_stack(&self, stack: &str) -> ApiResult<StackDescription> {
        trace!("DescribeStacks {}", stack);
        let response = self
            .client
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(api_error)?;

        response
            .stacks()
            .first()
            .map(stack_description)
            .ok_or_else(|| ApiError::stack_does_not_exist(stack))
    }

    async fn list_stack_names(&self) -> ApiResult<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_stacks()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;

            for summary in response.stack_summaries() {
                let deleted = summary
                    .stack_status()
                    .is_some_and(|s| *s == cfn::types::StackStatus::DeleteComplete);
                if deleted {
                    continue;
                }
                if let Some(name) = summary.stack_name() {
                    names.push(name.to_string());
                }
            }

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        names.sort();
        debug!("Found {} stacks", names.len());
        Ok(names)
    }

    async fn create_stack(&self, request: &StackRequest) -> ApiResult<String> {
        debug!("CreateStack {}", request.stack_name);
        let response = self
            .client
            .create_stack()
            .stack_name(&request.stack_name)
            .set_template_body(request.template_body.clone())
            .set_template_url(request.template_url.clone())
            .set_parameters(sdk_parameters(&request.parameters))
            .set_tags(sdk_tags(&request.tags))
            .set_capabilities(sdk_capabilities(&request.capabilities))
            .set_disable_rollback(request.disable_rollback)
            .set_on_failure(
                request
                    .on_failure
                    .map(|o| cfn::types::OnFailure::from(o.as_str())),
            )
            .set_stack_policy_body(request.stack_policy_body.clone())
            .set_stack_policy_url(request.stack_policy_url.clone())
            .set_timeout_in_minutes(request.timeout_in_minutes)
            .set_notification_arns(non_empty(&request.notification_arns))
            .set_role_arn(request.role_arn.clone())
            .send()
            .await
            .map_err(api_error)?;

        Ok(response.stack_id().unwrap_or_default().to_string())
    }

    async fn update_stack(&self, request: &StackRequest) -> ApiResult<String> {
        debug!("UpdateStack {}", request.stack_name);
        let use_previous_template = request.use_previous_template.then_some(true);
        let response = self
            .client
            .update_stack()
            .stack_name(&request.stack_name)
            .set_template_body(request.template_body.clone())
            .set_template_url(request.template_url.clone())
            .set_use_previous_template(use_previous_template)
            .set_parameters(sdk_parameters(&request.parameters))
            .set_tags(sdk_tags(&request.tags))
            .set_capabilities(sdk_capabilities(&request.capabilities))
            .set_disable_rollback(request.disable_rollback)
            .set_stack_policy_body(request.stack_policy_body.clone())
            .set_stack_policy_url(request.stack_policy_url.clone())
            .set_stack_policy_during_update_body(request.stack_policy_during_update_body.clone())
            .set_stack_policy_during_update_url(request.stack_policy_during_update_url.clone())
            .set_notification_arns(non_empty(&request.notification_arns))
            .set_role_arn(request.role_arn.clone())
            .send()
            .await
            .map_err(api_error)?;

        Ok(response.stack_id().unwrap_or_default().to_string())
    }

    async fn delete_stack(&self, stack: &str) -> ApiResult<()> {
        debug!("DeleteStack {}", stack);
        self.client
            .delete_stack()
            .stack_name(stack)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn cancel_update_stack(&self, stack: &str) -> ApiResult<()> {
        debug!("CancelUpdateStack {}", stack);
        self.client
            .cancel_update_stack()
            .stack_name(stack)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn describe_stack_events(
        &self,
        stack: &str,
        next_token: Option<String>,
    ) -> ApiResult<EventPage> {
        let response = self
            .client
            .describe_stack_events()
            .stack_name(stack)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(api_error)?;

        Ok(EventPage {
            events: response
                .stack_events()
                .iter()
                .cloned()
                .map(StackEvent::from)
                .collect(),
            next_token: response.next_token().map(str::to_string),
        })
    }

    async fn list_stack_resources(&self, stack: &str) -> ApiResult<Vec<StackResourceSummary>> {
        let mut resources = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_stack_resources()
                .stack_name(stack)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;

            resources.extend(response.stack_resource_summaries().iter().map(|r| {
                StackResourceSummary {
                    logical_id: r.logical_resource_id().unwrap_or_default().to_string(),
                    physical_id: r.physical_resource_id().map(str::to_string),
                    resource_type: r.resource_type().unwrap_or_default().to_string(),
                    status: r
                        .resource_status()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                }
            }));

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(resources)
    }

    async fn get_template(&self, stack: &str) -> ApiResult<String> {
        let response = self
            .client
            .get_template()
            .stack_name(stack)
            .send()
            .await
            .map_err(api_error)?;
        Ok(response.template_body().unwrap_or_default().to_string())
    }

    async fn create_change_set(&self, request: &ChangeSetRequest) -> ApiResult<String> {
        debug!(
            "CreateChangeSet {} on {} ({})",
            request.change_set_name,
            request.stack_name,
            request.change_set_type.as_str()
        );
        let use_previous_template = request.use_previous_template.then_some(true);
        let response = self
            .client
            .create_change_set()
            .stack_name(&request.stack_name)
            .change_set_name(&request.change_set_name)
            .change_set_type(cfn::types::ChangeSetType::from(
                request.change_set_type.as_str(),
            ))
            .set_description(request.description.clone())
            .set_template_body(request.template_body.clone())
            .set_template_url(request.template_url.clone())
            .set_use_previous_template(use_previous_template)
            .set_parameters(sdk_parameters(&request.parameters))
            .set_tags(sdk_tags(&request.tags))
            .set_capabilities(sdk_capabilities(&request.capabilities))
            .set_notification_arns(non_empty(&request.notification_arns))
            .set_resource_types(non_empty(&request.resource_types))
            .set_role_arn(request.role_arn.clone())
            .send()
            .await
            .map_err(api_error)?;

        Ok(response.id().unwrap_or_default().to_string())
    }

    async fn describe_change_set(
        &self,
        stack: &str,
        change_set: &str,
    ) -> ApiResult<ChangeSetDescription> {
        let mut description: Option<ChangeSetDescription> = None;
        let mut next_token = None;
        loop {
            let response = self
                .client
                .describe_change_set()
                .stack_name(stack)
                .change_set_name(change_set)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;

            let changes = response
                .changes()
                .iter()
                .filter_map(|c| c.resource_change())
                .map(resource_change);

            match description.as_mut() {
                Some(existing) => existing.changes.extend(changes),
                None => {
                    description = Some(ChangeSetDescription {
                        change_set_id: response.change_set_id().map(str::to_string),
                        change_set_name: response
                            .change_set_name()
                            .unwrap_or(change_set)
                            .to_string(),
                        stack_id: response.stack_id().map(str::to_string),
                        stack_name: response.stack_name().unwrap_or(stack).to_string(),
                        status: response
                            .status()
                            .map(|s| s.as_str())
                            .unwrap_or_default()
                            .into(),
                        status_reason: response.status_reason().map(str::to_string),
                        execution_status: response
                            .execution_status()
                            .map(|s| s.as_str().to_string()),
                        changes: changes.collect(),
                    })
                }
            }

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        description.ok_or_else(|| {
            ApiError::new(
                ApiError::CHANGE_SET_NOT_FOUND,
                format!("ChangeSet [{}] does not exist", change_set),
            )
        })
    }

    async fn execute_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()> {
        debug!("ExecuteChangeSet {} on {}", change_set, stack);
        self.client
            .execute_change_set()
            .stack_name(stack)
            .change_set_name(change_set)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn delete_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()> {
        debug!("DeleteChangeSet {} on {}", change_set, stack);
        self.client
            .delete_change_set()
            .stack_name(stack)
            .change_set_name(change_set)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn list_change_sets(&self, stack: &str) -> ApiResult<Vec<ChangeSetSummary>> {
        let mut summaries = Vec::new();
        let mut next_token = None;
        loop {
            let response = self
                .client
                .list_change_sets()
                .stack_name(stack)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(api_error)?;

            summaries.extend(response.summaries().iter().map(|s| ChangeSetSummary {
                change_set_id: s.change_set_id().map(str::to_string),
                change_set_name: s.change_set_name().unwrap_or_default().to_string(),
                status: s
                    .status()
                    .map(|st| st.as_str().to_string())
                    .unwrap_or_default(),
                execution_status: s.execution_status().map(|e| e.as_str().to_string()),
                status_reason: s.status_reason().map(str::to_string),
            }));

            next_token = response.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(summaries)
    }
}
