//! Scripted CloudFormation double shared by the integration tests.
//!
//! Describe responses are served in order and the last one repeats, so a
//! script of `[CREATE_IN_PROGRESS, CREATE_COMPLETE]` keeps reporting
//! `CREATE_COMPLETE` once exhausted. Events attached to a describe response
//! are appended to the stack's event log when that response is served.
//! Every call is recorded.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use stackup::app::cloudformation_manager::{
    api::ApiResult, ApiError, ChangeSetDescription, ChangeSetRequest, ChangeSetStatus,
    ChangeSetSummary, CloudFormationApi, EventPage, Stack, StackDescription, StackEvent,
    StackRequest, StackResourceSummary, StackStatus,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STACK_NAME: &str = "test-stack";
pub const STACK_ID: &str = "arn:aws:cloudformation:us-east-1:123456789012:stack/test-stack/1";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DescribeStack(String),
    ListStackNames,
    CreateStack(StackRequest),
    UpdateStack(StackRequest),
    DeleteStack(String),
    CancelUpdateStack(String),
    DescribeStackEvents(String, Option<String>),
    ListStackResources(String),
    GetTemplate(String),
    CreateChangeSet(ChangeSetRequest),
    DescribeChangeSet(String, String),
    ExecuteChangeSet(String, String),
    DeleteChangeSet(String, String),
    ListChangeSets(String),
}

struct Scripted<T> {
    result: ApiResult<T>,
    events: Vec<StackEvent>,
}

/// Serve the front of the queue, keeping the last entry for repeats.
/// The last entry publishes its events on first use only.
fn next_scripted<T: Clone>(queue: &mut VecDeque<Scripted<T>>) -> Option<Scripted<T>> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front_mut().map(|s| Scripted {
            result: s.result.clone(),
            events: std::mem::take(&mut s.events),
        })
    }
}

struct State {
    describes: VecDeque<Scripted<StackDescription>>,
    change_set_describes: VecDeque<Scripted<ChangeSetDescription>>,
    /// Newest first, like the real API.
    events: Vec<StackEvent>,
    event_page_size: usize,
    events_error: Option<ApiError>,
    create_stack: ApiResult<String>,
    update_stack: ApiResult<String>,
    delete_stack: ApiResult<()>,
    cancel_update_stack: ApiResult<()>,
    create_change_set: ApiResult<String>,
    execute_change_set: ApiResult<()>,
    delete_change_set: ApiResult<()>,
    template_body: String,
    resources: Vec<StackResourceSummary>,
    change_sets: Vec<ChangeSetSummary>,
    stack_names: Vec<String>,
    calls: Vec<Call>,
}

pub struct FakeCloudFormation {
    state: Mutex<State>,
}

impl Default for FakeCloudFormation {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                describes: VecDeque::new(),
                change_set_describes: VecDeque::new(),
                events: Vec::new(),
                event_page_size: 100,
                events_error: None,
                create_stack: Ok(STACK_ID.to_string()),
                update_stack: Ok(STACK_ID.to_string()),
                delete_stack: Ok(()),
                cancel_update_stack: Ok(()),
                create_change_set: Ok("arn:aws:cloudformation:changeSet/pending/1".to_string()),
                execute_change_set: Ok(()),
                delete_change_set: Ok(()),
                template_body: String::new(),
                resources: Vec::new(),
                change_sets: Vec::new(),
                stack_names: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }
}

impl FakeCloudFormation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Queue a `describe_stack` response.
    pub fn describe(&self, result: ApiResult<StackDescription>) -> &Self {
        self.describe_with_events(result, Vec::new())
    }

    /// Queue a stack in `status`.
    pub fn status(&self, status: &str) -> &Self {
        self.describe(Ok(description(status)))
    }

    /// Queue an absent stack.
    pub fn absent(&self) -> &Self {
        self.describe(Err(no_such_stack()))
    }

    /// Queue a response that also publishes `events` (oldest first) when served.
    pub fn describe_with_events(
        &self,
        result: ApiResult<StackDescription>,
        events: Vec<StackEvent>,
    ) -> &Self {
        self.state()
            .describes
            .push_back(Scripted { result, events });
        self
    }

    pub fn change_set_status(&self, status: &str, reason: Option<&str>) -> &Self {
        let mut description =
            ChangeSetDescription::new(STACK_NAME, "pending", ChangeSetStatus::from(status));
        description.status_reason = reason.map(str::to_string);
        self.state().change_set_describes.push_back(Scripted {
            result: Ok(description),
            events: Vec::new(),
        });
        self
    }

    pub fn change_set_missing(&self) -> &Self {
        self.state().change_set_describes.push_back(Scripted {
            result: Err(ApiError::new(
                ApiError::CHANGE_SET_NOT_FOUND,
                "ChangeSet [pending] does not exist",
            )),
            events: Vec::new(),
        });
        self
    }

    /// Publish events (oldest first) to the stack's event log now.
    pub fn add_events(&self, events: Vec<StackEvent>) -> &Self {
        let mut state = self.state();
        for event in events {
            state.events.insert(0, event);
        }
        self
    }

    pub fn set_event_page_size(&self, size: usize) -> &Self {
        self.state().event_page_size = size;
        self
    }

    pub fn fail_events(&self, err: ApiError) -> &Self {
        self.state().events_error = Some(err);
        self
    }

    pub fn fail_create(&self, err: ApiError) -> &Self {
        self.state().create_stack = Err(err);
        self
    }

    pub fn fail_update(&self, err: ApiError) -> &Self {
        self.state().update_stack = Err(err);
        self
    }

    pub fn fail_delete(&self, err: ApiError) -> &Self {
        self.state().delete_stack = Err(err);
        self
    }

    pub fn fail_cancel(&self, err: ApiError) -> &Self {
        self.state().cancel_update_stack = Err(err);
        self
    }

    pub fn fail_delete_change_set(&self, err: ApiError) -> &Self {
        self.state().delete_change_set = Err(err);
        self
    }

    pub fn set_template_body(&self, body: &str) -> &Self {
        self.state().template_body = body.to_string();
        self
    }

    pub fn set_resources(&self, resources: Vec<StackResourceSummary>) -> &Self {
        self.state().resources = resources;
        self
    }

    pub fn set_change_sets(&self, change_sets: Vec<ChangeSetSummary>) -> &Self {
        self.state().change_sets = change_sets;
        self
    }

    pub fn set_stack_names(&self, names: &[&str]) -> &Self {
        self.state().stack_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Recorded calls other than describes and event reads.
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    Call::DescribeStack(_)
                        | Call::DescribeStackEvents(..)
                        | Call::DescribeChangeSet(..)
                )
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl CloudFormationApi for FakeCloudFormation {
    async fn describe_stack(&self, stack: &str) -> ApiResult<StackDescription> {
        let mut state = self.state();
        state.calls.push(Call::DescribeStack(stack.to_string()));
        match next_scripted(&mut state.describes) {
            Some(scripted) => {
                for event in scripted.events {
                    state.events.insert(0, event);
                }
                scripted.result
            }
            None => Err(ApiError::stack_does_not_exist(stack)),
        }
    }

    async fn list_stack_names(&self) -> ApiResult<Vec<String>> {
        self.record(Call::ListStackNames);
        Ok(self.state().stack_names.clone())
    }

    async fn create_stack(&self, request: &StackRequest) -> ApiResult<String> {
        self.record(Call::CreateStack(request.clone()));
        self.state().create_stack.clone()
    }

    async fn update_stack(&self, request: &StackRequest) -> ApiResult<String> {
        self.record(Call::UpdateStack(request.clone()));
        self.state().update_stack.clone()
    }

    async fn delete_stack(&self, stack: &str) -> ApiResult<()> {
        self.record(Call::DeleteStack(stack.to_string()));
        self.state().delete_stack.clone()
    }

    async fn cancel_update_stack(&self, stack: &str) -> ApiResult<()> {
        self.record(Call::CancelUpdateStack(stack.to_string()));
        self.state().cancel_update_stack.clone()
    }

    async fn describe_stack_events(
        &self,
        stack: &str,
        next_token: Option<String>,
    ) -> ApiResult<EventPage> {
        let mut state = self.state();
        state
            .calls
            .push(Call::DescribeStackEvents(stack.to_string(), next_token.clone()));
        if let Some(err) = &state.events_error {
            return Err(err.clone());
        }

        let start: usize = next_token.as_deref().map_or(0, |t| t.parse().unwrap());
        let end = (start + state.event_page_size).min(state.events.len());
        Ok(EventPage {
            events: state.events[start..end].to_vec(),
            next_token: (end < state.events.len()).then(|| end.to_string()),
        })
    }

    async fn list_stack_resources(&self, stack: &str) -> ApiResult<Vec<StackResourceSummary>> {
        self.record(Call::ListStackResources(stack.to_string()));
        Ok(self.state().resources.clone())
    }

    async fn get_template(&self, stack: &str) -> ApiResult<String> {
        self.record(Call::GetTemplate(stack.to_string()));
        Ok(self.state().template_body.clone())
    }

    async fn create_change_set(&self, request: &ChangeSetRequest) -> ApiResult<String> {
        self.record(Call::CreateChangeSet(request.clone()));
        self.state().create_change_set.clone()
    }

    async fn describe_change_set(
        &self,
        stack: &str,
        change_set: &str,
    ) -> ApiResult<ChangeSetDescription> {
        let mut state = self.state();
        state.calls.push(Call::DescribeChangeSet(
            stack.to_string(),
            change_set.to_string(),
        ));
        match next_scripted(&mut state.change_set_describes) {
            Some(scripted) => scripted.result,
            None => Err(ApiError::new(
                ApiError::CHANGE_SET_NOT_FOUND,
                format!("ChangeSet [{}] does not exist", change_set),
            )),
        }
    }

    async fn execute_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()> {
        self.record(Call::ExecuteChangeSet(
            stack.to_string(),
            change_set.to_string(),
        ));
        self.state().execute_change_set.clone()
    }

    async fn delete_change_set(&self, stack: &str, change_set: &str) -> ApiResult<()> {
        self.record(Call::DeleteChangeSet(
            stack.to_string(),
            change_set.to_string(),
        ));
        self.state().delete_change_set.clone()
    }

    async fn list_change_sets(&self, stack: &str) -> ApiResult<Vec<ChangeSetSummary>> {
        self.record(Call::ListChangeSets(stack.to_string()));
        Ok(self.state().change_sets.clone())
    }
}

/// A stack handle on the fake that polls without sleeping.
pub fn stack(fake: &Arc<FakeCloudFormation>) -> Stack {
    Stack::new(STACK_NAME, fake.clone()).with_poll_interval(Duration::ZERO)
}

pub fn description(status: &str) -> StackDescription {
    let mut description = StackDescription::new(STACK_NAME, StackStatus::from(status));
    description.stack_id = Some(STACK_ID.to_string());
    description
}

pub fn no_such_stack() -> ApiError {
    ApiError::stack_does_not_exist(STACK_NAME)
}

pub fn no_updates() -> ApiError {
    ApiError::validation("No updates are to be performed.")
}

pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub fn event(id: &str, resource: &str, status: &str, seconds: i64) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        stack_id: Some(STACK_ID.to_string()),
        stack_name: STACK_NAME.to_string(),
        logical_resource_id: Some(resource.to_string()),
        physical_resource_id: None,
        resource_type: None,
        timestamp: timestamp(seconds),
        resource_status: status.to_string(),
        resource_status_reason: None,
    }
}

/// Collects the ids of events delivered to a stack's handler.
pub fn record_events(stack: &mut Stack) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    stack.on_event(move |event| sink.lock().unwrap().push(event.event_id.clone()));
    seen
}
