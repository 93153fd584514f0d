//! Stack events and de-duplicating event observation.

use super::api::CloudFormationApi;
use super::errors::{Result, StackError};
use aws_sdk_cloudformation as cfn;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, trace};

/// A CloudFormation stack event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
    pub event_id: String,
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub logical_resource_id: Option<String>,
    pub physical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub resource_status: String,
    pub resource_status_reason: Option<String>,
}

impl StackEvent {
    /// `resource - status - reason`, the reason omitted when absent.
    pub fn summary(&self) -> String {
        let resource = self
            .logical_resource_id
            .as_deref()
            .unwrap_or(&self.stack_name);
        match self.resource_status_reason.as_deref() {
            Some(reason) if !reason.is_empty() => {
                format!("{} - {} - {}", resource, self.resource_status, reason)
            }
            _ => format!("{} - {}", resource, self.resource_status),
        }
    }

    /// `[HH:MM:SS] resource - status - reason`, time in UTC.
    pub fn format_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.summary())
    }
}

impl From<cfn::types::StackEvent> for StackEvent {
    fn from(aws_event: cfn::types::StackEvent) -> Self {
        Self {
            event_id: aws_event.event_id().unwrap_or_default().to_string(),
            stack_id: aws_event.stack_id().map(|s| s.to_string()),
            stack_name: aws_event.stack_name().unwrap_or_default().to_string(),
            logical_resource_id: aws_event.logical_resource_id().map(|s| s.to_string()),
            physical_resource_id: aws_event.physical_resource_id().map(|s| s.to_string()),
            resource_type: aws_event.resource_type().map(|s| s.to_string()),
            timestamp: aws_event
                .timestamp()
                .and_then(super::aws_client::to_chrono)
                .unwrap_or_else(Utc::now),
            resource_status: aws_event
                .resource_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            resource_status_reason: aws_event.resource_status_reason().map(|s| s.to_string()),
        }
    }
}

/// Reports each event of a stack once, oldest first.
///
/// One watcher tracks one stack for the duration of one operation; sharing a
/// watcher between stacks mixes up their seen sets.
#[derive(Debug, Default)]
pub struct EventWatcher {
    seen: HashSet<String>,
}

impl EventWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct events observed so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Events that appeared since the last call, in chronological order.
    ///
    /// Pages are fetched newest-first and paging stops at the first event
    /// already seen. A stack that does not exist (yet, or any more) has no
    /// events.
    pub async fn drain_new_events(
        &mut self,
        client: &dyn CloudFormationApi,
        stack: &str,
    ) -> Result<Vec<StackEvent>> {
        let mut fresh: Vec<StackEvent> = Vec::new();
        let mut batch_ids: HashSet<String> = HashSet::new();
        let mut next_token = None;

        'pages: loop {
            let page = match client.describe_stack_events(stack, next_token).await {
                Ok(page) => page,
                Err(err) => match StackError::from(err) {
                    StackError::NoSuchStack => {
                        trace!("No events for {}: stack does not exist", stack);
                        return Ok(Vec::new());
                    }
                    other => return Err(other),
                },
            };

            for event in page.events {
                if self.seen.contains(&event.event_id) {
                    break 'pages;
                }
                if batch_ids.insert(event.event_id.clone()) {
                    fresh.push(event);
                }
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        fresh.reverse();
        self.seen.extend(batch_ids);
        if !fresh.is_empty() {
            debug!("{} new events for {}", fresh.len(), stack);
        }
        Ok(fresh)
    }

    /// Mark every existing event as seen, so only later events are reported.
    pub async fn mark_all_seen(
        &mut self,
        client: &dyn CloudFormationApi,
        stack: &str,
    ) -> Result<()> {
        let discarded = self.drain_new_events(client, stack).await?;
        trace!("Baseline for {}: {} existing events", stack, discarded.len());
        Ok(())
    }
}
