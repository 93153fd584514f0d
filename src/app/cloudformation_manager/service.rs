//! Entry point handing out [`Stack`] handles that share one client.

use super::api::CloudFormationApi;
use super::aws_client::AwsCloudFormation;
use super::errors::Result;
use super::stack::{Stack, DEFAULT_POLL_INTERVAL};
use crate::app::settings::Settings;
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct CloudFormationService {
    client: Arc<dyn CloudFormationApi>,
    poll_interval: Duration,
}

impl CloudFormationService {
    pub fn new(client: Arc<dyn CloudFormationApi>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Build an SDK-backed service from the region, profile and poll interval in `settings`.
    ///
    /// Unset region and profile fall back to the standard AWS environment and
    /// shared configuration files.
    pub async fn from_settings(settings: &Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        debug!(
            "Using AWS region {}",
            config
                .region()
                .map(|r| r.as_ref())
                .unwrap_or("(unset)")
        );

        Self::new(Arc::new(AwsCloudFormation::from_conf(&config)))
            .with_poll_interval(settings.poll_interval())
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn stack(&self, name: impl Into<String>) -> Stack {
        Stack::new(name, Arc::clone(&self.client)).with_poll_interval(self.poll_interval)
    }

    /// Names of all live stacks, sorted.
    pub async fn stack_names(&self) -> Result<Vec<String>> {
        Ok(self.client.list_stack_names().await?)
    }
}
