//! CloudFormation stack and change-set lifecycle.
//!
//! [`Stack`] is the entry point: it decides between create, update and
//! delete, drives the remote operation through a [`CloudFormationApi`], and
//! waits for the stack to settle while streaming [`StackEvent`]s. Provider
//! failures are classified into [`StackError`] as they cross the API seam.

pub mod api;
pub mod aws_client;
pub mod change_set;
pub mod errors;
pub mod events;
pub mod options;
pub mod parameters;
pub mod service;
pub mod stack;
pub mod status;

pub use api::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetSummary, ChangeSetType, CloudFormationApi,
    EventPage, ResourceChange, StackDescription, StackOutput, StackRequest, StackResourceSummary,
};
pub use aws_client::AwsCloudFormation;
pub use change_set::{ChangeSet, ChangeSetCreation};
pub use errors::{translate, ApiError, Result, StackError};
pub use events::{EventWatcher, StackEvent};
pub use options::{ChangeSetOptions, OnFailure, StackOptions, StackPolicy, DEFAULT_CAPABILITIES};
pub use parameters::{ParameterRecord, ParameterValue, Parameters, Tag, Tags, Template};
pub use service::CloudFormationService;
pub use stack::{EventHandler, Stack, DEFAULT_POLL_INTERVAL};
pub use status::{ChangeSetStatus, StackStatus};
