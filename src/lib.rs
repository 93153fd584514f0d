//! stackup - CloudFormation stack lifecycle from the command line.
//!
//! The library half drives CloudFormation stacks and change-sets to a stable
//! state: it decides whether to create, update or delete, submits the
//! operation, then polls until the stack settles while streaming each new
//! stack event exactly once.
//!
//! # Major Subsystems
//!
//! - [`app::cloudformation_manager`]: the orchestrator ([`app::cloudformation_manager::Stack`]),
//!   change-sets, event watching, error classification and parameter/tag normalisation.
//! - [`app::source`] and [`app::cfn_yaml`]: loading template and parameter documents from
//!   files or URLs, including CloudFormation short-form YAML tags.
//! - [`app::differ`]: unified diffs of deployed against pending stack data.
//! - [`app::settings`]: user configuration.
//! - [`app::cli`]: the `stackup` command.

#![warn(clippy::all, rust_2018_idioms)]

pub mod app;
