//! Application modules.
//!
//! - [`cloudformation_manager`] - stack and change-set lifecycle
//! - [`source`] / [`cfn_yaml`] - document loading and CloudFormation YAML
//! - [`differ`] - diffs of deployed against pending stack data
//! - [`settings`] - configuration file
//! - [`cli`] - command-line interface

pub mod cfn_yaml;
pub mod cli;
pub mod cloudformation_manager;
pub mod differ;
pub mod settings;
pub mod source;
