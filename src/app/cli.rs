//! Command-line interface.

use crate::app::cloudformation_manager::{
    ChangeSetCreation, ChangeSetDescription, ChangeSetOptions, CloudFormationService, OnFailure,
    ParameterValue, Parameters, Stack, StackDescription, StackOptions, StackPolicy, Tags,
    Template,
};
use crate::app::differ::Differ;
use crate::app::settings::{OutputFormat, Settings};
use crate::app::source::{is_s3_url, Source};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "stackup")]
#[command(about = "Create, update and delete CloudFormation stacks", long_about = None)]
#[command(
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_BRANCH"),
        " ",
        env!("GIT_COMMIT"),
        ")"
    )
)]
pub struct Cli {
    /// AWS region
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// AWS shared-config profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Seconds between status polls
    #[arg(long, global = true, value_name = "SECONDS")]
    pub poll_interval: Option<u64>,

    /// Output format for data
    #[arg(long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Overlay command-line flags on loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(region) = &self.region {
            settings.region = Some(region.clone());
        }
        if let Some(profile) = &self.profile {
            settings.profile = Some(profile.clone());
        }
        if let Some(poll_interval) = self.poll_interval {
            settings.poll_interval_secs = poll_interval;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stacks
    Stacks,

    /// Manage a stack
    Stack {
        /// Stack name
        name: String,

        #[command(subcommand)]
        command: StackCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum StackCommand {
    /// Print stack status
    Status,

    /// Wait until the stack is stable
    Wait,

    /// Create or update the stack
    Up(UpArgs),

    /// Delete the stack
    Down,

    /// Cancel an update in progress
    CancelUpdate,

    /// Print the stack template
    Template,

    /// Print stack parameters
    Parameters,

    /// Print stack tags
    Tags,

    /// Print stack outputs
    Outputs,

    /// Print logical → physical resource ids
    Resources,

    /// Print status, parameters, tags, outputs and resources together
    Inspect,

    /// Show what `up` would change in the template, parameters and tags
    Diff(DeployArgs),

    /// Print the stack's event history
    Events,

    /// List change-sets
    ChangeSets,

    /// Manage a change-set
    ChangeSet {
        /// Change-set name
        #[arg(long, default_value = "pending")]
        name: String,

        #[command(subcommand)]
        command: ChangeSetCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChangeSetCommand {
    /// Create the change-set
    Create(ChangeSetCreateArgs),

    /// Apply the change-set
    Execute,

    /// Delete the change-set
    Delete,

    /// Print the change-set and its changes
    Inspect,
}

/// Template, parameter and tag arguments shared by `up` and `change-set create`.
#[derive(Args, Debug, Default)]
pub struct DeployArgs {
    /// Template file or URL
    #[arg(short = 't', long)]
    pub template: Option<String>,

    /// Reuse the current template
    #[arg(long, conflicts_with = "template")]
    pub use_previous_template: bool,

    /// Submit the template text unchanged instead of re-serialising it
    #[arg(long)]
    pub preserve_template_formatting: bool,

    /// Parameter file or URL; later files win
    #[arg(short = 'p', long = "parameters", value_name = "FILE")]
    pub parameter_files: Vec<String>,

    /// Parameter override
    #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Keep the current value of a parameter
    #[arg(long = "use-previous-value", value_name = "KEY")]
    pub use_previous_values: Vec<String>,

    /// Tag file or URL
    #[arg(long, value_name = "FILE")]
    pub tags: Option<String>,

    /// Capability to acknowledge
    #[arg(long = "capability", value_name = "CAPABILITY")]
    pub capabilities: Vec<String>,

    /// Service role for CloudFormation to assume
    #[arg(long)]
    pub role_arn: Option<String>,

    /// SNS topic for stack events
    #[arg(long = "notification-arn", value_name = "ARN")]
    pub notification_arns: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct UpArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Action on creation failure: ROLLBACK, DELETE or DO_NOTHING
    #[arg(long, value_name = "ACTION", conflicts_with = "disable_rollback")]
    pub on_failure: Option<String>,

    /// Keep resources of a failed create or update
    #[arg(long)]
    pub disable_rollback: bool,

    /// Stack policy file or URL
    #[arg(long, value_name = "FILE")]
    pub policy: Option<String>,

    /// Creation timeout
    #[arg(long, value_name = "MINUTES")]
    pub timeout: Option<i32>,
}

#[derive(Args, Debug, Default)]
pub struct ChangeSetCreateArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Replace an existing change-set of the same name
    #[arg(long)]
    pub force: bool,

    /// Do not fail when there is nothing to change
    #[arg(long)]
    pub allow_empty: bool,

    #[arg(long)]
    pub description: Option<String>,
}

/// Run one command to completion.
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let service = CloudFormationService::from_settings(&settings).await;

    match cli.command {
        Command::Stacks => {
            for name in service.stack_names().await? {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Stack { name, command } => {
            let mut stack = service.stack(name);
            stack.on_event(|event| println!("{}", event.format_line()));
            run_stack_command(&mut stack, command, &settings).await
        }
    }
}

async fn run_stack_command(
    stack: &mut Stack,
    command: StackCommand,
    settings: &Settings,
) -> Result<()> {
    let format = settings.format;
    match command {
        StackCommand::Status => println!("{}", stack.status().await?),
        StackCommand::Wait => match stack.wait().await? {
            Some(status) => println!("{}", status),
            None => println!("Stack does not exist"),
        },
        StackCommand::Up(args) => {
            let options = stack_options(&args, settings).await?;
            match stack.create_or_update(&options).await? {
                Some(status) => println!("{}", status),
                None => println!("No update required"),
            }
        }
        StackCommand::Down => match stack.delete().await? {
            Some(_) => println!("Deleted"),
            None => println!("Stack does not exist"),
        },
        StackCommand::CancelUpdate => match stack.cancel_update().await? {
            Some(status) => println!("{}", status),
            None => println!("No update in progress"),
        },
        StackCommand::Template => display(&stack.template().await?, format)?,
        StackCommand::Parameters => display(&stack.parameters().await?, format)?,
        StackCommand::Tags => display(&stack.tags().await?, format)?,
        StackCommand::Outputs => display(&stack.outputs().await?, format)?,
        StackCommand::Resources => display(&stack.resources().await?, format)?,
        StackCommand::Inspect => {
            let description = stack.describe().await?;
            let resources = stack.resources().await?;
            display(&inspect_data(&description, &resources), format)?
        }
        StackCommand::Diff(args) => {
            let existing = deployed_data(stack).await?;
            let pending = pending_data(&args, settings, &existing).await?;
            if let Some(diff) = Differ::new(format).diff(&existing, &pending)? {
                print!("{}", diff);
            }
        }
        StackCommand::Events => {
            for event in stack.events().await? {
                println!("{}", event.format_line());
            }
        }
        StackCommand::ChangeSets => {
            let summaries: Vec<_> = stack
                .change_sets()
                .await?
                .into_iter()
                .map(|s| {
                    json!({
                        "Name": s.change_set_name,
                        "Status": s.status,
                        "ExecutionStatus": s.execution_status,
                        "StatusReason": s.status_reason,
                    })
                })
                .collect();
            display(&summaries, format)?
        }
        StackCommand::ChangeSet { name, command } => {
            let mut change_set = stack.change_set(name);
            match command {
                ChangeSetCommand::Create(args) => {
                    let options = change_set_options(&args, settings).await?;
                    match change_set.create(&options).await? {
                        ChangeSetCreation::Complete(status) => println!("{}", status),
                        ChangeSetCreation::NoChanges(reason) => println!("{}", reason),
                    }
                }
                ChangeSetCommand::Execute => println!("{}", change_set.execute().await?),
                ChangeSetCommand::Delete => {
                    change_set.delete().await?;
                    println!("Deleted");
                }
                ChangeSetCommand::Inspect => {
                    display(&change_set_data(&change_set.describe().await?), format)?
                }
            }
        }
    }
    Ok(())
}

fn display<T: Serialize>(data: &T, format: OutputFormat) -> Result<()> {
    print!("{}", format.render(data)?);
    Ok(())
}

fn inspect_data(
    description: &StackDescription,
    resources: &BTreeMap<String, Option<String>>,
) -> Value {
    json!({
        "Status": description.status.as_str(),
        "StatusReason": description.status_reason,
        "Parameters": description.parameter_map(),
        "Tags": description.tag_map(),
        "Outputs": description.output_map(),
        "Resources": resources,
    })
}

/// Template, parameters and tags as currently deployed.
async fn deployed_data(stack: &Stack) -> Result<Value> {
    let description = stack.describe().await?;
    Ok(json!({
        "Template": stack.template().await?,
        "Parameters": description.parameter_map(),
        "Tags": description.tag_map(),
    }))
}

/// What `up` with `args` would deploy, in the shape of [`deployed_data`].
///
/// Anything the arguments leave unspecified keeps its deployed value.
async fn pending_data(args: &DeployArgs, settings: &Settings, existing: &Value) -> Result<Value> {
    let template = match &args.template {
        Some(location) => Source::load(location).await?.data()?,
        None => existing["Template"].clone(),
    };

    let loaded = load_parameters(args).await?;
    let parameters = if loaded.is_empty() {
        existing["Parameters"].clone()
    } else {
        let resolved: BTreeMap<String, String> = loaded
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    ParameterValue::Value(value) => Some(value.clone()),
                    ParameterValue::UsePrevious => {
                        existing["Parameters"][key.as_str()].as_str().map(str::to_string)
                    }
                    ParameterValue::Null => None,
                };
                value.map(|v| (key.clone(), v))
            })
            .collect();
        json!(resolved)
    };

    let tags = load_tags(args, settings).await?;
    let tags = if tags.is_empty() {
        existing["Tags"].clone()
    } else {
        json!(tags.to_map())
    };

    Ok(json!({
        "Template": template,
        "Parameters": parameters,
        "Tags": tags,
    }))
}

fn change_set_data(description: &ChangeSetDescription) -> serde_json::Value {
    let changes: Vec<_> = description
        .changes
        .iter()
        .map(|c| {
            json!({
                "Action": c.action,
                "LogicalResourceId": c.logical_id,
                "PhysicalResourceId": c.physical_id,
                "ResourceType": c.resource_type,
                "Replacement": c.replacement,
            })
        })
        .collect();
    json!({
        "Name": description.change_set_name,
        "Status": description.status.as_str(),
        "StatusReason": description.status_reason,
        "ExecutionStatus": description.execution_status,
        "Changes": changes,
    })
}

/// S3-hosted templates are passed by URL and never downloaded.
async fn load_template(args: &DeployArgs) -> Result<Option<Template>> {
    match &args.template {
        Some(location) if is_s3_url(location) => Ok(Some(Template::Url(location.clone()))),
        Some(location) => {
            let source = Source::load(location).await?;
            Ok(Some(source.to_template(args.preserve_template_formatting)?))
        }
        None => Ok(None),
    }
}

async fn load_parameters(args: &DeployArgs) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    for location in &args.parameter_files {
        let data = Source::load(location).await?.data()?;
        let loaded = Parameters::from_value(&data)
            .with_context(|| format!("Invalid parameters in {}", location))?;
        parameters.merge(loaded);
    }
    for pair in &args.overrides {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter override must be KEY=VALUE, got {}", pair))?;
        parameters.insert(key, value);
    }
    for key in &args.use_previous_values {
        parameters.use_previous(key.as_str());
    }
    Ok(parameters)
}

async fn load_tags(args: &DeployArgs, settings: &Settings) -> Result<Tags> {
    let mut tags: Tags = settings.default_tags.clone().into_iter().collect();
    if let Some(location) = &args.tags {
        let data = Source::load(location).await?.data()?;
        let loaded =
            Tags::from_value(&data).with_context(|| format!("Invalid tags in {}", location))?;
        tags.merge(loaded);
    }
    Ok(tags)
}

fn capabilities(args: &DeployArgs, settings: &Settings) -> Vec<String> {
    if args.capabilities.is_empty() {
        settings.capabilities.clone()
    } else {
        args.capabilities.clone()
    }
}

async fn stack_options(args: &UpArgs, settings: &Settings) -> Result<StackOptions> {
    let deploy = &args.deploy;
    let mut options = StackOptions::new()
        .with_use_previous_template(deploy.use_previous_template)
        .with_parameters(load_parameters(deploy).await?)
        .with_tags(load_tags(deploy, settings).await?)
        .with_capabilities(capabilities(deploy, settings));

    if let Some(template) = load_template(deploy).await? {
        options = options.with_template(template);
    }
    if let Some(on_failure) = &args.on_failure {
        options = options.with_on_failure(on_failure.parse::<OnFailure>()?);
    }
    if args.disable_rollback {
        options = options.with_disable_rollback(true);
    }
    if let Some(location) = &args.policy {
        let policy = if is_s3_url(location) {
            StackPolicy::Url(location.clone())
        } else {
            StackPolicy::Body(Source::load(location).await?.body().to_string())
        };
        options = options.with_stack_policy(policy);
    }
    if let Some(minutes) = args.timeout {
        options = options.with_timeout_in_minutes(minutes);
    }
    if let Some(role_arn) = &deploy.role_arn {
        options = options.with_role_arn(role_arn.clone());
    }
    for arn in &deploy.notification_arns {
        options = options.with_notification_arn(arn.clone());
    }
    Ok(options)
}

async fn change_set_options(
    args: &ChangeSetCreateArgs,
    settings: &Settings,
) -> Result<ChangeSetOptions> {
    let deploy = &args.deploy;
    let mut options = ChangeSetOptions::new()
        .with_use_previous_template(deploy.use_previous_template)
        .with_parameters(load_parameters(deploy).await?)
        .with_tags(load_tags(deploy, settings).await?)
        .with_capabilities(capabilities(deploy, settings))
        .with_force(args.force)
        .with_allow_empty_change_set(args.allow_empty);

    if let Some(template) = load_template(deploy).await? {
        options = options.with_template(template);
    }
    if let Some(description) = &args.description {
        options = options.with_description(description.clone());
    }
    if let Some(role_arn) = &deploy.role_arn {
        options = options.with_role_arn(role_arn.clone());
    }
    for arn in &deploy.notification_arns {
        options = options.with_notification_arn(arn.clone());
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_up() {
        let cli = Cli::parse_from([
            "stackup",
            "--region",
            "eu-west-1",
            "stack",
            "web",
            "up",
            "-t",
            "web.yaml",
            "-p",
            "params.yaml",
            "-o",
            "Ami=ami-123",
            "--use-previous-value",
            "VpcId",
            "--on-failure",
            "DELETE",
        ]);

        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        match cli.command {
            Command::Stack {
                name,
                command: StackCommand::Up(args),
            } => {
                assert_eq!(name, "web");
                assert_eq!(args.deploy.template.as_deref(), Some("web.yaml"));
                assert_eq!(args.deploy.parameter_files, vec!["params.yaml"]);
                assert_eq!(args.deploy.overrides, vec!["Ami=ami-123"]);
                assert_eq!(args.deploy.use_previous_values, vec!["VpcId"]);
                assert_eq!(args.on_failure.as_deref(), Some("DELETE"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_change_set_create() {
        let cli = Cli::parse_from([
            "stackup", "stack", "web", "change-set", "--name", "next", "create", "--force",
            "--allow-empty",
        ]);
        match cli.command {
            Command::Stack {
                command:
                    StackCommand::ChangeSet {
                        name,
                        command: ChangeSetCommand::Create(args),
                    },
                ..
            } => {
                assert_eq!(name, "next");
                assert!(args.force);
                assert!(args.allow_empty);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "stackup",
            "--profile",
            "prod",
            "--poll-interval",
            "1",
            "--format",
            "json",
            "stacks",
        ]);
        let mut settings = Settings::default();
        cli.apply_to(&mut settings);

        assert_eq!(settings.profile.as_deref(), Some("prod"));
        assert_eq!(settings.poll_interval_secs, 1);
        assert_eq!(settings.format, OutputFormat::Json);
    }

    #[tokio::test]
    async fn test_load_parameters_with_overrides() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Ami: ami-old\nCount: 2").unwrap();

        let args = DeployArgs {
            template: None,
            use_previous_template: false,
            preserve_template_formatting: false,
            parameter_files: vec![file.path().to_str().unwrap().to_string()],
            overrides: vec!["Ami=ami-new".to_string()],
            use_previous_values: vec!["VpcId".to_string()],
            tags: None,
            capabilities: Vec::new(),
            role_arn: None,
            notification_arns: Vec::new(),
        };

        let parameters = load_parameters(&args).await.unwrap();
        let expected: Parameters = {
            let mut p: Parameters = [("Ami", "ami-new"), ("Count", "2")].into_iter().collect();
            p.use_previous("VpcId");
            p
        };
        assert_eq!(parameters, expected);
    }

    fn temp_file(content: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn location(file: &tempfile::NamedTempFile) -> String {
        file.path().to_str().unwrap().to_string()
    }

    const S3_TEMPLATE: &str = "https://private-bucket.s3.amazonaws.com/web.json";
    const S3_POLICY: &str = "https://private-bucket.s3.eu-west-1.amazonaws.com/policy.json";

    #[tokio::test]
    async fn test_s3_template_is_passed_by_url() {
        let args = DeployArgs {
            template: Some(S3_TEMPLATE.to_string()),
            ..Default::default()
        };

        let template = load_template(&args).await.unwrap();

        assert_eq!(template, Some(Template::Url(S3_TEMPLATE.to_string())));
    }

    #[tokio::test]
    async fn test_s3_policy_is_passed_by_url() {
        let args = UpArgs {
            deploy: DeployArgs {
                template: Some(S3_TEMPLATE.to_string()),
                ..Default::default()
            },
            policy: Some(S3_POLICY.to_string()),
            ..Default::default()
        };

        let options = stack_options(&args, &Settings::default()).await.unwrap();

        assert_eq!(options.template, Some(Template::Url(S3_TEMPLATE.to_string())));
        assert_eq!(options.stack_policy, Some(StackPolicy::Url(S3_POLICY.to_string())));
    }

    #[tokio::test]
    async fn test_local_template_and_policy_are_read() {
        let template = temp_file("{\"Resources\": {}}");
        let policy = temp_file("{\"Statement\": []}");
        let args = UpArgs {
            deploy: DeployArgs {
                template: Some(location(&template)),
                ..Default::default()
            },
            policy: Some(location(&policy)),
            ..Default::default()
        };

        let options = stack_options(&args, &Settings::default()).await.unwrap();

        assert_eq!(options.template, Some(Template::Data(json!({"Resources": {}}))));
        assert_eq!(
            options.stack_policy,
            Some(StackPolicy::Body("{\"Statement\": []}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_default_tags_sit_beneath_command_tags() {
        let tags = temp_file("env: prod\nowner: web-team\n");
        let mut settings = Settings::default();
        settings.default_tags = BTreeMap::from([
            ("env".to_string(), "dev".to_string()),
            ("team".to_string(), "infra".to_string()),
        ]);
        let args = UpArgs {
            deploy: DeployArgs {
                tags: Some(location(&tags)),
                ..Default::default()
            },
            ..Default::default()
        };

        let options = stack_options(&args, &settings).await.unwrap();

        assert_eq!(options.tags.get("env"), Some("prod"));
        assert_eq!(options.tags.get("team"), Some("infra"));
        assert_eq!(options.tags.get("owner"), Some("web-team"));
        assert_eq!(options.tags.len(), 3);
    }

    #[tokio::test]
    async fn test_default_tags_apply_without_tag_file() {
        let mut settings = Settings::default();
        settings.default_tags = BTreeMap::from([("team".to_string(), "infra".to_string())]);

        let options = change_set_options(&ChangeSetCreateArgs::default(), &settings)
            .await
            .unwrap();

        assert_eq!(options.tags.get("team"), Some("infra"));
    }

    #[tokio::test]
    async fn test_capabilities_fall_back_to_settings() {
        let mut settings = Settings::default();
        settings.capabilities = vec!["CAPABILITY_IAM".to_string()];

        let options = stack_options(&UpArgs::default(), &settings).await.unwrap();
        assert_eq!(options.capabilities, Some(vec!["CAPABILITY_IAM".to_string()]));

        let options = change_set_options(&ChangeSetCreateArgs::default(), &settings)
            .await
            .unwrap();
        assert_eq!(options.capabilities, Some(vec!["CAPABILITY_IAM".to_string()]));
    }

    #[tokio::test]
    async fn test_command_capabilities_win() {
        let mut settings = Settings::default();
        settings.capabilities = vec!["CAPABILITY_IAM".to_string()];
        let args = UpArgs {
            deploy: DeployArgs {
                capabilities: vec!["CAPABILITY_AUTO_EXPAND".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let options = stack_options(&args, &settings).await.unwrap();

        assert_eq!(
            options.capabilities,
            Some(vec!["CAPABILITY_AUTO_EXPAND".to_string()])
        );
    }

    #[test]
    fn test_inspect_data_includes_resources() {
        use crate::app::cloudformation_manager::{StackOutput, StackStatus};

        let mut description = StackDescription::new("web", StackStatus::UpdateComplete);
        description.outputs = vec![StackOutput {
            key: "Url".to_string(),
            value: "https://example.com".to_string(),
            description: None,
            export_name: None,
        }];
        let resources = BTreeMap::from([("Bucket".to_string(), Some("web-bucket-1".to_string()))]);

        let data = inspect_data(&description, &resources);

        assert_eq!(data["Status"], "UPDATE_COMPLETE");
        assert_eq!(data["Outputs"], json!({"Url": "https://example.com"}));
        assert_eq!(data["Resources"], json!({"Bucket": "web-bucket-1"}));
    }

    fn deployed() -> Value {
        json!({
            "Template": {"Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}},
            "Parameters": {"Ami": "ami-1", "Count": "2"},
            "Tags": {"team": "infra"},
        })
    }

    #[tokio::test]
    async fn test_diff_without_arguments_is_empty() {
        let existing = deployed();

        let pending = pending_data(&DeployArgs::default(), &Settings::default(), &existing)
            .await
            .unwrap();

        assert_eq!(pending, existing);
        assert_eq!(
            Differ::new(OutputFormat::Yaml).diff(&existing, &pending).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_diff_applies_overrides_and_previous_values() {
        let existing = deployed();
        let template = temp_file("Resources:\n  Queue:\n    Type: AWS::SQS::Queue\n");
        let args = DeployArgs {
            template: Some(location(&template)),
            overrides: vec!["Ami=ami-2".to_string()],
            use_previous_values: vec!["Count".to_string()],
            ..Default::default()
        };

        let pending = pending_data(&args, &Settings::default(), &existing)
            .await
            .unwrap();

        assert_eq!(
            pending,
            json!({
                "Template": {"Resources": {"Queue": {"Type": "AWS::SQS::Queue"}}},
                "Parameters": {"Ami": "ami-2", "Count": "2"},
                "Tags": {"team": "infra"},
            })
        );
        let diff = Differ::new(OutputFormat::Yaml)
            .diff(&existing, &pending)
            .unwrap()
            .unwrap();
        assert!(diff.contains("+  Ami: ami-2\n"));
        assert!(diff.contains("-    Bucket:\n"));
    }

    #[test]
    fn test_parse_diff() {
        let cli = Cli::parse_from(["stackup", "stack", "web", "diff", "-t", "web.yaml"]);
        match cli.command {
            Command::Stack {
                command: StackCommand::Diff(args),
                ..
            } => assert_eq!(args.template.as_deref(), Some("web.yaml")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
