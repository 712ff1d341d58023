//! # Command Line Interface
//!
//! Operator tooling over the secret store: read, list, count, create,
//! update and delete pipeline secrets from a shell.

pub mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::VaultSettings;
use crate::domain::{AllowEvents, Secret, SecretScope};
use crate::observability::{init_logging, LogFormat};
use crate::secrets::{ListOptions, VaultSecretService};
use output::{print_secrets, OutputFormat};

#[derive(Parser)]
#[command(name = "pipeline-vault")]
#[command(about = "Manage pipeline secrets in a Vault-style secret store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML settings file (defaults to PIPELINE_VAULT_* / VAULT_* environment variables)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true, default_value = "table")]
    pub output: OutputFormat,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where a secret lives: scope, org and the scope's secondary key.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Secret type (org, repo, shared)
    #[arg(long = "type")]
    pub scope: SecretScope,

    #[arg(long)]
    pub org: String,

    /// Repo name for repo secrets, team name for shared secrets
    #[arg(long, default_value = "*")]
    pub secondary: String,
}

/// Fields settable on create and update.
#[derive(Args, Debug, Clone, Default)]
pub struct SecretFields {
    /// Secret value
    #[arg(long)]
    pub value: Option<String>,

    /// Image the secret may be injected into (repeatable)
    #[arg(long = "image")]
    pub images: Vec<String>,

    /// Allowed event such as `push` or `pull_request:opened` (repeatable)
    #[arg(long = "event")]
    pub events: Vec<String>,

    #[arg(long)]
    pub allow_command: Option<bool>,

    #[arg(long)]
    pub allow_substitution: Option<bool>,

    /// Repository allowed to use a shared secret (repeatable)
    #[arg(long = "allow-repo")]
    pub repo_allowlist: Vec<String>,

    /// User recorded as creator/updater
    #[arg(long, default_value = "pipeline-vault")]
    pub user: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show one secret
    Get {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        name: String,

        /// Print the secret value instead of masking it
        #[arg(long)]
        show_value: bool,
    },

    /// List secrets
    List {
        #[command(flatten)]
        target: Target,

        /// Page number, starting at 1 (lists everything when omitted)
        #[arg(long)]
        page: Option<usize>,

        #[arg(long, default_value_t = 10)]
        per_page: usize,
    },

    /// Count secrets
    Count {
        #[command(flatten)]
        target: Target,
    },

    /// Create a secret
    Create {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: SecretFields,
    },

    /// Update fields of an existing secret
    Update {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        name: String,

        #[command(flatten)]
        fields: SecretFields,
    },

    /// Delete a secret
    Delete {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        name: String,
    },
}

/// Parse arguments, connect, run one command.
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let settings = match &cli.config {
        Some(path) => VaultSettings::from_toml_file(path)?,
        None => VaultSettings::from_env()?,
    };
    let service =
        VaultSecretService::new(settings).await.context("Failed to connect to secret store")?;

    let result = execute(&service, cli.command, cli.output).await;
    service.shutdown().await;
    result
}

async fn execute(
    service: &VaultSecretService,
    command: Commands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Get { target, name, show_value } => {
            let secret = service.get(target.scope, &target.org, &target.secondary, &name).await?;
            let secret = if show_value { secret } else { secret.sanitize() };
            print_secrets(&[secret], format)?;
        }

        Commands::List { target, page, per_page } => {
            let secrets = match page {
                Some(page) => {
                    service
                        .list_page(
                            target.scope,
                            &target.org,
                            &target.secondary,
                            ListOptions::new(page, per_page),
                        )
                        .await?
                }
                None => service.list(target.scope, &target.org, &target.secondary).await?,
            };
            let secrets: Vec<Secret> = secrets.iter().map(Secret::sanitize).collect();
            print_secrets(&secrets, format)?;
        }

        Commands::Count { target } => {
            let count = service.count(target.scope, &target.org, &target.secondary).await?;
            println!("{}", count);
        }

        Commands::Create { target, name, fields } => {
            let mut secret = fields.to_secret(&name)?;
            secret.created_at = Some(chrono::Utc::now().timestamp());
            secret.created_by = Some(fields.user.clone());
            secret.updated_at = secret.created_at;
            secret.updated_by = secret.created_by.clone();

            let created =
                service.create(target.scope, &target.org, &target.secondary, &secret).await?;
            print_secrets(&[created.sanitize()], format)?;
        }

        Commands::Update { target, name, fields } => {
            let mut secret = fields.to_secret(&name)?;
            secret.updated_at = Some(chrono::Utc::now().timestamp());
            secret.updated_by = Some(fields.user.clone());

            let updated =
                service.update(target.scope, &target.org, &target.secondary, &secret).await?;
            print_secrets(&[updated.sanitize()], format)?;
        }

        Commands::Delete { target, name } => {
            service.delete(target.scope, &target.org, &target.secondary, &name).await?;
            println!("Deleted secret '{}'", name);
        }
    }
    Ok(())
}

impl SecretFields {
    /// Secret carrying only the fields given on the command line.
    fn to_secret(&self, name: &str) -> Result<Secret> {
        let mut secret = Secret { name: Some(name.to_string()), ..Default::default() };
        secret.value = self.value.clone();
        if !self.images.is_empty() {
            secret.images = Some(self.images.clone());
        }
        if !self.events.is_empty() {
            secret.allow_events = Some(parse_events(&self.events)?);
        }
        secret.allow_command = self.allow_command;
        secret.allow_substitution = self.allow_substitution;
        if !self.repo_allowlist.is_empty() {
            secret.repo_allowlist = Some(self.repo_allowlist.clone());
        }
        Ok(secret)
    }
}

fn parse_events(names: &[String]) -> Result<AllowEvents> {
    names.iter().try_fold(AllowEvents::empty(), |mask, name| {
        let flag = AllowEvents::from_event_name(name);
        if flag.is_empty() {
            anyhow::bail!("Unknown event '{}'", name);
        }
        Ok(mask | flag)
    })
}
