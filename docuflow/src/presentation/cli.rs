// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface
//!
//! Operator surface over the engine: tenant provisioning, campaign import,
//! document upload, the polled read models, credential management, and the
//! queue worker. Errors leave as machine-readable JSON on stderr plus a
//! sysexits code (importer contract: 0 success, 65 parse/validation, 66
//! unreadable input, 67 missing tenant, 78 unknown processor type).

use std::io::Read;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use docuflow_bootstrap::ExitCode;
use docuflow_domain::repositories::CredentialRepository;
use docuflow_domain::{Credential, CredentialCipher, CredentialScope, EngineError, Tenant};

use crate::application::engine::Engine;
use crate::application::use_cases::import_campaign::DefinitionSource;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::crypto::credential_cipher::AesGcmCredentialCipher;

#[derive(Parser)]
#[command(name = "docuflow")]
#[command(about = "Multi-tenant document processing engine")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tenant catalog operations
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Campaign definition operations
    Campaign {
        #[command(subcommand)]
        command: CampaignCommands,
    },
    /// Document ingestion and read models
    Document {
        #[command(subcommand)]
        command: DocumentCommands,
    },
    /// Credential management
    Credential {
        #[command(subcommand)]
        command: CredentialCommands,
    },
    /// Run the queue worker until SIGINT/SIGTERM
    Worker,
}

#[derive(Subcommand)]
pub enum TenantCommands {
    /// Provision a tenant (catalog row + migrated physical database)
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        email: String,
        /// Also create an owning user with this email.
        #[arg(long)]
        owner_email: Option<String>,
    },
    /// List catalog tenants
    List,
}

#[derive(Subcommand)]
pub enum CampaignCommands {
    /// Validate and materialize a campaign definition
    Import {
        /// Tenant slug the campaign belongs to.
        #[arg(long)]
        tenant: String,
        /// Definition file (.json / .yaml / .yml).
        #[arg(long)]
        file: Option<String>,
        /// Read the definition from STDIN.
        #[arg(long)]
        stdin: bool,
        /// Inline definition string (highest priority).
        #[arg(long)]
        inline: Option<String>,
        /// Run every check without persisting.
        #[arg(long)]
        validate_only: bool,
    },
    /// List a tenant's campaigns
    List {
        #[arg(long)]
        tenant: String,
    },
}

#[derive(Subcommand)]
pub enum DocumentCommands {
    /// Upload a document into a campaign as an authenticated user
    Upload {
        /// Acting user id (tenant resolved from membership).
        #[arg(long)]
        user: String,
        #[arg(long)]
        campaign: String,
        #[arg(long)]
        file: String,
        /// Override the mime type guessed from the extension.
        #[arg(long)]
        mime: Option<String>,
    },
    /// Poll pipeline progress for a document
    Progress {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        uuid: String,
    },
    /// Per-step execution metrics for a document
    Metrics {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        uuid: String,
    },
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Store an encrypted credential in a tenant's store
    Set {
        #[arg(long)]
        tenant: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
        /// One of system, tenant, campaign, processor.
        #[arg(long)]
        scope: String,
        /// Scope reference (campaign id, processor slug); tenant scope
        /// defaults to the tenant's own id.
        #[arg(long)]
        scope_ref: Option<String>,
    },
    /// Print a fresh base64 credential key
    Keygen,
}

/// Maps engine errors onto the sysexits surface.
pub fn exit_code_for(error: &EngineError) -> ExitCode {
    match error {
        EngineError::ImporterValidationError { reason, .. } => {
            if reason.contains("unknown processor type") {
                ExitCode::Config
            } else {
                ExitCode::DataError
            }
        }
        EngineError::SerializationError(_) => ExitCode::DataError,
        EngineError::InvalidConfiguration(_) => ExitCode::Config,
        EngineError::IoError(_) | EngineError::StorageError(_) => ExitCode::NoInput,
        EngineError::NotFound(message) => {
            if message.contains("tenant") {
                ExitCode::NoUser
            } else {
                ExitCode::Error
            }
        }
        EngineError::MissingTenantContext(_) => ExitCode::Software,
        EngineError::TenantSuspended(_) => ExitCode::NoPerm,
        EngineError::TenantSchemaInitializationFailed(_) | EngineError::DatabaseError(_) => {
            ExitCode::Unavailable
        }
        EngineError::TimeoutError(_) => ExitCode::TempFail,
        _ => ExitCode::Error,
    }
}

/// Machine-readable error line for stderr.
pub fn error_json(error: &EngineError) -> String {
    let mut body = serde_json::json!({
        "error": error.category(),
        "message": error.to_string(),
    });
    if let EngineError::ImporterValidationError { field, reason } = error {
        body["field"] = serde_json::Value::String(field.clone());
        body["reason"] = serde_json::Value::String(reason.clone());
    }
    body.to_string()
}

fn guess_mime(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("pdf") => "application/pdf",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Runs the parsed command against a freshly built engine.
pub async fn run(cli: Cli) -> Result<(), EngineError> {
    let config = EngineConfig::load(cli.config.as_deref())?;
    crate::infrastructure::logging::init(
        &config.logging.level,
        config.logging.format.parse().unwrap_or(
            crate::infrastructure::logging::LogFormat::Pretty,
        ),
    );
    let engine = Engine::build(config).await?;

    match cli.command {
        Commands::Tenant { command } => run_tenant(&engine, command).await,
        Commands::Campaign { command } => run_campaign(&engine, command).await,
        Commands::Document { command } => run_document(&engine, command).await,
        Commands::Credential { command } => run_credential(&engine, command).await,
        Commands::Worker => {
            let shutdown = docuflow_bootstrap::signals::install();
            engine.worker().run(shutdown).await
        }
    }
}

async fn require_tenant(engine: &Engine, slug: &str) -> Result<Tenant, EngineError> {
    engine
        .catalog
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("tenant '{}'", slug)))
}

async fn run_tenant(engine: &Engine, command: TenantCommands) -> Result<(), EngineError> {
    match command {
        TenantCommands::Create {
            slug,
            email,
            owner_email,
        } => {
            let tenant = engine
                .provisioner()
                .provision(&slug, &email, owner_email.as_deref())
                .await?;
            println!(
                "{}",
                serde_json::json!({
                    "tenant_id": tenant.id().to_string(),
                    "slug": tenant.slug(),
                    "database": tenant.database_name(),
                })
            );
            Ok(())
        }
        TenantCommands::List => {
            for tenant in engine.catalog.list().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    tenant.id(),
                    tenant.slug(),
                    tenant.status(),
                    tenant.tier()
                );
            }
            Ok(())
        }
    }
}

async fn run_campaign(engine: &Engine, command: CampaignCommands) -> Result<(), EngineError> {
    match command {
        CampaignCommands::Import {
            tenant,
            file,
            stdin,
            inline,
            validate_only,
        } => {
            let tenant = require_tenant(engine, &tenant).await?;
            let stdin_payload = if stdin {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|e| EngineError::IoError(format!("reading STDIN: {}", e)))?;
                Some(buffer)
            } else {
                None
            };
            let source = DefinitionSource {
                file,
                stdin: stdin_payload,
                inline,
            };
            let importer = engine.importer();
            let outcome = engine
                .connections
                .with_tenant(tenant, importer.import(&source, validate_only))
                .await?;
            println!(
                "{}",
                serde_json::json!({
                    "slug": outcome.slug,
                    "persisted": outcome.persisted,
                })
            );
            Ok(())
        }
        CampaignCommands::List { tenant } => {
            let tenant = require_tenant(engine, &tenant).await?;
            let read_models = engine.read_models();
            let campaigns = engine
                .connections
                .with_tenant(tenant, read_models.list_campaigns())
                .await?;
            for campaign in campaigns {
                println!(
                    "{}\t{}\t{}\t{} steps",
                    campaign.id(),
                    campaign.slug(),
                    campaign.state().as_str(),
                    campaign.pipeline_config().step_count()
                );
            }
            Ok(())
        }
    }
}

async fn run_document(engine: &Engine, command: DocumentCommands) -> Result<(), EngineError> {
    match command {
        DocumentCommands::Upload {
            user,
            campaign,
            file,
            mime,
        } => {
            let user_id = docuflow_domain::UserId::from_str(&user)?;
            let bytes = tokio::fs::read(&file)
                .await
                .map_err(|e| EngineError::IoError(format!("cannot read '{}': {}", file, e)))?;
            let filename = file.rsplit('/').next().unwrap_or(&file).to_string();
            let mime = mime.unwrap_or_else(|| guess_mime(&file).to_string());
            let receipt = engine
                .upload_service()
                .upload(user_id, &campaign, &filename, &mime, &bytes)
                .await?;
            println!(
                "{}",
                serde_json::json!({
                    "document_uuid": receipt.document_uuid.to_string(),
                    "job_uuid": receipt.job_uuid.to_string(),
                })
            );
            Ok(())
        }
        DocumentCommands::Progress { tenant, uuid } => {
            let tenant = require_tenant(engine, &tenant).await?;
            let uuid = uuid::Uuid::parse_str(&uuid)
                .map_err(|e| EngineError::invalid_config(format!("bad uuid: {}", e)))?;
            let read_models = engine.read_models();
            let view = engine
                .connections
                .with_tenant(tenant, read_models.progress(uuid))
                .await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        DocumentCommands::Metrics { tenant, uuid } => {
            let tenant = require_tenant(engine, &tenant).await?;
            let uuid = uuid::Uuid::parse_str(&uuid)
                .map_err(|e| EngineError::invalid_config(format!("bad uuid: {}", e)))?;
            let read_models = engine.read_models();
            let views = engine
                .connections
                .with_tenant(tenant, read_models.metrics(uuid))
                .await?;
            println!("{}", serde_json::to_string_pretty(&views)?);
            Ok(())
        }
    }
}

async fn run_credential(engine: &Engine, command: CredentialCommands) -> Result<(), EngineError> {
    match command {
        CredentialCommands::Set {
            tenant,
            key,
            value,
            scope,
            scope_ref,
        } => {
            let tenant = require_tenant(engine, &tenant).await?;
            let cipher = engine.credential_cipher.clone().ok_or_else(|| {
                EngineError::invalid_config(
                    "credential_key is not configured; run 'docuflow credential keygen'",
                )
            })?;
            let scope = CredentialScope::from_str(&scope)?;
            let scope_ref = match (scope, scope_ref) {
                (CredentialScope::Tenant, None) => Some(tenant.id().to_string()),
                (_, scope_ref) => scope_ref,
            };
            let encrypted = cipher.encrypt(&value)?;
            let credential = Credential::new(key.clone(), encrypted, scope, scope_ref)?;
            let repository = engine.credential_repository.clone();
            engine
                .connections
                .with_tenant(tenant, async move { repository.insert(&credential).await })
                .await?;
            // A write supersedes anything cached under this key.
            if let Some(cache) = &engine.credential_cache {
                cache.invalidate(&key);
            }
            println!("stored");
            Ok(())
        }
        CredentialCommands::Keygen => {
            println!("{}", AesGcmCredentialCipher::generate_key());
            Ok(())
        }
    }
}
