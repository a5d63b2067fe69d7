use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use certchain_core::{
    batch::{Batch, CreateBatch},
    certificate::IssueCertificate,
    config::{CertchainConfig, LoggingConfig},
    error::{CertchainError, ErrorCode},
    journal::{self, Journal},
    links,
    operation::Operation,
    roles::Role,
    service::LedgerService,
    types::{BatchId, CallContext, CertificateId, Principal},
    util,
};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "certchain",
    version = util::VERSION,
    about = "Role-gated certificate and product-batch ledger"
)]
struct Cli {
    /// Path to the journal database (SQLite).
    #[arg(long, global = true)]
    journal: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Principal submitting the operation.
    #[arg(long = "as", global = true)]
    caller: Option<String>,

    /// Host timestamp (Unix seconds) to record instead of the wall clock.
    #[arg(long, global = true)]
    at: Option<u64>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new, empty journal administered by `--admin`.
    Init {
        #[arg(long)]
        admin: String,
    },

    /// Grant a role (certifier, producer, verifier).  Admin only.
    Grant { principal: String, role: String },

    /// Revoke a role.  Admin only.
    RevokeRole { principal: String, role: String },

    /// Hand administration to another principal.
    TransferAdmin { new_admin: String },

    /// Issue a certificate.  Certifier only.
    Issue {
        #[arg(long)]
        external_id: String,
        #[arg(long)]
        cert_type: String,
        #[arg(long)]
        entity: String,
        #[arg(long, default_value_t = 365)]
        validity_days: u64,
        /// Overrides `--validity-days`.
        #[arg(long)]
        validity_secs: Option<u64>,
        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Revoke a certificate.  Issuer or admin.
    RevokeCert {
        id: u64,
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Show a certificate.
    Cert { id: u64 },

    /// Print whether a certificate is currently valid.
    CertValid { id: u64 },

    /// Create a batch pending verification.  Producer only.
    CreateBatch {
        #[arg(long)]
        external_id: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        quantity: u64,
        #[arg(long)]
        unit: String,
        /// Harvest time (Unix seconds).
        #[arg(long)]
        harvested_at: u64,
        #[arg(long, default_value = "")]
        origin: String,
        /// Certificate ids to link, comma separated.
        #[arg(long = "certs", value_delimiter = ',')]
        certs: Vec<u64>,
        #[arg(long, default_value = "")]
        metadata: String,
    },

    /// Verify a pending batch.  Verifier only.
    VerifyBatch { batch: String },

    /// Link a certificate to a batch.  Creator or current owner.
    Link { batch: String, certificate: u64 },

    /// Mark an active batch as in transit.  Current owner only.
    InTransit { batch: String },

    /// Transfer a batch to a new owner.  Current owner only.
    Transfer {
        batch: String,
        #[arg(long)]
        to: String,
    },

    /// Cancel a batch.  Creator, current owner or admin.
    Cancel {
        batch: String,
        #[arg(long, default_value = "")]
        reason: String,
    },

    /// Show a batch (accepts an id or a verification URL).
    Batch { batch: String },

    /// List batches awaiting verification.  Verifier only.
    Pending,

    /// Show the admin, authority profile and role members.
    Roles,

    /// Print notifications after the given sequence number.
    Events {
        #[arg(long, default_value_t = 0)]
        since: u64,
    },

    /// Print the QR verification URL for a batch.
    VerifyUrl { id: u64 },

    /// Verify the journal hash chain and that every entry still replays.
    VerifyJournal,

    /// Export the journal to a JSON backup file.
    Export {
        #[arg(long)]
        out: PathBuf,
    },

    /// Import a journal from a JSON backup into a new database.
    Import {
        #[arg(long)]
        json: PathBuf,
        /// Path for the new database (must not already exist).
        #[arg(long)]
        target: PathBuf,
    },

    /// Print version information.
    Version,
}

#[derive(Debug, Serialize)]
struct BatchView<'a> {
    #[serde(flatten)]
    batch: &'a Batch,
    verify_url: String,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<CertchainError>())
                .map(ErrorCode::from)
                .unwrap_or(ErrorCode::InternalError);
            ExitCode::from(code as u8)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = CertchainConfig::load(cli.config.as_deref()).context("load config")?;
    cfg.apply_env();
    init_logging(&cfg.logging)?;

    let journal_path = cli.journal.clone().unwrap_or_else(|| cfg.paths.journal.clone());
    util::validate_path(&journal_path, "journal")?;
    let now = cli.at.unwrap_or_else(util::now_unix);
    let caller = cli.caller.clone().map(Principal::new);

    match cli.cmd {
        Commands::Init { admin } => {
            anyhow::ensure!(
                !journal_path.exists(),
                "journal {} already exists -- will not overwrite",
                journal_path.display()
            );
            let policy = cfg.authority.policy()?;
            let journal = Journal::create_new(&journal_path, Principal::new(admin), policy)
                .context("create journal")?;
            info!(journal_id = %journal.meta().journal_id, "journal initialized");
        }

        Commands::Grant { principal, role } => {
            let op = Operation::GrantRole {
                principal: Principal::new(principal),
                role: role.parse::<Role>()?,
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::RevokeRole { principal, role } => {
            let op = Operation::RevokeRole {
                principal: Principal::new(principal),
                role: role.parse::<Role>()?,
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::TransferAdmin { new_admin } => {
            let op = Operation::TransferAdmin {
                new_admin: Principal::new(new_admin),
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::Issue {
            external_id,
            cert_type,
            entity,
            validity_days,
            validity_secs,
            metadata,
        } => {
            let validity_secs = match validity_secs {
                Some(secs) => secs,
                None => validity_days
                    .checked_mul(SECS_PER_DAY)
                    .context("validity in days is too large")?,
            };
            let op = Operation::IssueCertificate(IssueCertificate {
                external_id,
                cert_type,
                certified_entity: Principal::new(entity),
                validity_secs,
                metadata_ref: metadata,
            });
            submit(&journal_path, caller, now, op)?;
        }

        Commands::RevokeCert { id, reason } => {
            let op = Operation::RevokeCertificate {
                certificate_id: CertificateId(id),
                reason,
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::Cert { id } => {
            let svc = open_service(&journal_path)?;
            print_json(svc.registry().certificate(CertificateId(id))?)?;
        }

        Commands::CertValid { id } => {
            let svc = open_service(&journal_path)?;
            let valid = svc.registry().certificate_valid(CertificateId(id), now)?;
            print_json(&serde_json::json!({ "certificate_id": id, "at": now, "valid": valid }))?;
        }

        Commands::CreateBatch {
            external_id,
            product,
            quantity,
            unit,
            harvested_at,
            origin,
            certs,
            metadata,
        } => {
            let op = Operation::CreateBatch(CreateBatch {
                external_id,
                product_type: product,
                quantity,
                unit,
                harvested_at,
                origin,
                linked_certificates: certs.into_iter().map(CertificateId).collect(),
                metadata_ref: metadata,
            });
            submit(&journal_path, caller, now, op)?;
        }

        Commands::VerifyBatch { batch } => {
            let batch_id = links::parse_batch_reference(&batch)?;
            submit(&journal_path, caller, now, Operation::VerifyBatch { batch_id })?;
        }

        Commands::Link { batch, certificate } => {
            let op = Operation::LinkCertificate {
                batch_id: links::parse_batch_reference(&batch)?,
                certificate_id: CertificateId(certificate),
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::InTransit { batch } => {
            let batch_id = links::parse_batch_reference(&batch)?;
            submit(&journal_path, caller, now, Operation::MarkInTransit { batch_id })?;
        }

        Commands::Transfer { batch, to } => {
            let op = Operation::TransferBatch {
                batch_id: links::parse_batch_reference(&batch)?,
                to: Principal::new(to),
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::Cancel { batch, reason } => {
            let op = Operation::CancelBatch {
                batch_id: links::parse_batch_reference(&batch)?,
                reason,
            };
            submit(&journal_path, caller, now, op)?;
        }

        Commands::Batch { batch } => {
            let batch_id = links::parse_batch_reference(&batch)?;
            let svc = open_service(&journal_path)?;
            let view = BatchView {
                batch: svc.registry().batch(batch_id)?,
                verify_url: links::verify_url(&cfg.links.base_url, batch_id),
            };
            print_json(&view)?;
        }

        Commands::Pending => {
            let caller = require_caller(caller)?;
            let svc = open_service(&journal_path)?;
            print_json(&svc.registry().list_pending(&caller)?)?;
        }

        Commands::Roles => {
            let svc = open_service(&journal_path)?;
            let roles = svc.registry().roles();
            let members: BTreeMap<String, Vec<Principal>> = Role::ALL
                .into_iter()
                .map(|role| (role.to_string(), roles.members(role)))
                .collect();
            print_json(&serde_json::json!({
                "admin": roles.admin(),
                "policy": roles.policy(),
                "members": members,
            }))?;
        }

        Commands::Events { since } => {
            let svc = open_service(&journal_path)?;
            print_json(&svc.registry().notifications_since(since))?;
        }

        Commands::VerifyUrl { id } => {
            println!("{}", links::verify_url(&cfg.links.base_url, BatchId(id)));
        }

        Commands::VerifyJournal => {
            let svc = open_service(&journal_path)?;
            let entries = svc.journal().latest_seq()?;
            info!(
                entries,
                state_digest = %svc.registry().state_digest()?,
                "journal verification passed"
            );
        }

        Commands::Export { out } => {
            let journal = Journal::open_existing(&journal_path).context("open journal")?;
            journal::export_journal_json(&journal, &out).context("export journal")?;
        }

        Commands::Import { json, target } => {
            anyhow::ensure!(
                !target.exists(),
                "target database {} already exists -- will not overwrite",
                target.display()
            );
            let imported =
                journal::import_journal_json(&json, &target).context("import journal")?;
            // Replaying proves the imported history is admissible, not just intact.
            let svc = LedgerService::open(imported).context("replay imported journal")?;
            info!(
                journal_id = %svc.journal().meta().journal_id,
                "journal imported to {}",
                target.display()
            );
        }

        Commands::Version => {
            println!("{}", util::version_string());
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_caller(caller: Option<Principal>) -> Result<Principal> {
    caller.context("this command needs --as <principal>")
}

fn open_service(journal_path: &Path) -> Result<LedgerService> {
    let journal = Journal::open_existing(journal_path)
        .with_context(|| format!("open journal {}", journal_path.display()))?;
    LedgerService::open(journal).context("replay journal")
}

fn submit(journal_path: &Path, caller: Option<Principal>, now: u64, op: Operation) -> Result<()> {
    let ctx = CallContext {
        caller: require_caller(caller)?,
        now,
    };
    let mut svc = open_service(journal_path)?;
    let name = op.name();
    let receipt = svc
        .submit(&ctx, op)
        .with_context(|| format!("{name} rejected"))?;
    print_json(&receipt)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}

fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));

    let registry = tracing_subscriber::registry().with(filter);

    if cfg.json_stdout {
        let json_layer = tracing_subscriber::fmt::layer().json();
        registry.with(json_layer).init();
    } else if !cfg.json_log_file.is_empty() {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.json_log_file)
            .with_context(|| format!("open json log file {}", cfg.json_log_file))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::sync::Mutex::new(log_file));
        let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        registry.with(file_layer).with(console_layer).init();
    } else {
        // Human-readable output to stderr; stdout carries command output.
        let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        registry.with(console_layer).init();
    }
    Ok(())
}
