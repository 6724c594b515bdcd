//! LLMOS Bridge offline tools.
//!
//! Provides the `llmos` binary with subcommands for working with plan
//! documents and the daemon's database without a running server.
//! `validate` runs a plan file through the same repair/migration/
//! validation pipeline the daemon uses, so a plan that validates here is
//! accepted there. `grants` inspects and edits the permission table
//! directly.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use llmos_protocol::{CorrectionFeedback, PlanParser, ProtocolError};
use llmos_security::{PermissionGrant, PermissionScope};
use llmos_state::{SqliteStore, StateStore};

/// LLMOS Bridge plan and permission tools.
#[derive(Parser)]
#[command(name = "llmos", about = "LLMOS Bridge plan and permission tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a plan document (repair, migrate, validate).
    Validate {
        /// Path to the plan JSON file.
        file: PathBuf,
    },

    /// Inspect or edit permission grants in the daemon database.
    Grants {
        /// Path to the daemon database file.
        #[arg(short, long, default_value = "llmos.db")]
        db: String,

        #[command(subcommand)]
        command: GrantCommands,
    },
}

#[derive(Subcommand)]
enum GrantCommands {
    /// List active grants.
    List {
        /// Only show grants for this module.
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Grant a permission to a module.
    Grant {
        /// Permission string, e.g. filesystem.write.
        permission: String,
        /// Module id, e.g. filesystem.
        module: String,
        /// session (default) or permanent.
        #[arg(short, long, default_value = "session")]
        scope: String,
        /// Free-form justification stored with the grant.
        #[arg(short, long, default_value = "granted via CLI")]
        reason: String,
    },

    /// Revoke a grant.
    Revoke {
        permission: String,
        module: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Grants { db, command } => run_grants(&db, command),
    };
    process::exit(exit_code);
}

fn run_validate(file: &PathBuf) -> i32 {
    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!("error: cannot read {}: {}", file.display(), err);
            return 2;
        }
    };

    match PlanParser::new().parse_str(&raw) {
        Ok(plan) => {
            println!(
                "OK: plan '{}' ({} action(s), protocol {})",
                if plan.plan_id.is_empty() {
                    "<generated at submission>"
                } else {
                    &plan.plan_id
                },
                plan.actions.len(),
                plan.protocol_version
            );
            for action in &plan.actions {
                let deps = if action.depends_on.is_empty() {
                    String::new()
                } else {
                    format!(" <- [{}]", action.depends_on.join(", "))
                };
                println!("  {} = {}.{}{}", action.id, action.module, action.action, deps);
            }
            0
        }
        Err(ProtocolError::Validation { issues }) => {
            eprintln!("validation failed with {} issue(s):", issues.len());
            for issue in &issues {
                eprintln!("  {}: {}", issue.path, issue.reason);
            }
            eprint!("{}", CorrectionFeedback::format_validation_error(&issues));
            1
        }
        Err(ProtocolError::Parse { detail }) => {
            eprintln!("parse failed: {detail}");
            eprint!("{}", CorrectionFeedback::format_parse_error(&detail));
            1
        }
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn run_grants(db: &str, command: GrantCommands) -> i32 {
    let mut store = match SqliteStore::new(db) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: cannot open database '{db}': {err}");
            return 2;
        }
    };

    match command {
        GrantCommands::List { module } => match store.list_grants(module.as_deref()) {
            Ok(grants) if grants.is_empty() => {
                println!("no active grants");
                0
            }
            Ok(grants) => {
                for grant in grants {
                    println!(
                        "{:30} {:15} {:10} by {} ({})",
                        grant.permission,
                        grant.module_id,
                        grant.scope.as_str(),
                        grant.granted_by,
                        grant.reason
                    );
                }
                0
            }
            Err(err) => {
                eprintln!("error: {err}");
                1
            }
        },
        GrantCommands::Grant {
            permission,
            module,
            scope,
            reason,
        } => {
            let scope: PermissionScope = match scope.parse() {
                Ok(scope) => scope,
                Err(err) => {
                    eprintln!("error: {err}");
                    return 2;
                }
            };
            let grant =
                PermissionGrant::new(permission.as_str(), module.as_str(), scope, "cli", reason.as_str());
            match store.upsert_grant(&grant) {
                Ok(()) => {
                    println!("granted {permission} to {module} ({})", scope.as_str());
                    0
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    1
                }
            }
        }
        GrantCommands::Revoke { permission, module } => {
            match store.revoke_grant(&permission, &module) {
                Ok(true) => {
                    println!("revoked {permission} from {module}");
                    0
                }
                Ok(false) => {
                    eprintln!("no grant of {permission} for {module}");
                    1
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    1
                }
            }
        }
    }
}
