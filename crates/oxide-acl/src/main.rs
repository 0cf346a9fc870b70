//! oxide-acl CLI
//!
//! Answers access questions against a catalog snapshot.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use oxide_acl::{AccessControl, AclConfig, CatalogSnapshot, Decision, PermissionKind};

/// GRANT/DENY/REVOKE permission resolution.
#[derive(Parser)]
#[command(name = "oxide-acl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog snapshot (JSON).
    #[arg(short, long, env = "ACL_CATALOG", default_value = "catalog.json")]
    catalog: PathBuf,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long, env = "ACL_CONFIG")]
    config: Option<PathBuf>,

    /// Let superuser principals bypass every check, DENY included.
    #[arg(long)]
    superuser_bypass: bool,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one permission. Exits with status 2 when access is denied.
    Check {
        /// User or role.
        principal: String,
        /// Permission name, e.g. SELECT or "VIEW DEFINITION".
        permission: PermissionKind,
        /// Securable id, e.g. HR.EMP_Details.Salary.
        securable: String,
    },

    /// Show the decision together with the entries behind it.
    Explain {
        /// User or role.
        principal: String,
        /// Permission name.
        permission: PermissionKind,
        /// Securable id.
        securable: String,
    },

    /// List the decision for every permission on a securable.
    Permissions {
        /// User or role.
        principal: String,
        /// Securable id.
        securable: String,
    },

    /// List the roles a principal belongs to, directly or not.
    Roles {
        /// User or role.
        principal: String,
    },

    /// List a securable and its enclosing scopes.
    Scopes {
        /// Securable id.
        securable: String,
    },

    /// Load the catalog and report what it contains.
    Validate,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => AclConfig::from_file(path)?,
        None => AclConfig::default(),
    };
    if cli.superuser_bypass {
        config.superuser_bypass = true;
    }
    debug!(?config, catalog = %cli.catalog.display(), "Loading catalog");

    let snapshot = CatalogSnapshot::from_file(&cli.catalog)?;
    let acl = AccessControl::from_snapshot(&snapshot, config)?;

    match cli.command {
        Commands::Check {
            principal,
            permission,
            securable,
        } => {
            let decision = acl.resolve(&principal, permission, &securable)?;
            if cli.json {
                println!("{}", serde_json::to_string(&decision)?);
            } else {
                println!("{decision}");
            }
            if decision == Decision::Deny {
                return Ok(ExitCode::from(2));
            }
        }

        Commands::Explain {
            principal,
            permission,
            securable,
        } => {
            let resolution = acl.explain(&principal, permission, &securable)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            } else {
                println!(
                    "{} {} ON {} FOR {} ({})",
                    resolution.decision, permission, securable, principal, resolution.reason
                );
                println!("  principals: {}", join(&resolution.principals, ", "));
                println!("  scopes:     {}", join(&resolution.scopes, " -> "));
                if resolution.matched.is_empty() {
                    println!("  entries:    none");
                } else {
                    println!("  entries:");
                    for entry in &resolution.matched {
                        println!("    {entry}");
                    }
                }
            }
        }

        Commands::Permissions {
            principal,
            securable,
        } => {
            let permissions = acl.effective_permissions(&principal, &securable)?;
            if cli.json {
                let map: serde_json::Map<String, serde_json::Value> = permissions
                    .iter()
                    .map(|(kind, decision)| Ok((kind.to_string(), serde_json::to_value(decision)?)))
                    .collect::<serde_json::Result<_>>()?;
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                println!("\nEffective permissions of {principal} on {securable}:");
                println!("{:-<40}", "");
                for (kind, decision) in &permissions {
                    println!(" {:<18} {}", kind.as_str(), decision);
                }
                println!();
            }
        }

        Commands::Roles { principal } => {
            let roles = acl.transitive_roles(&principal)?;
            if cli.json {
                println!("{}", serde_json::to_string(&roles)?);
            } else if roles.is_empty() {
                info!("{principal} is not a member of any role.");
            } else {
                for role in &roles {
                    println!("{role}");
                }
            }
        }

        Commands::Scopes { securable } => {
            let scopes = acl.ancestor_chain(&securable)?;
            if cli.json {
                println!("{}", serde_json::to_string(&scopes)?);
            } else {
                let state = acl.read();
                for scope in &scopes {
                    let kind = state
                        .hierarchy
                        .get(scope.as_str())
                        .map(|s| s.kind.to_string())
                        .unwrap_or_default();
                    println!("{kind:<9} {scope}");
                }
            }
        }

        Commands::Validate => {
            let state = acl.read();
            info!(
                principals = state.directory.len(),
                memberships = state.directory.memberships().count(),
                securables = state.hierarchy.len(),
                owners = state.ownership.iter().count(),
                entries = state.store.len(),
                "Catalog is valid"
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn join<T: std::fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}
