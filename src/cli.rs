use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::password;
use crate::auth::roles::Role;
use crate::reports::ReportWriter;
use crate::store::models::{EquipmentStatus, MoveRequest, NewEquipment, ParameterKind};
use crate::store::InventoryStore;

#[derive(Parser, Debug)]
#[command(
    name = "invterm",
    version,
    about = "Equipment inventory tracking served as a web terminal"
)]
pub struct Cli {
    /// Path to configuration file (also settable via INVTERM_CONFIG env var)
    #[arg(short, long, default_value = "invterm.toml", env = "INVTERM_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the terminal server (default)
    Serve,
    /// Hash a password using Argon2id for use in config
    HashPassword {
        /// Password to hash (if not provided, reads from stdin)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Validate configuration file
    CheckConfig,
    /// Create a user account
    AddUser {
        #[arg(long)]
        username: String,
        /// administrator, manager or viewer
        #[arg(long)]
        role: Role,
        #[arg(long)]
        full_name: Option<String>,
        /// Initial password (generated and printed if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Lock or unlock a user account
    SetUserActive {
        #[arg(long)]
        username: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Replace a user's password
    SetPassword {
        #[arg(long)]
        username: String,
        /// New password (reads from stdin if omitted)
        #[arg(long)]
        password: Option<String>,
        /// Require the user to change it again
        #[arg(long)]
        temporary: bool,
    },
    /// Add an accepted value for equipment type, brand or email domain
    AddParameter {
        /// equipment_type, brand or email_domain
        #[arg(long)]
        kind: ParameterKind,
        #[arg(long)]
        value: String,
    },
    /// Enable or disable an accepted parameter value
    SetParameterActive {
        #[arg(long)]
        kind: ParameterKind,
        #[arg(long)]
        value: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Delete a parameter value that no equipment uses
    RemoveParameter {
        #[arg(long)]
        kind: ParameterKind,
        #[arg(long)]
        value: String,
    },
    /// Register a new piece of equipment as available
    RegisterEquipment {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        serial: String,
        #[arg(long)]
        notes: Option<String>,
        /// Recorded as the author of the registration
        #[arg(long, default_value = "admin")]
        user: String,
    },
    /// Move equipment to another lifecycle status
    MoveEquipment {
        #[arg(long)]
        tag: String,
        /// Target status, e.g. assigned, on_loan, in_maintenance
        #[arg(long)]
        to: EquipmentStatus,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Expected return date of a loan (YYYY-MM-DD)
        #[arg(long)]
        return_date: Option<NaiveDate>,
        /// Recorded as the author of the movement
        #[arg(long, default_value = "admin")]
        user: String,
    },
    /// Write the movement history of one piece of equipment to a spreadsheet report
    ExportHistory {
        #[arg(long)]
        tag: String,
    },
}

/// Apply an administrative command to the store and describe what changed.
/// Returns `None` for commands that do not touch the store.
pub fn apply_store_command(
    store: &InventoryStore,
    reports: &ReportWriter,
    command: &Command,
) -> Result<Option<String>> {
    let message = match command {
        Command::AddUser {
            username,
            role,
            full_name,
            password: supplied,
        } => {
            let (plain, generated) = match supplied {
                Some(p) => (p.clone(), false),
                None => (
                    password::generate_temporary_password(password::TEMPORARY_PASSWORD_LENGTH),
                    true,
                ),
            };
            password::check_password_policy(&plain)?;
            let hash = password::hash_password(&plain)?;
            store
                .add_user(username, &hash, *role, full_name.as_deref(), true)
                .with_context(|| format!("adding user '{}'", username))?;
            store.log_system("User created", &format!("{} ({})", username, role), "cli");
            if generated {
                format!("User '{}' created as {}. Temporary password: {}", username, role, plain)
            } else {
                format!("User '{}' created as {}.", username, role)
            }
        }
        Command::SetUserActive { username, active } => {
            store.set_user_active(username, *active)?;
            let action = if *active { "User unlocked" } else { "User locked" };
            store.log_system(action, username, "cli");
            format!("{}: {}", action, username)
        }
        Command::SetPassword {
            username,
            password: supplied,
            temporary,
        } => {
            let plain = match supplied {
                Some(p) => p.clone(),
                None => read_stdin_line("New password: ")?,
            };
            password::check_password_policy(&plain)?;
            let hash = password::hash_password(&plain)?;
            store.set_password_hash(username, &hash, *temporary)?;
            store.log_system("Password changed", username, "cli");
            format!("Password updated for '{}'.", username)
        }
        Command::AddParameter { kind, value } => {
            store.add_parameter(*kind, value)?;
            store.log_system("Parameter added", &format!("{}: {}", kind.label(), value), "cli");
            format!("{} '{}' added.", kind.label(), value.trim())
        }
        Command::SetParameterActive {
            kind,
            value,
            active,
        } => {
            store.set_parameter_active(*kind, value, *active)?;
            let action = if *active { "Parameter enabled" } else { "Parameter disabled" };
            store.log_system(action, &format!("{}: {}", kind.label(), value), "cli");
            format!("{}: {} '{}'", action, kind.label(), value)
        }
        Command::RemoveParameter { kind, value } => {
            store.remove_parameter(*kind, value)?;
            store.log_system("Parameter removed", &format!("{}: {}", kind.label(), value), "cli");
            format!("{} '{}' removed.", kind.label(), value)
        }
        Command::RegisterEquipment {
            tag,
            kind,
            brand,
            model,
            serial,
            notes,
            user,
        } => {
            let equipment = store.register_equipment(
                NewEquipment {
                    tag: tag.clone(),
                    kind: kind.clone(),
                    brand: brand.clone(),
                    model: model.clone(),
                    serial: serial.clone(),
                    notes: notes.clone(),
                },
                user,
            )?;
            format!("Equipment {} registered as {}.", equipment.tag, equipment.status)
        }
        Command::MoveEquipment {
            tag,
            to,
            assignee,
            email,
            note,
            return_date,
            user,
        } => {
            let request = MoveRequest {
                to: *to,
                assignee: assignee.clone(),
                email: email.clone(),
                note: note.clone(),
                loan_return_date: *return_date,
            };
            let equipment = store.move_equipment(tag, request, user)?;
            format!("Equipment {} is now {}.", equipment.tag, equipment.status)
        }
        Command::ExportHistory { tag } => {
            let path = reports.equipment_history(store, tag)?;
            store.log_system("Report export", &format!("history of {}", tag), "cli");
            format!("History report written to {}", path.display())
        }
        Command::Serve | Command::HashPassword { .. } | Command::CheckConfig => return Ok(None),
    };
    store.flush()?;
    Ok(Some(message))
}

fn read_stdin_line(prompt: &str) -> Result<String> {
    eprintln!("{}", prompt);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
