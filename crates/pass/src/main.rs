//! pass - offline password manager
//!
//! Store passwords securely in a local file, encrypted with a master
//! password. Remember one password and forget about the rest.

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use pass::clipboard;
use pass::db::{self, Database};
use pass::entry::{self, Entry};
use pass::prompt;
use pass::session::Session;
use pass_core::{Config, Paths};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pass")]
#[command(about = "Offline password manager - one master password for a local encrypted database")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = r#"SESSION CACHE:
    The master password is cached in shared memory for a short window
    (60 seconds by default) so consecutive commands skip the prompt.
    A detached daemon scrubs the cache when the window elapses.

DATABASE:
    A single encrypted file (~/passdb), created on first use. Encryption
    and decryption are delegated to the openssl CLI (>= 3.0 required)."#)]
struct Cli {
    /// Identifier whose password is copied to the clipboard
    identifier: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new entry with a generated password and copy it to the clipboard
    Add {
        /// Entry identifier (alphanumeric, underscore, dash)
        identifier: String,
    },

    /// Store your own password under the identifier
    Put {
        /// Entry identifier (alphanumeric, underscore, dash)
        identifier: String,
    },

    /// Remove an existing entry from the database
    Del {
        /// Entry identifier to remove
        identifier: String,
    },

    /// List all entries in the database
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.command.is_none() && cli.identifier.is_none() {
        Cli::command().print_help()?;
        std::process::exit(2);
    }

    db::check_openssl()?;

    let paths = Paths::resolve()?;
    let config = Config::load(&paths.config_file)?;
    let database = Database::new(&paths.database);

    match (cli.command, cli.identifier) {
        (Some(Commands::Add { identifier }), _) => cmd_add(database, &config, &identifier),
        (Some(Commands::Put { identifier }), _) => cmd_put(database, &config, &identifier),
        (Some(Commands::Del { identifier }), _) => cmd_del(database, &config, &identifier),
        (Some(Commands::List), _) => cmd_list(database, &config),
        (None, Some(identifier)) => cmd_copy(database, &config, &identifier),
        (None, None) => unreachable!("handled above"),
    }
}

/// Create an entry with a freshly generated password.
fn cmd_add(database: Database, config: &Config, identifier: &str) -> Result<()> {
    ensure_identifier(identifier)?;
    let mut session = Session::open(database, config)?;

    let password = match entry::find(&session.entries, identifier) {
        Some(idx) => {
            if !prompt::confirm_overwrite()? {
                return Ok(());
            }
            let password = entry::generate_password(config.password_bytes)?;
            session.entries[idx].set_password(password.clone());
            password
        }
        None => {
            let password = entry::generate_password(config.password_bytes)?;
            session
                .entries
                .push(Entry::new(identifier.to_string(), password.clone()));
            password
        }
    };

    session.save()?;
    clipboard::copy(password.as_str(), config.clipboard_command.as_deref())?;
    println!("Password copied to clipboard.");
    Ok(())
}

/// Store a user-supplied password under the identifier.
fn cmd_put(database: Database, config: &Config, identifier: &str) -> Result<()> {
    ensure_identifier(identifier)?;
    let mut session = Session::open(database, config)?;

    match entry::find(&session.entries, identifier) {
        Some(idx) => {
            if !prompt::confirm_overwrite()? {
                return Ok(());
            }
            let password = prompt::user_password()?;
            session.entries[idx].set_password(password);
        }
        None => {
            let password = prompt::user_password()?;
            session
                .entries
                .push(Entry::new(identifier.to_string(), password));
        }
    }

    session.save()?;
    println!("Password stored in database.");
    Ok(())
}

fn cmd_del(database: Database, config: &Config, identifier: &str) -> Result<()> {
    ensure_identifier(identifier)?;
    let mut session = Session::open(database, config)?;

    match entry::find(&session.entries, identifier) {
        Some(idx) => {
            session.entries.remove(idx);
            session.save()?;
            println!("Password removed from database.");
        }
        None => println!("No entry found for key \"{}\".", identifier),
    }
    Ok(())
}

fn cmd_list(database: Database, config: &Config) -> Result<()> {
    let session = Session::open(database, config)?;
    for entry in &session.entries {
        println!("{}", entry.identifier);
    }
    Ok(())
}

/// Default action: copy the entry's password to the clipboard.
fn cmd_copy(database: Database, config: &Config, identifier: &str) -> Result<()> {
    let session = Session::open(database, config)?;

    match entry::find(&session.entries, identifier) {
        Some(idx) => {
            clipboard::copy(
                session.entries[idx].password().as_str(),
                config.clipboard_command.as_deref(),
            )?;
            println!("Password copied to clipboard.");
        }
        None => println!("No entry found for key \"{}\".", identifier),
    }
    Ok(())
}

fn ensure_identifier(identifier: &str) -> Result<()> {
    if !entry::valid_identifier(identifier) {
        bail!("Identifier can only be alphanumeric, with underscore and/or a dash.");
    }
    Ok(())
}
