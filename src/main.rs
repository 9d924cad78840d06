use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ldap_facade::{Configuration, Directory, DirectoryError, Result, Search};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `config.yaml` file.
    #[clap(long, short)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Add an entry. Attributes are a JSON object.
    Add { dn: String, attributes: String },
    /// Delete an existing entry.
    Delete { dn: String },
    /// Print an entry.
    Read { dn: String },
    /// Check whether an entry exists.
    Exists { dn: String },
    /// Compare one attribute value, e.g. `{"sn": "doe"}`.
    Compare { dn: String, assertion: String },
    /// Move an entry to `new_rdn,new_superior`.
    Rename {
        dn: String,
        new_rdn: String,
        new_superior: String,
        /// Keep the old RDN value as an attribute.
        #[clap(long)]
        keep_old_rdn: bool,
    },
    /// Modify an entry with a JSON list of `[kind, {attributes}]` pairs.
    Modify { dn: String, pairs: String },
    /// Search with JSON parameters (`base`, `filter`, `scope`, `filterArgs`).
    Search {
        #[clap(default_value = "{}")]
        params: String,
    },
    /// Search expecting at most one entry.
    SearchUnique { params: String },
    /// Print entries one JSON line at a time while they arrive.
    Each {
        #[clap(default_value = "{}")]
        params: String,
    },
}

fn object(input: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DirectoryError::config(format!("expected a JSON object: {input}"))),
        Err(err) => Err(DirectoryError::config(format!("invalid JSON: {err}"))),
    }
}

fn list(input: &str) -> Result<Vec<Value>> {
    match serde_json::from_str(input) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(DirectoryError::config(format!("expected a JSON list: {input}"))),
        Err(err) => Err(DirectoryError::config(format!("invalid JSON: {err}"))),
    }
}

async fn run(ldap: Directory, cmd: Commands) -> Result<Value> {
    let output = match cmd {
        Commands::Add { dn, attributes } => {
            ldap.add(&dn, &object(&attributes)?).await?;
            Value::Null
        },
        Commands::Delete { dn } => {
            ldap.delete(&dn).await?;
            Value::Null
        },
        Commands::Read { dn } => ldap.read(&dn).await?.to_value(),
        Commands::Exists { dn } => Value::Bool(ldap.exists(&dn).await?),
        Commands::Compare { dn, assertion } => {
            Value::Bool(ldap.compare(&dn, &object(&assertion)?).await?)
        },
        Commands::Rename {
            dn,
            new_rdn,
            new_superior,
            keep_old_rdn,
        } => {
            ldap.modify_dn(&dn, &new_rdn, !keep_old_rdn, &new_superior)
                .await?;
            Value::Null
        },
        Commands::Modify { dn, pairs } => {
            ldap.modify_pairs(&dn, &list(&pairs)?).await?;
            Value::Null
        },
        Commands::Search { params } => ldap
            .search_map(&object(&params)?)
            .await?
            .iter()
            .map(|entry| entry.to_value())
            .collect(),
        Commands::SearchUnique { params } => ldap
            .search_unique_map(&object(&params)?)
            .await?
            .map(|entry| entry.to_value())
            .unwrap_or_default(),
        Commands::Each { params } => {
            let search = Search::from_map(&object(&params)?)?;
            ldap.each_entry(&search, |entry| {
                serde_json::to_string(&entry.to_value()).map(|line| println!("{line}"))
            })
            .await?;
            Value::Null
        },
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    ldap_facade::telemetry::setup_logging();

    let args = Args::parse();

    let mut config = Configuration::default();
    if let Some(path) = args.config {
        config = config.path(path);
    }
    let settings = config.read()?.settings()?;
    tracing::debug!(url = %settings.url, anonymous = settings.is_anonymous(), "using directory");

    let ldap = Directory::with_connector(settings, ldap_facade::ldap::LdapConnector);
    match run(ldap, args.cmd).await {
        Ok(Value::Null) => Ok(()),
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        },
        Err(err) => {
            tracing::error!(error = %err, "directory operation failed");
            Err(err.into())
        },
    }
}
