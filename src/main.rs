//! CLI interface for the prescription store

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medimate_store::{
    logging, AccountStore, AppConfig, Metadata, SessionStore, Vector, VectorStore, DEFAULT_TOP_K,
};
use serde_json::Value;
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "medimate")]
#[command(about = "Local vector store and session history for prescription documents", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./medimate.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overriding the configured one
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and store texts, skipping ones already stored
    Add {
        /// Text to store (repeatable)
        #[arg(short, long = "text", required = true)]
        texts: Vec<String>,
        /// Target namespace (default collection if omitted)
        #[arg(long)]
        namespace: Option<String>,
        /// Tag every text with this prescription id
        #[arg(long)]
        prescription_id: Option<String>,
    },
    /// Embed and store a prescription's chunks in the default collection
    AddPrescription {
        /// Prescription ID
        id: String,
        /// Chunk text, in document order (repeatable)
        #[arg(short, long = "chunk", required = true)]
        chunks: Vec<String>,
        /// Extra metadata as key=value (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        meta: Vec<(String, String)>,
    },
    /// Search for chunks similar to a query
    Search {
        /// Query text
        #[arg(required_unless_present = "vector")]
        query: Option<String>,
        /// Pre-computed query embedding, comma-separated (skips embedding)
        #[arg(long, conflicts_with = "query")]
        vector: Option<Vector>,
        /// Only consider chunks of this prescription
        #[arg(long)]
        prescription_id: Option<String>,
        /// Namespace to search (default collection if omitted)
        #[arg(long)]
        namespace: Option<String>,
        /// Number of results to return
        #[arg(short, long, default_value_t = DEFAULT_TOP_K)]
        k: usize,
    },
    /// List stored record IDs, or namespaces when none is given
    List {
        #[arg(long)]
        namespace: Option<String>,
    },
    /// List sessions, or one user's prescriptions
    Sessions {
        #[arg(long)]
        user: Option<String>,
    },
    /// Create a user account; the password is read from stdin
    Register { username: String },
    /// Check a user's password, read from stdin
    Login { username: String },
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

fn prescription_metadata(prescription_id: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("prescription_id".to_string(), Value::from(prescription_id));
    metadata
}

fn run(config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            texts,
            namespace,
            prescription_id,
        } => {
            let store = VectorStore::from_config(config)?;
            let metadata: Vec<Metadata> = match &prescription_id {
                Some(pid) => texts.iter().map(|_| prescription_metadata(pid)).collect(),
                None => vec![],
            };
            if !store.add_texts(&texts, &metadata, namespace.as_deref())? {
                bail!("no embedding capability configured (set GOOGLE_API_KEY)");
            }
            println!("Stored {} text(s)", texts.len());
        }
        Commands::AddPrescription { id, chunks, meta } => {
            let store = VectorStore::from_config(config)?;
            let metadata: Metadata = meta
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();
            if !store.add_prescription(&id, &chunks, &metadata)? {
                bail!("no embedding capability configured (set GOOGLE_API_KEY)");
            }
            println!("Stored {} chunk(s) for prescription {}", chunks.len(), id);
        }
        Commands::Search {
            query,
            vector,
            prescription_id,
            namespace,
            k,
        } => {
            let results = match (vector, query) {
                (Some(vector), _) => VectorStore::open(config.vectors_dir(), None)?
                    .search_vector(&vector, prescription_id.as_deref(), namespace.as_deref(), k),
                (None, Some(query)) => VectorStore::from_config(config)?.search(
                    &query,
                    prescription_id.as_deref(),
                    namespace.as_deref(),
                    k,
                ),
                (None, None) => bail!("either a query or --vector is required"),
            }
            .context("search failed")?;

            if results.is_empty() {
                println!("No results found");
            } else {
                println!("Top {} results:", results.len());
                for (i, result) in results.iter().enumerate() {
                    println!(
                        "{}. {} (score: {:.4}) {}",
                        i + 1,
                        result.id,
                        result.score,
                        result.text().unwrap_or("")
                    );
                }
            }
        }
        Commands::List { namespace } => {
            let store = VectorStore::from_config(config)?;
            match namespace {
                Some(ns) => {
                    let ids = store.list_ids(Some(ns.as_str()))?;
                    if ids.is_empty() {
                        println!("No vectors in namespace '{}'", ns);
                    } else {
                        println!("Vector IDs ({} total):", ids.len());
                        for id in ids {
                            println!("  - {}", id);
                        }
                    }
                }
                None => {
                    for ns in store.namespaces()? {
                        let count = store.count(ns.as_deref())?;
                        let name = ns.as_deref().unwrap_or("<default>");
                        println!("{} ({} vectors)", name, count);
                    }
                }
            }
        }
        Commands::Sessions { user } => {
            let sessions = SessionStore::open(&config.data_dir)?;
            match user {
                Some(user) => {
                    for p in sessions.user_prescriptions(&user) {
                        println!("{}  {}", p.id, p.title);
                    }
                }
                None => {
                    for s in sessions.all_sessions() {
                        println!(
                            "{}  user={} prescription={} last_active={}",
                            s.session_id,
                            s.user_id,
                            s.prescription_id,
                            s.last_active.to_rfc3339()
                        );
                    }
                }
            }
        }
        Commands::Register { username } => {
            let accounts = AccountStore::open(&config.data_dir)?;
            if !accounts.register(&username, &read_password()?)? {
                bail!("username '{}' already exists", username);
            }
            println!("Registered {}", username);
        }
        Commands::Login { username } => {
            let accounts = AccountStore::open(&config.data_dir)?;
            if !accounts.login(&username, &read_password()?)? {
                bail!("invalid username or password");
            }
            println!("Login successful");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    run(&config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("doctor=Dr. Rao").unwrap(),
            ("doctor".to_string(), "Dr. Rao".to_string())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::parse_from([
            "medimate",
            "search",
            "alcohol",
            "--prescription-id",
            "P1",
            "-k",
            "1",
        ]);
        match cli.command {
            Commands::Search {
                query,
                prescription_id,
                k,
                ..
            } => {
                assert_eq!(query.as_deref(), Some("alcohol"));
                assert_eq!(prescription_id.as_deref(), Some("P1"));
                assert_eq!(k, 1);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_cli_search_by_vector() {
        let cli = Cli::parse_from(["medimate", "search", "--vector", "0.1, 0.2,0.3"]);
        match cli.command {
            Commands::Search { query, vector, .. } => {
                assert!(query.is_none());
                assert_eq!(vector.unwrap().as_slice(), &[0.1, 0.2, 0.3]);
            }
            _ => panic!("expected search"),
        }

        assert!(Cli::try_parse_from(["medimate", "search", "--vector", "0.1,abc"]).is_err());
        assert!(Cli::try_parse_from(["medimate", "search"]).is_err());
        assert!(
            Cli::try_parse_from(["medimate", "search", "alcohol", "--vector", "1,0"]).is_err()
        );
    }
}
