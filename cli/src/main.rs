use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use invlist::{DocId, Document, IndexConfig, IndexEngine, LoadPolicy};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "invlist")]
#[command(about = "Register names and run AND queries over an inverted-list index", long_about = None)]
struct Cli {
    /// Index directory
    #[arg(long, default_value = "./index")]
    index: String,
    /// Fail on unreadable index files instead of starting from empty tables
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Sync every write to disk
    #[arg(long, default_value_t = false)]
    sync: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register documents given as ID=NAME
    Register {
        #[arg(required = true, allow_hyphen_values = true)]
        entries: Vec<String>,
    },
    /// Register documents from JSON/JSONL files or ID=NAME text files
    Load {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Print the documents containing every known term of the query
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Print the name registered under an id
    Name {
        #[arg(allow_negative_numbers = true)]
        id: DocId,
    },
    /// Print index statistics as JSON
    Stats,
}

#[derive(Debug, Default)]
struct LoadSummary {
    registered: usize,
    /// One user-facing line per document that was not registered.
    skipped: Vec<String>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let policy = if cli.strict { LoadPolicy::Strict } else { LoadPolicy::Tolerant };
    let config = IndexConfig::new(&cli.index).with_load_policy(policy).with_sync_writes(cli.sync);
    let mut engine = IndexEngine::open(&config).with_context(|| format!("opening index at {}", cli.index))?;

    match cli.command {
        Commands::Register { entries } => {
            let mut summary = LoadSummary::default();
            for entry in entries {
                let doc = parse_entry(&entry)?;
                register(&mut engine, &doc, &mut summary)?;
            }
            tracing::info!(registered = summary.registered, skipped = summary.skipped.len(), "register complete");
        }
        Commands::Load { input } => {
            let summary = load(&mut engine, Path::new(&input))?;
            tracing::info!(input, registered = summary.registered, skipped = summary.skipped.len(), "load complete");
        }
        Commands::Search { terms } => {
            let ids = engine.search(&terms.join(" "))?;
            for id in ids {
                println!("{} - {}", id, engine.resolve_name(id).unwrap_or("Invalid ID"));
            }
        }
        Commands::Name { id } => {
            println!("{}", engine.resolve_name(id).unwrap_or("Invalid ID"));
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&engine.stats()?)?);
        }
    }
    Ok(())
}

fn register(engine: &mut IndexEngine, doc: &Document, summary: &mut LoadSummary) -> Result<()> {
    match engine.register_document(doc) {
        Ok(()) => summary.registered += 1,
        Err(e) if e.is_recoverable() => {
            tracing::warn!(id = doc.id, error = %e, "document skipped");
            let notice = format!("skipped {}: {}", doc.id, e);
            eprintln!("{notice}");
            summary.skipped.push(notice);
        }
        Err(e) => return Err(e).with_context(|| format!("registering document {}", doc.id)),
    }
    Ok(())
}

/// Parse `ID=NAME`. Only the first `=` separates; the name keeps the rest.
fn parse_entry(entry: &str) -> Result<Document> {
    let (id, name) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("expected ID=NAME, got {entry:?}"))?;
    let id: DocId = id.trim().parse().with_context(|| format!("invalid id in {entry:?}"))?;
    Ok(Document { id, name: name.trim().to_string() })
}

fn load(engine: &mut IndexEngine, input: &Path) -> Result<LoadSummary> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl" | "txt") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(anyhow!("input {} does not exist", input.display()));
    }

    let mut summary = LoadSummary::default();
    for file in files {
        let docs = match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => read_jsonl(&file)?,
            Some("json") => read_json(&file)?,
            _ => read_entries(&file)?,
        };
        tracing::debug!(file = %file.display(), documents = docs.len(), "read input file");
        for doc in &docs {
            register(engine, doc, &mut summary)?;
        }
    }
    Ok(summary)
}

fn read_jsonl(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Document>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

fn read_entries(file: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(parse_entry(&line)?);
    }
    Ok(docs)
}
