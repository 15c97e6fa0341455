use bson::{Bson, Document};
use clap::{Args, Parser, Subcommand};
use docctl::controller::language_stages;
use docctl::{AppConfig, Controller, ControllerError, ControllerOptions, MemoryStore, SearchOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "docctl", version, about = "Compile search/filter query strings into aggregation pipelines", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). Falls back to $DOCCTL_CONFIG, then ./docctl.toml.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Log level (error|warn|info|debug|trace). Overrides config/env.")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct QueryArgs {
    #[arg(long, help = "Free-text search term, or a JSON object")]
    search: Option<String>,
    #[arg(long, help = "Filter string, e.g. 'foo:bar,count:{\"$gt\":1}'")]
    filter: Option<String>,
    #[arg(long, help = "Sort spec, e.g. '-createdAt,+name'")]
    sort: Option<String>,
    #[arg(long, requires = "page_size", help = "1-based page number")]
    page: Option<u64>,
    #[arg(long = "page-size", requires = "page")]
    page_size: Option<u64>,
    #[arg(long = "search-field", help = "Field the search term is matched against (repeatable)")]
    search_fields: Vec<String>,
    #[arg(long = "post-keyword", help = "Route fields containing this keyword after the custom stages (repeatable)")]
    post_keywords: Vec<String>,
    #[arg(long = "auto-regex", help = "Wrap plain search terms into a case-insensitive regex")]
    auto_regex: bool,
    #[arg(long, requires = "slug_field", help = "Preferred language (multi-language collections)")]
    language: Option<String>,
    #[arg(long = "slug-field", help = "Collapse language variants sharing this field")]
    slug_field: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the compiled aggregation pipeline as JSON")]
    Pipeline {
        #[command(flatten)]
        query: QueryArgs,
    },
    #[command(about = "Run the pipeline over an NDJSON file and print matching documents")]
    Search {
        #[arg(help = "NDJSON file, one document per line")]
        data: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
    #[command(about = "Count documents of an NDJSON file matching search/filter")]
    Count {
        #[arg(help = "NDJSON file, one document per line")]
        data: PathBuf,
        #[command(flatten)]
        query: QueryArgs,
    },
}

fn options_for(cfg: &AppConfig, query: &QueryArgs, collection: &str) -> ControllerOptions {
    let mut options = cfg.controller_options();
    if !query.search_fields.is_empty() {
        options.search.search_fields.clone_from(&query.search_fields);
    }
    if !query.post_keywords.is_empty() {
        options.search.post_match_keywords.clone_from(&query.post_keywords);
    }
    if query.auto_regex {
        options.search.auto_regexp_search = true;
    }
    if let Some(slug) = query.slug_field.clone() {
        let collection = collection.to_string();
        options = options.build_aggregate(move |o: &SearchOptions| {
            language_stages(&slug, &collection, o.language.as_deref())
        });
    }
    options
}

fn search_options(query: &QueryArgs) -> SearchOptions {
    let mut opts = SearchOptions::new();
    if let Some(s) = &query.search {
        opts = opts.search(s.as_str());
    }
    if let Some(f) = &query.filter {
        opts = opts.filter(f.as_str());
    }
    if let Some(s) = &query.sort {
        opts = opts.sort(s);
    }
    if let (Some(p), Some(n)) = (query.page, query.page_size) {
        opts = opts.page(p, n);
    }
    if let Some(l) = &query.language {
        opts = opts.language(l);
    }
    opts
}

fn read_ndjson(path: &Path) -> Result<Vec<Document>, ControllerError> {
    let file = std::fs::File::open(path).map_err(|e| ControllerError::Io(format!("{}: {e}", path.display())))?;
    let mut docs = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line)?;
        match Bson::try_from(value) {
            Ok(Bson::Document(d)) => docs.push(d),
            Ok(_) => return Err(ControllerError::Store(format!("line {}: not a JSON object", n + 1))),
            Err(e) => return Err(ControllerError::Store(format!("line {}: {e}", n + 1))),
        }
    }
    log::info!("loaded {} document(s) from {}", docs.len(), path.display());
    Ok(docs)
}

fn collection_name(cfg: &AppConfig, data: Option<&Path>) -> String {
    cfg.collection
        .clone()
        .or_else(|| data.and_then(Path::file_stem).and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_else(|| "docctl".to_string())
}

fn to_json(doc: &Document) -> serde_json::Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

async fn run(cli: Cli, cfg: AppConfig) -> Result<(), ControllerError> {
    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Pipeline { query } => {
            let name = collection_name(&cfg, None);
            let controller = Controller::new(Arc::new(MemoryStore::new(&name)), options_for(&cfg, &query, &name))?;
            let pipeline: Vec<serde_json::Value> =
                controller.compute_pipeline(&search_options(&query))?.to_documents().iter().map(to_json).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&pipeline)?)?;
        }
        Commands::Search { data, query } => {
            let name = collection_name(&cfg, Some(&data));
            let store = MemoryStore::with_documents(&name, read_ndjson(&data)?);
            let controller = Controller::new(Arc::new(store), options_for(&cfg, &query, &name))?;
            for doc in controller.search(&search_options(&query)).await? {
                writeln!(out, "{}", to_json(&doc))?;
            }
        }
        Commands::Count { data, query } => {
            let name = collection_name(&cfg, Some(&data));
            let store = MemoryStore::with_documents(&name, read_ndjson(&data)?);
            let controller = Controller::new(Arc::new(store), options_for(&cfg, &query, &name))?;
            writeln!(out, "{}", controller.count(&search_options(&query)).await?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut cfg = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(level) = cli.log_level.clone() {
        cfg.logging.level = Some(level);
    }
    if let Err(e) = cfg.init_logging() {
        eprintln!("warning: logging disabled: {e}");
    }
    if let Err(e) = run(cli, cfg).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
