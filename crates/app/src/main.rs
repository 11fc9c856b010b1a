use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use docqa_core::gemini::{
    DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, TEXT_EMBEDDING_004_DIMENSIONS,
};
use docqa_core::models::DEFAULT_PUBLIC_PREFIX;
use docqa_core::{
    discover_ocr_files, mime_type_for, relative_storage_path, CharacterNgramEmbedder,
    DocumentAiClient, DocumentAiSettings, DocumentCoordinator, Embedder, GeminiEmbedder,
    GeminiGenerator, GeminiSettings, Generator, LocalIndex, LocalStorage, ObjectStore,
    PipelineOptions, QdrantStore, SupabaseStorage, VectorIndex, VertexSettings,
    VertexVectorSearch,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StorageBackend {
    Local,
    Supabase,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexBackend {
    Local,
    Qdrant,
    Vertex,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderBackend {
    Ngram,
    Gemini,
}

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Where OCR JSON objects are read from and written to.
    #[arg(long, value_enum, default_value = "local", env = "DOCQA_STORAGE")]
    storage: StorageBackend,

    #[arg(long, value_enum, default_value = "local", env = "DOCQA_INDEX")]
    index: IndexBackend,

    #[arg(long, value_enum, default_value = "ngram", env = "DOCQA_EMBEDDER")]
    embedder: EmbedderBackend,

    /// Root directory of the local object store.
    #[arg(long, default_value = ".", env = "DOCQA_STORAGE_ROOT")]
    storage_root: PathBuf,

    /// Snapshot file of the local vector index.
    #[arg(long, default_value = ".docqa/index.json", env = "DOCQA_INDEX_PATH")]
    index_path: PathBuf,

    /// Public URL prefix stripped from document references.
    #[arg(long, default_value = DEFAULT_PUBLIC_PREFIX, env = "DOCQA_PUBLIC_PREFIX")]
    public_prefix: String,

    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    #[arg(long, default_value = "ocr_bucket", env = "SUPABASE_BUCKET")]
    supabase_bucket: String,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// OAuth bearer token for Document AI and Vertex AI.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    google_access_token: Option<String>,

    #[arg(long, default_value = DEFAULT_GENERATION_MODEL, env = "GENERATION_MODEL")]
    generation_model: String,

    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL, env = "EMBEDDING_MODEL")]
    embedding_model: String,

    #[arg(long, env = "PROJECT_ID")]
    project_id: Option<String>,

    #[arg(long, default_value = "us-central1", env = "LOCATION")]
    location: String,

    /// Document AI location, which is usually multi-regional.
    #[arg(long, default_value = "us", env = "DOCUMENT_AI_LOCATION")]
    document_ai_location: String,

    #[arg(long, env = "PROCESSOR_ID")]
    processor_id: Option<String>,

    #[arg(long, env = "PROCESSOR_VERSION")]
    processor_version: Option<String>,

    #[arg(long, env = "VECTOR_SEARCH_INDEX_ID")]
    vector_search_index_id: Option<String>,

    #[arg(long, env = "VECTOR_SEARCH_ENDPOINT_ID")]
    vector_search_endpoint_id: Option<String>,

    #[arg(long, env = "DEPLOYED_INDEX_ID")]
    deployed_index_id: Option<String>,

    /// Public endpoint domain serving findNeighbors, if any.
    #[arg(long, env = "VECTOR_SEARCH_QUERY_HOST")]
    vector_search_query_host: Option<String>,

    #[arg(long, default_value = "http://localhost:6333", env = "QDRANT_URL")]
    qdrant_url: String,

    #[arg(long, default_value = "document_chunks", env = "QDRANT_COLLECTION")]
    qdrant_collection: String,

    /// Neighbours requested from the index per question.
    #[arg(long, default_value = "25")]
    num_neighbors: usize,
}

#[derive(Subcommand)]
enum Command {
    /// OCR a local file and store the layout JSON.
    Ocr {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the quality-filtered chunks of a stored document as JSON.
    Chunks {
        #[arg(long)]
        document: String,
    },
    /// Chunk, embed and index one stored document.
    Index {
        #[arg(long)]
        document: String,
    },
    /// Index every OCR JSON file found under a folder.
    IndexFolder {
        #[arg(long)]
        folder: PathBuf,
    },
    /// Show the context a question would be answered from.
    Retrieve {
        #[arg(long)]
        document: String,
        #[arg(long)]
        question: String,
    },
    /// Answer a question from one document.
    Ask {
        #[arg(long)]
        document: String,
        #[arg(long)]
        question: String,
    },
    /// Summarize a document while indexing it.
    Summarize {
        #[arg(long)]
        document: String,
    },
    /// List risky rental-agreement clauses as JSON.
    Risks {
        #[arg(long)]
        document: String,
    },
}

impl Command {
    fn generates(&self) -> bool {
        matches!(
            self,
            Command::Ask { .. } | Command::Summarize { .. } | Command::Risks { .. }
        )
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{name} is required for this backend"))
}

fn build_embedder(cli: &Cli) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(match cli.embedder {
        EmbedderBackend::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        EmbedderBackend::Gemini => Arc::new(GeminiEmbedder::new(
            GeminiSettings::new(
                required(&cli.google_api_key, "GOOGLE_API_KEY")?,
                &cli.embedding_model,
            ),
            TEXT_EMBEDDING_004_DIMENSIONS,
        )),
    })
}

fn build_storage(cli: &Cli, root: &Path) -> anyhow::Result<Arc<dyn ObjectStore>> {
    Ok(match cli.storage {
        StorageBackend::Local => Arc::new(LocalStorage::new(root)),
        StorageBackend::Supabase => Arc::new(SupabaseStorage::new(
            required(&cli.supabase_url, "SUPABASE_URL")?,
            required(&cli.supabase_key, "SUPABASE_KEY")?,
            &cli.supabase_bucket,
        )?),
    })
}

async fn build_index(cli: &Cli, dimensions: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
    Ok(match cli.index {
        IndexBackend::Local => Arc::new(LocalIndex::open(&cli.index_path).await?),
        IndexBackend::Qdrant => {
            let store = QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection, dimensions);
            store.ensure_collection().await?;
            Arc::new(store)
        }
        IndexBackend::Vertex => Arc::new(VertexVectorSearch::new(VertexSettings {
            project_id: required(&cli.project_id, "PROJECT_ID")?.to_string(),
            location: cli.location.clone(),
            index_id: required(&cli.vector_search_index_id, "VECTOR_SEARCH_INDEX_ID")?
                .to_string(),
            index_endpoint_id: required(
                &cli.vector_search_endpoint_id,
                "VECTOR_SEARCH_ENDPOINT_ID",
            )?
            .to_string(),
            deployed_index_id: required(&cli.deployed_index_id, "DEPLOYED_INDEX_ID")?
                .to_string(),
            access_token: required(&cli.google_access_token, "GOOGLE_ACCESS_TOKEN")?
                .to_string(),
            query_host: cli.vector_search_query_host.clone(),
            api_host: None,
        })),
    })
}

fn build_generator(cli: &Cli) -> anyhow::Result<Arc<dyn Generator>> {
    let api_key = if cli.command.generates() {
        required(&cli.google_api_key, "GOOGLE_API_KEY")?.to_string()
    } else {
        cli.google_api_key.clone().unwrap_or_default()
    };
    Ok(Arc::new(GeminiGenerator::new(GeminiSettings::new(
        api_key,
        &cli.generation_model,
    ))))
}

fn build_ocr(cli: &Cli) -> anyhow::Result<DocumentAiClient> {
    Ok(DocumentAiClient::new(DocumentAiSettings {
        project_id: required(&cli.project_id, "PROJECT_ID")?.to_string(),
        location: cli.document_ai_location.clone(),
        processor_id: required(&cli.processor_id, "PROCESSOR_ID")?.to_string(),
        processor_version: cli.processor_version.clone(),
        access_token: required(&cli.google_access_token, "GOOGLE_ACCESS_TOKEN")?.to_string(),
        endpoint: None,
    }))
}

async fn build_coordinator(cli: &Cli, storage_root: &Path) -> anyhow::Result<DocumentCoordinator> {
    let embedder = build_embedder(cli)?;
    let index = build_index(cli, embedder.dimensions()).await?;
    let options = PipelineOptions {
        num_neighbors: cli.num_neighbors,
        public_url_prefix: cli.public_prefix.clone(),
        ..PipelineOptions::default()
    };

    let coordinator = DocumentCoordinator::new(
        build_storage(cli, storage_root)?,
        embedder,
        index,
        build_generator(cli)?,
    )
    .with_options(options);

    Ok(match cli.command {
        Command::Ocr { .. } => coordinator.with_ocr(Arc::new(build_ocr(cli)?)),
        _ => coordinator,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let storage_root = match &cli.command {
        Command::IndexFolder { folder } => folder.clone(),
        _ => cli.storage_root.clone(),
    };
    if matches!(cli.command, Command::IndexFolder { .. })
        && !matches!(cli.storage, StorageBackend::Local)
    {
        bail!("index-folder reads files from disk and needs --storage local");
    }

    let coordinator = build_coordinator(&cli, &storage_root).await?;
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        storage = ?cli.storage,
        index = ?cli.index,
        embedder = ?cli.embedder,
        "docqa boot"
    );

    match &cli.command {
        Command::Ocr { file } => {
            let content = tokio::fs::read(file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let upload = coordinator
                .process_upload(&content, mime_type_for(&file_name))
                .await?;
            println!("{}", serde_json::to_string_pretty(&upload)?);
        }
        Command::Chunks { document } => {
            let chunks = coordinator.chunk_document(document).await?;
            println!("{}", serde_json::to_string_pretty(&chunks)?);
        }
        Command::Index { document } => {
            let report = coordinator.index_document(document).await?;
            println!(
                "{} chunks indexed for {} at {}",
                report.indexed_count,
                report.document_id,
                Utc::now().to_rfc3339()
            );
        }
        Command::IndexFolder { folder } => {
            let files = discover_ocr_files(folder);
            if files.is_empty() {
                println!("0 documents indexed (no OCR JSON files found)");
            }

            let mut indexed = 0usize;
            let mut failed = 0usize;
            for file in &files {
                let storage_path = relative_storage_path(folder, file)?;
                match coordinator.index_document(&storage_path).await {
                    Ok(report) => {
                        indexed += 1;
                        info!(
                            path = %storage_path,
                            document_id = %report.document_id,
                            chunks = report.indexed_count,
                            "indexed document"
                        );
                    }
                    Err(error) => {
                        failed += 1;
                        warn!(path = %storage_path, %error, "skipped document");
                    }
                }
            }

            if !files.is_empty() {
                println!("{indexed} documents indexed, {failed} skipped");
            }
        }
        Command::Retrieve { document, question } => {
            let context = coordinator.retrieve_context(question, document).await?;
            println!(
                "strict={} relaxed={} chunks={}",
                context.strict_count,
                context.relaxed,
                context.texts.len()
            );
            for (rank, text) in context.texts.iter().enumerate() {
                println!("[{}] {text}", rank + 1);
            }
        }
        Command::Ask { document, question } => {
            println!("{}", coordinator.answer(question, document).await?);
        }
        Command::Summarize { document } => {
            println!("{}", coordinator.summarize(document).await?);
        }
        Command::Risks { document } => {
            let report = coordinator.extract_risks(document).await?;
            if report.statements.is_empty() && !report.raw_response.is_empty() {
                warn!("risk reply was not a JSON list; printing it verbatim");
                println!("{}", report.raw_response);
            } else {
                println!("{}", serde_json::to_string_pretty(&report.statements)?);
            }
        }
    }

    Ok(())
}
