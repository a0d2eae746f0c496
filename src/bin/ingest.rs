//! Rebuild the vector index from the documents in `RAG_DATA_DIR`.

use tracing_subscriber::EnvFilter;

use datasheet_rag::chunking::TextSplitter;
use datasheet_rag::config::Config;
use datasheet_rag::ingest::ingest_dir;
use datasheet_rag::state::{build_http_client, open_index};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Ingesting {} into {} (chunk size {}, overlap {})",
        config.data_dir.display(),
        config.index_dir.display(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let index = open_index(&config, &build_http_client()?)?;
    let splitter = TextSplitter::from_config(&config.chunking);
    let report = ingest_dir(&config.data_dir, &splitter, index.embedder(), index.store()).await?;

    for (source, count) in &report.sources {
        tracing::info!("  {source}: {count} passage(s)");
    }
    for skipped in &report.skipped {
        tracing::warn!("  skipped {skipped}");
    }
    tracing::info!(
        "Done: {} file(s), {} page(s), {} passage(s)",
        report.files,
        report.pages,
        report.chunks
    );
    Ok(())
}
