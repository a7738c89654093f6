use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use human_bytes::human_bytes;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::conf::Config;
use crate::es_client::EsClient;
use crate::models::bulk::BulkAction;

/// Documents are opaque JSON objects, re-serialized unchanged.
pub type Document = Map<String, Value>;

/// Typeless bulk action lines require this cluster major version.
const MIN_SUPPORTED_MAJOR: u64 = 7;

/// What to do with the target index before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPlan {
    pub delete: bool,
    pub create: bool,
}

/// Lifecycle decision for the (exists, add, delete) flag combinations. An
/// existing index with neither flag given is refused so that data is never
/// appended or destroyed without explicit intent.
pub fn plan_index_actions(exists: bool, add: bool, delete: bool) -> Result<IndexPlan> {
    if exists {
        match (add, delete) {
            (_, true) => Ok(IndexPlan {
                delete: true,
                create: true,
            }),
            (true, false) => Ok(IndexPlan {
                delete: false,
                create: false,
            }),
            (false, false) => {
                bail!("index exists, use --delete to recreate or --add to append")
            }
        }
    } else {
        if delete {
            warn!("index does not exist, nothing to delete");
        }
        Ok(IndexPlan {
            delete: false,
            create: true,
        })
    }
}

/// `{"settings": S, "mappings": M}` with `{}` for any file not supplied.
/// Malformed JSON in either file aborts before any request is issued.
pub fn build_create_index_body(
    settings: Option<&Path>,
    mappings: Option<&Path>,
) -> Result<Value> {
    let settings = read_json_value(settings, "settings")?;
    let mappings = read_json_value(mappings, "mappings")?;
    Ok(json!({"settings": settings, "mappings": mappings}))
}

fn read_json_value(path: Option<&Path>, what: &str) -> Result<Value> {
    match path {
        None => Ok(json!({})),
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {what} file {path:?}"))?;
            serde_json::from_str(&content).with_context(|| format!("parsing {what} file {path:?}"))
        }
    }
}

/// Reads the whole data file into memory and parses it as a JSON array of
/// objects. Memory usage is proportional to the file size, by design.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read(path).with_context(|| format!("reading data file {path:?}"))?;
    debug!(size = %human_bytes(raw.len() as f64), "data file read into memory");
    let docs: Vec<Document> = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing data file {path:?} as a JSON array of objects"))?;
    if let Some(usage) = memory_stats::memory_stats() {
        debug!(physical_mem = %human_bytes(usage.physical_mem as f64), "memory usage after load");
    }
    Ok(docs)
}

/// Newline-delimited action/document pairs for one batch. The body carries a
/// trailing newline, as the bulk endpoint requires.
pub fn build_bulk_body(index: &str, docs: &[Document]) -> Result<String> {
    let action = serde_json::to_string(&BulkAction::new(index))?;
    let mut body = String::new();
    for doc in docs {
        body.push_str(&action);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

/// The whole load sequence: cluster ping, existence check, lifecycle
/// actions, document load, sequential batch upload.
pub async fn run(es: &EsClient, conf: &Config) -> Result<()> {
    match es.server_info().await {
        Ok(server_info) => {
            info!(
                hostname = server_info.get_hostname(),
                cluster = server_info.get_name(),
                uuid = server_info.get_uuid().unwrap_or("-"),
                version = server_info.get_version(),
                lucene = server_info.get_lucene_version(),
                "connected to Elasticsearch"
            );
            if let Some(major) = server_info.get_version_major() {
                if major < MIN_SUPPORTED_MAJOR {
                    warn!(
                        major,
                        "cluster older than Elasticsearch {MIN_SUPPORTED_MAJOR}, typeless bulk \
                         requests may be rejected"
                    );
                }
            }
        }
        Err(err) => warn!("could not fetch cluster info: {err:#}"),
    }

    let index = conf.get_index();
    let exists = es
        .index_exists(index)
        .await
        .context("checking if index exists")?;
    let plan = plan_index_actions(exists, conf.is_add(), conf.is_delete())?;

    if exists && !plan.delete {
        info!(index, "appending documents to existing index");
    }
    if plan.delete {
        info!(index, "deleting index");
        es.delete_index(index).await.context("deleting index")?;
    }
    if plan.create {
        let body = build_create_index_body(
            conf.get_settings().map(PathBuf::as_path),
            conf.get_mappings().map(PathBuf::as_path),
        )?;
        es.create_index(index, &body)
            .await
            .context("creating index")?;
        info!(index, "index created");
    }

    let docs = load_documents(conf.get_data())?;
    let total = docs.len();
    info!(total, "starting bulk insert");

    let overall_start = Instant::now();
    let mut inserted = 0usize;
    for batch in docs.chunks(conf.get_batch()) {
        let body = build_bulk_body(index, batch)?;
        let batch_start = Instant::now();
        es.bulk(body)
            .await
            .with_context(|| format!("bulk insert failed after {inserted} of {total} documents"))?;
        inserted += batch.len();
        info!(
            inserted,
            total,
            batch_time_s = batch_start.elapsed().as_secs_f64(),
            "batch inserted"
        );
    }

    info!(
        total_time_s = overall_start.elapsed().as_secs_f64(),
        "bulk load completed"
    );
    Ok(())
}
