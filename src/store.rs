//! Namespaced vector store with idempotent ingestion and exact cosine search.

use crate::collection::{
    Metadata, SearchMatch, VectorRecord, CHUNK_ID_KEY, PRESCRIPTION_ID_KEY, TEXT_KEY,
};
use crate::config::AppConfig;
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::error::{Result, StoreError};
use crate::flat_index::FlatIndex;
use crate::persistence::namespace::{normalize, NamespaceFiles, DEFAULT_NAMESPACE};
use crate::vector::Vector;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Number of matches returned when the caller has no preference.
pub const DEFAULT_TOP_K: usize = 5;

/// Stores embedded text chunks, one JSON file per namespace.
///
/// Without an embedder the store rejects writes (`Ok(false)`) and answers
/// every search with no matches.
pub struct VectorStore {
    files: NamespaceFiles,
    embedder: Option<Box<dyn Embedder>>,
}

/// A record waiting to be embedded.
struct Pending {
    id: String,
    text: String,
    metadata: Metadata,
}

/// Id used by `add_texts`: hex MD5 of the text, namespace-prefixed.
pub fn text_id(text: &str, namespace: Option<&str>) -> String {
    let hash = format!("{:x}", md5::compute(text.as_bytes()));
    match namespace {
        Some(ns) => format!("{}_{}", ns, hash),
        None => hash,
    }
}

/// Id used by `add_prescription`: position-based, not content-based.
pub fn chunk_id(prescription_id: &str, index: usize) -> String {
    format!("{}_{}", prescription_id, index)
}

impl VectorStore {
    /// Open a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>, embedder: Option<Box<dyn Embedder>>) -> Result<Self> {
        let files = NamespaceFiles::open(dir)?;
        info!(
            dir = %files.dir().display(),
            embeddings = embedder.is_some(),
            "vector store opened"
        );
        Ok(Self { files, embedder })
    }

    /// Open the store described by `config`, using Gemini embeddings when
    /// an API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = GeminiEmbedder::from_config(config)?;
        if embedder.is_none() {
            warn!("Google API key missing, embeddings disabled");
        }
        Self::open(
            config.vectors_dir(),
            embedder.map(|e| Box::new(e) as Box<dyn Embedder>),
        )
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Embed and store `texts`, skipping any whose derived id already exists.
    ///
    /// `metadata_list[i]` belongs to `texts[i]`; missing entries default to
    /// empty metadata. Returns `Ok(false)` without writing when no embedder
    /// is configured.
    pub fn add_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadata_list: &[Metadata],
        namespace: Option<&str>,
    ) -> Result<bool> {
        let Some(embedder) = self.embedder.as_deref() else {
            error!("No embeddings available");
            return Ok(false);
        };
        let namespace = normalize(namespace)?;

        let pending = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let text = text.as_ref();
                let mut metadata = metadata_list.get(i).cloned().unwrap_or_default();
                metadata.insert(TEXT_KEY.to_string(), Value::from(text));
                Pending {
                    id: text_id(text, namespace),
                    text: text.to_string(),
                    metadata,
                }
            })
            .collect();

        let added = self.ingest(embedder, namespace, pending)?;
        info!(
            count = added,
            namespace = namespace.unwrap_or(DEFAULT_NAMESPACE),
            "stored texts"
        );
        Ok(true)
    }

    /// Embed and store a prescription's chunks in the default collection.
    ///
    /// Chunk `i` gets id `"{prescription_id}_{i}"`, so re-ingesting the same
    /// prescription skips every index already stored regardless of content.
    /// `text`, `chunk_id` and `prescription_id` override caller metadata.
    pub fn add_prescription<S: AsRef<str>>(
        &self,
        prescription_id: &str,
        chunks: &[S],
        metadata: &Metadata,
    ) -> Result<bool> {
        let Some(embedder) = self.embedder.as_deref() else {
            error!("No embeddings available");
            return Ok(false);
        };

        let pending = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let chunk = chunk.as_ref();
                let mut meta = metadata.clone();
                meta.insert(TEXT_KEY.to_string(), Value::from(chunk));
                meta.insert(CHUNK_ID_KEY.to_string(), Value::from(i));
                meta.insert(PRESCRIPTION_ID_KEY.to_string(), Value::from(prescription_id));
                Pending {
                    id: chunk_id(prescription_id, i),
                    text: chunk.to_string(),
                    metadata: meta,
                }
            })
            .collect();

        let added = self.ingest(embedder, None, pending)?;
        info!(count = added, prescription_id, "stored prescription chunks");
        Ok(true)
    }

    /// Top-`top_k` records by cosine similarity to `query`.
    ///
    /// With `prescription_id`, only records whose metadata
    /// `prescription_id` equals it are considered. The query is only
    /// embedded when there is something to score.
    pub fn search(
        &self,
        query: &str,
        prescription_id: Option<&str>,
        namespace: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>> {
        let Some(embedder) = self.embedder.as_deref() else {
            return Ok(vec![]);
        };
        self.rank(prescription_id, namespace, top_k, || {
            Ok(Vector::new(embedder.embed_query(query)?))
        })
    }

    /// Like [`search`](Self::search) but with an already embedded query.
    /// Works without an embedder.
    pub fn search_vector(
        &self,
        query: &Vector,
        prescription_id: Option<&str>,
        namespace: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<SearchMatch>> {
        self.rank(prescription_id, namespace, top_k, || Ok(query.clone()))
    }

    fn rank(
        &self,
        prescription_id: Option<&str>,
        namespace: Option<&str>,
        top_k: usize,
        query: impl FnOnce() -> Result<Vector>,
    ) -> Result<Vec<SearchMatch>> {
        let namespace = normalize(namespace)?;

        let collection = self.files.load(namespace);
        let index = FlatIndex::filtered(&collection, prescription_id);
        if index.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let query = query()?;
        let results = index.search(&query, top_k);
        debug!(
            candidates = index.len(),
            returned = results.len(),
            top_score = results.first().map(|m| m.score),
            "search complete"
        );
        Ok(results)
    }

    /// Number of records stored under a namespace.
    pub fn count(&self, namespace: Option<&str>) -> Result<usize> {
        let namespace = normalize(namespace)?;
        Ok(self.files.load(namespace).len())
    }

    /// Record ids stored under a namespace, in storage order.
    pub fn list_ids(&self, namespace: Option<&str>) -> Result<Vec<String>> {
        let namespace = normalize(namespace)?;
        Ok(self.files.load(namespace).ids())
    }

    /// Namespaces with a collection file; `None` is the default collection.
    pub fn namespaces(&self) -> Result<Vec<Option<String>>> {
        self.files.namespaces()
    }

    /// Read-embed-write cycle shared by both ingestion paths.
    ///
    /// Nothing is written unless every new record embeds successfully. The
    /// collection file is rewritten once at the end, even when nothing new
    /// was added.
    fn ingest(
        &self,
        embedder: &dyn Embedder,
        namespace: Option<&str>,
        pending: Vec<Pending>,
    ) -> Result<usize> {
        self.files.with_lock(namespace, || {
            let mut collection = self.files.load(namespace);
            let mut seen: HashSet<String> = collection.id_set();
            let mut dimension = collection.vectors.first().map(|r| r.embedding.dimension());

            let mut new_records = Vec::new();
            for item in pending {
                if !seen.insert(item.id.clone()) {
                    continue;
                }

                let embedding = Vector::new(embedder.embed_query(&item.text)?);
                match dimension {
                    Some(expected) if expected != embedding.dimension() => {
                        return Err(StoreError::DimensionMismatch {
                            expected,
                            actual: embedding.dimension(),
                        });
                    }
                    Some(_) => {}
                    None => dimension = Some(embedding.dimension()),
                }

                new_records.push(VectorRecord {
                    id: item.id,
                    embedding,
                    metadata: item.metadata,
                });
            }

            let added = new_records.len();
            collection.extend(new_records);
            self.files.save(namespace, &collection)?;
            Ok(added)
        })
    }
}
