//! Tantivy-based station search.
//!
//! Riders look stations up by name or location; the index is small and is
//! rebuilt wholesale whenever the catalog changes.

use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Station;

const BOOST_NAME: f32 = 3.0;
const BOOST_LOCATION: f32 = 2.0;

/// Search hit: station key and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub station_key: String,
    pub score: f32,
}

struct SearchFields {
    station_key: Field,
    name: Field,
    location: Field,
}

/// Tantivy search index over stations.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let station_key = schema_builder.add_text_field("station_key", STRING | STORED);
        let name = schema_builder.add_text_field("name", TEXT);
        let location = schema_builder.add_text_field("location", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            station_key,
            name,
            location,
        };

        let index = Index::open_in_dir(index_path)
            .or_else(|_| Index::create_in_dir(index_path, schema.clone()))
            .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer_with_num_threads(1, 15_000_000)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Replace the indexed stations.
    pub async fn rebuild(&self, stations: &[Station]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for station in stations {
            writer.add_document(doc!(
                self.fields.station_key => station.key.clone(),
                self.fields.name => station.name.clone(),
                self.fields.location => station.location.clone(),
            ))?;
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::debug!("Search index rebuilt with {} stations", stations.len());
        Ok(())
    }

    /// Search stations by name and location, name matches ranking higher.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, boost) in [
            (self.fields.name, BOOST_NAME),
            (self.fields.location, BOOST_LOCATION),
        ] {
            let parser = QueryParser::for_index(&self.index, vec![field]);
            let field_query = parser
                .parse_query(query_str)
                .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?;
            subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
        }
        let query = BooleanQuery::new(subqueries);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        Ok(top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, address)| {
                let doc: TantivyDocument = searcher.doc(address).ok()?;
                let station_key = doc
                    .get_first(self.fields.station_key)?
                    .as_str()?
                    .to_string();
                Some(SearchResult { station_key, score })
            })
            .collect())
    }
}
