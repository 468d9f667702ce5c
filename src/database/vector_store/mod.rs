#[cfg(test)]
mod tests;

use super::{ChunkRecord, EmbeddingRecord};
use crate::PatchforgeError;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, PatchforgeError>;

/// LanceDB-backed store for chunk embeddings.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

/// One nearest-neighbor search hit.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub record: ChunkRecord,
    /// L2 distance to the query vector; smaller is closer.
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the vector table under `<index_dir>/vectors`.
    #[inline]
    pub async fn open(index_dir: &Path, default_dimension: usize) -> Result<Self> {
        let db_path = index_dir.join("vectors");
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            PatchforgeError::Database(format!("Failed to create vector database directory: {e}"))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to connect to LanceDB: {e}")))?;

        let mut store = Self {
            connection,
            table_name: "chunks".to_string(),
            vector_dimension: None,
        };

        store.initialize_table(default_dimension).await?;
        Ok(store)
    }

    async fn initialize_table(&mut self, default_dimension: usize) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to list tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    debug!("Detected existing vector dimension: {dim}");
                    self.vector_dimension = Some(dim);
                }
                Err(e) => {
                    warn!("Could not detect vector dimension from existing table: {e}");
                    self.vector_dimension = Some(default_dimension);
                }
            }
            return Ok(());
        }

        // The table is recreated on first insert if the embedding model
        // produces a different dimension.
        let schema = Self::create_schema(default_dimension);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to create table: {e}")))?;

        self.vector_dimension = Some(default_dimension);
        info!("Chunk table created with {default_dimension} dimensions");
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to get table schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(PatchforgeError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("rel_path", DataType::Utf8, false),
            Field::new("symbol", DataType::Utf8, false),
            Field::new("start_line", DataType::UInt32, false),
            Field::new("end_line", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("indexed_at", DataType::Utf8, false),
        ]))
    }

    /// Insert a batch of chunk records, replacing any rows that share an id.
    #[inline]
    pub async fn upsert_batch(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        debug!("Storing batch of {} chunk embeddings", records.len());

        let vector_dim = records[0].vector.len();
        if self.vector_dimension != Some(vector_dim) {
            info!(
                "Vector dimension changed from {:?} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim).await?;
            self.vector_dimension = Some(vector_dim);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        // Drop any previous rows with the same ids so reindexing a file can
        // never leave duplicates behind.
        let id_list = records
            .iter()
            .map(|r| format!("'{}'", escape_literal(&r.id)))
            .collect::<Vec<_>>()
            .join(", ");
        table
            .delete(&format!("id IN ({id_list})"))
            .await
            .map_err(|e| {
                PatchforgeError::Database(format!("Failed to delete superseded rows: {e}"))
            })?;

        let record_batch = self.create_record_batch(&records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to insert chunks: {e}")))?;

        Ok(())
    }

    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<()> {
        self.connection
            .drop_table(&self.table_name)
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to drop table: {e}")))?;

        let schema = Self::create_schema(vector_dim);
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| {
                PatchforgeError::Database(format!("Failed to create table with new dimensions: {e}"))
            })?;

        Ok(())
    }

    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| PatchforgeError::Database("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut file_paths = Vec::with_capacity(len);
        let mut rel_paths = Vec::with_capacity(len);
        let mut symbols = Vec::with_capacity(len);
        let mut start_lines = Vec::with_capacity(len);
        let mut end_lines = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut indexed_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(PatchforgeError::Database(format!(
                    "Inconsistent vector dimensions in batch: {} vs {}",
                    record.vector.len(),
                    vector_dim
                )));
            }
            ids.push(record.id.as_str());
            file_paths.push(record.metadata.file_path.as_str());
            rel_paths.push(record.metadata.rel_path.as_str());
            symbols.push(record.metadata.symbol.as_str());
            start_lines.push(record.metadata.start_line);
            end_lines.push(record.metadata.end_line);
            contents.push(record.metadata.content.as_str());
            indexed_ats.push(record.metadata.indexed_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let schema = Self::create_schema(vector_dim);

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    PatchforgeError::Database(format!("Failed to create vector array: {e}"))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(file_paths)),
            Arc::new(StringArray::from(rel_paths)),
            Arc::new(StringArray::from(symbols)),
            Arc::new(UInt32Array::from(start_lines)),
            Arc::new(UInt32Array::from(end_lines)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(indexed_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| PatchforgeError::Database(format!("Failed to create record batch: {e}")))
    }

    /// Remove every chunk belonging to one source file.
    #[inline]
    pub async fn delete_file_entries(&mut self, rel_path: &str) -> Result<()> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        let predicate = format!("rel_path = '{}'", escape_literal(rel_path));
        table.delete(&predicate).await.map_err(|e| {
            PatchforgeError::Database(format!("Failed to delete chunks for {rel_path}: {e}"))
        })?;

        Ok(())
    }

    /// Nearest-neighbor search. An empty table yields an empty result rather
    /// than an error.
    #[inline]
    pub async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        if self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| {
                PatchforgeError::Database(format!("Failed to create vector search: {e}"))
            })?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to execute search: {e}")))?;

        self.parse_search_results_stream(results).await
    }

    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut hits = Vec::new();

        while let Some(batch) = results.try_next().await.map_err(|e| {
            PatchforgeError::Database(format!("Failed to read result stream: {e}"))
        })? {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results", hits.len());
        Ok(hits)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
        let string_column = |name: &str| -> Result<&StringArray> {
            batch
                .column_by_name(name)
                .ok_or_else(|| PatchforgeError::Database(format!("Missing {name} column")))?
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| PatchforgeError::Database(format!("Invalid {name} column type")))
        };
        let u32_column = |name: &str| -> Result<&UInt32Array> {
            batch
                .column_by_name(name)
                .ok_or_else(|| PatchforgeError::Database(format!("Missing {name} column")))?
                .as_any()
                .downcast_ref::<UInt32Array>()
                .ok_or_else(|| PatchforgeError::Database(format!("Invalid {name} column type")))
        };

        let file_paths = string_column("file_path")?;
        let rel_paths = string_column("rel_path")?;
        let symbols = string_column("symbol")?;
        let start_lines = u32_column("start_line")?;
        let end_lines = u32_column("end_line")?;
        let contents = string_column("content")?;
        let indexed_ats = string_column("indexed_at")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let record = ChunkRecord {
                file_path: file_paths.value(row).to_string(),
                rel_path: rel_paths.value(row).to_string(),
                symbol: symbols.value(row).to_string(),
                start_line: start_lines.value(row),
                end_line: end_lines.value(row),
                content: contents.value(row).to_string(),
                indexed_at: indexed_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            hits.push(RetrievedChunk { record, distance });
        }

        Ok(hits)
    }

    /// Total number of chunks stored.
    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to count rows: {e}")))?;

        Ok(count as u64)
    }

    /// Compact and reorganize table data after bulk writes.
    #[inline]
    pub async fn optimize(&mut self) -> Result<()> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to open table: {e}")))?;

        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| PatchforgeError::Database(format!("Failed to optimize table: {e}")))?;

        Ok(())
    }
}

/// Escape a string for use inside a single-quoted SQL literal.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
