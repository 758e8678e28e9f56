//! Query Pipeline
//!
//! One user question in, one answer out:
//!
//! ```text
//! CLASSIFY -> GENERIC_RESPONSE -> DONE
//!          -> RETRIEVE -> GENERATE_SQL -> SANITIZE -> REWRITE -> EXECUTE -> PLOT -> SUMMARIZE -> DONE
//! ```
//!
//! Every data-path stage runs even when execution fails; the summary then describes
//! the retrieved context instead of the result table.

use crate::classifier::{classify, QueryKind};
use crate::error::Result;
use crate::execution::{Database, ExecutionOutcome, ResultTable};
use crate::llm::ChatModel;
use crate::plot::{self, ChartPair};
use crate::prompts;
use crate::retrieval::{ContextRetriever, RetrievedContext, RetrievedEntry};
use crate::sql::{rewrite_time_extraction, sanitize, TIME_COLUMN, TIME_TABLE};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    GenericResponse,
    Retrieve,
    GenerateSql,
    Sanitize,
    Rewrite,
    Execute,
    Plot,
    Summarize,
    Done,
}

/// Everything produced for one question.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub request_id: String,
    pub kind: QueryKind,
    /// Result table when the statement executed
    pub table: Option<ResultTable>,
    pub sql: Option<String>,
    /// Unprocessed text of the SQL-generation call
    pub raw_llm: Option<String>,
    pub retrieved: Vec<RetrievedEntry>,
    /// Context block as it was handed to the LLM
    pub context_text: String,
    /// Engine error when execution failed
    pub execution_error: Option<String>,
    pub summary: String,
    pub charts: Option<ChartPair>,
}

impl PipelineOutput {
    pub fn line_chart(&self) -> Option<&str> {
        self.charts.as_ref().map(|c| c.line.as_str())
    }

    pub fn step_chart(&self) -> Option<&str> {
        self.charts.as_ref().map(|c| c.step.as_str())
    }

    /// Full output as JSON, the table as an array of row objects.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let result = match &self.table {
            Some(table) => Some(table.to_json_records()?),
            None => None,
        };
        Ok(serde_json::json!({
            "request_id": self.request_id,
            "kind": self.kind,
            "result": result,
            "sql": self.sql,
            "raw_llm": self.raw_llm,
            "retrieved": self.retrieved,
            "execution_error": self.execution_error,
            "summary": self.summary,
            "line_chart": self.line_chart(),
            "step_chart": self.step_chart(),
        }))
    }
}

#[derive(Clone)]
pub struct QueryPipeline {
    retriever: ContextRetriever,
    llm: Arc<dyn ChatModel>,
    db: Database,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(retriever: ContextRetriever, llm: Arc<dyn ChatModel>, db: Database, top_k: usize) -> Self {
        Self {
            retriever,
            llm,
            db,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn run(&self, query: &str) -> Result<PipelineOutput> {
        self.run_with_k(query, self.top_k).await
    }

    pub async fn run_with_k(&self, query: &str, k: usize) -> Result<PipelineOutput> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("query", request_id = %request_id);

        async move {
            enter(Stage::Classify);
            let kind = classify(query);
            info!(?kind, "Query classified");

            let output = match kind {
                QueryKind::Generic => self.answer_generic(query, request_id).await?,
                QueryKind::DataSpecific => self.answer_from_data(query, k, request_id).await?,
            };

            enter(Stage::Done);
            Ok(output)
        }
        .instrument(span)
        .await
    }

    async fn answer_generic(&self, query: &str, request_id: String) -> Result<PipelineOutput> {
        enter(Stage::GenericResponse);
        let summary = self.llm.complete(&prompts::generic_request(query)).await?;

        Ok(PipelineOutput {
            request_id,
            kind: QueryKind::Generic,
            table: None,
            sql: None,
            raw_llm: None,
            retrieved: Vec::new(),
            context_text: String::new(),
            execution_error: None,
            summary: summary.trim().to_string(),
            charts: None,
        })
    }

    async fn answer_from_data(&self, query: &str, k: usize, request_id: String) -> Result<PipelineOutput> {
        enter(Stage::Retrieve);
        let RetrievedContext { text: context_text, entries } = self.retriever.retrieve(query, k).await?;

        enter(Stage::GenerateSql);
        let raw_llm = self
            .llm
            .complete(&prompts::sql_request(&context_text, query))
            .await?;

        enter(Stage::Sanitize);
        let sanitized = sanitize(&raw_llm);

        enter(Stage::Rewrite);
        let time_type = self.db.column_type(TIME_TABLE, TIME_COLUMN).await;
        let sql = rewrite_time_extraction(&sanitized, time_type.as_deref());
        if sql != sanitized {
            debug!(time_type = ?time_type, "Date-part extraction rewritten with explicit cast");
        }
        info!(sql = %sql, "Generated SQL");

        enter(Stage::Execute);
        let (table, execution_error) = match self.db.execute(&sql).await {
            ExecutionOutcome::Table(table) => (Some(table), None),
            ExecutionOutcome::Failed { reason } => (None, Some(reason)),
        };

        enter(Stage::Plot);
        let charts = plot_in_background(table.clone(), entries.clone(), query.to_string()).await;

        enter(Stage::Summarize);
        let table_text = table.as_ref().filter(|t| !t.is_empty()).map(ResultTable::to_text);
        let summary = self
            .llm
            .complete(&prompts::summary_request(
                query,
                table_text.as_deref(),
                &sql,
                &context_text,
            ))
            .await?;

        Ok(PipelineOutput {
            request_id,
            kind: QueryKind::DataSpecific,
            table,
            sql: Some(sql),
            raw_llm: Some(raw_llm),
            retrieved: entries,
            context_text,
            execution_error,
            summary: summary.trim().to_string(),
            charts,
        })
    }
}

fn enter(stage: Stage) {
    debug!(?stage, "Pipeline stage");
}

/// Chart rendering is CPU-bound; it runs on the blocking pool.
async fn plot_in_background(
    table: Option<ResultTable>,
    entries: Vec<RetrievedEntry>,
    query: String,
) -> Option<ChartPair> {
    let rendered =
        tokio::task::spawn_blocking(move || plot::generate(table.as_ref(), &entries, &query)).await;
    match rendered {
        Ok(charts) => charts,
        Err(e) => {
            warn!("Chart rendering task failed: {}", e);
            None
        }
    }
}
