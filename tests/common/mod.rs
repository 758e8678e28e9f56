//! Shared fixtures: a scripted chat model and a seeded in-memory Argo store.

#![allow(dead_code)]

use async_trait::async_trait;
use ocean_query::execution::Database;
use ocean_query::llm::{ChatModel, ChatRequest};
use ocean_query::pipeline::QueryPipeline;
use ocean_query::retrieval::{build_index, ContextRetriever, HashEmbedder, IdMap, Metric, RetrievedEntry};
use ocean_query::{OceanError, Result};
use std::sync::{Arc, Mutex};

pub const JANUARY_SQL_REPLY: &str = "Here is the query:\n```sql\n\
SELECT AVG(m.temp) AS avg_temp FROM measurements m \
JOIN profiles p ON m.profile_id = p.profile_id \
WHERE EXTRACT(MONTH FROM p.time) = 1 AND EXTRACT(YEAR FROM p.time) = 2023;\n```";

pub const SUMMARY_REPLY: &str =
    "  The average temperature in January 2023 was about 28.15 °C.\n\nIt stayed stable with depth.  ";

/// Replies by prompt kind and records every request it sees.
pub struct ScriptedChatModel {
    sql_reply: String,
    answer_reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChatModel {
    pub fn new(sql_reply: &str, answer_reply: &str) -> Self {
        Self {
            sql_reply: sql_reply.to_string(),
            answer_reply: answer_reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        if request.system.starts_with("You are a SQL expert") {
            Ok(self.sql_reply.clone())
        } else {
            Ok(self.answer_reply.clone())
        }
    }
}

/// Always fails, like an unreachable provider.
pub struct UnreachableChatModel;

#[async_trait]
impl ChatModel for UnreachableChatModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        Err(OceanError::Llm("LLM API call failed: connection refused".to_string()))
    }
}

pub fn argo_entries() -> Vec<RetrievedEntry> {
    vec![
        RetrievedEntry::structured(
            "Measurement in profile 1.0 at depth 5.0m: Temp 28.4 °C, Salinity 35.1 PSU",
            "measurements",
        ),
        RetrievedEntry::structured(
            "Measurement in profile 1.0 at depth 50.0m: Temp 27.9 °C, Salinity 35.2 PSU",
            "measurements",
        ),
        RetrievedEntry::structured(
            "Profile 1.0 at lat 10.5, lon 80.2 on 2023-01-15 from platform 2902746",
            "profiles",
        ),
        RetrievedEntry::Plain("Platform 2902746 is an APEX float run by INCOIS".to_string()),
    ]
}

pub async fn seeded_database() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE profiles(profile_id DOUBLE, latitude DOUBLE, longitude DOUBLE, \
             time VARCHAR, cycle_number INTEGER, platform_number VARCHAR);
         CREATE TABLE measurements(profile_id DOUBLE, depth_m DOUBLE, temp DOUBLE, \
             psal DOUBLE, sigma_theta DOUBLE);
         CREATE TABLE calibration(profile_id DOUBLE, scientific_calib_equation VARCHAR, \
             scientific_calib_coefficient VARCHAR, scientific_calib_comment VARCHAR);
         CREATE TABLE platforms(platform_number VARCHAR, platform_type VARCHAR, \
             project_name VARCHAR, pi_name VARCHAR);
         INSERT INTO profiles VALUES
             (1.0, 10.5, 80.2, '2023-01-15 10:00:00', 1, '2902746'),
             (2.0, 11.0, 81.0, '2023-02-10 09:00:00', 2, '2902746');
         INSERT INTO measurements VALUES
             (1.0, 5.0, 28.4, 35.1, 22.0),
             (1.0, 50.0, 27.9, 35.2, 22.4),
             (2.0, 5.0, 29.0, 35.0, 21.8);
         INSERT INTO platforms VALUES ('2902746', 'APEX', 'Argo India', 'M Ravichandran');",
    )
    .await
    .unwrap();
    db
}

/// Pipeline over the seeded store with an index built from `id_map_entries`
/// (or from `index_entries` when the two should disagree).
pub async fn pipeline_with(
    llm: Arc<dyn ChatModel>,
    index_entries: Vec<RetrievedEntry>,
    id_map_entries: Vec<RetrievedEntry>,
) -> QueryPipeline {
    let embedder = Arc::new(HashEmbedder::default());
    let index = build_index(embedder.as_ref(), &IdMap::new(index_entries), Metric::L2)
        .await
        .unwrap();
    let retriever = ContextRetriever::new(embedder, Arc::new(index), Arc::new(IdMap::new(id_map_entries)));
    QueryPipeline::new(retriever, llm, seeded_database().await, 20)
}
