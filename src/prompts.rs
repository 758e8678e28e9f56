//! Prompt construction for the three LLM calls.

use crate::llm::ChatRequest;

pub const SQL_TEMPERATURE: f32 = 0.0;
pub const SQL_MAX_TOKENS: u32 = 1024;
pub const ANSWER_TEMPERATURE: f32 = 0.5;
pub const ANSWER_MAX_TOKENS: u32 = 512;

pub const SCHEMA_TEXT: &str = "Tables:\n\
- profiles(profile_id, latitude, longitude, time, cycle_number, platform_number)\n\
- measurements(profile_id, depth_m, temp, psal, sigma_theta)\n\
- calibration(profile_id, scientific_calib_equation, scientific_calib_coefficient, scientific_calib_comment)\n\
- platforms(platform_number, platform_type, project_name, pi_name)\n\n";

const SQL_SYSTEM: &str = "You are a SQL expert. Using the schema below and the retrieved context, \
generate ONE valid SQL query in DuckDB syntax that answers the user's question. \
Output ONLY the SQL query (no explanation, no prose). If a cast of profiles.time is required, \
use CAST(profiles.time AS TIMESTAMP). Use measurements.psal for salinity. \
Note: There is no 'pres' or 'pressure' column; use 'depth_m' for depth/pressure-related data, \
as depth in meters approximates pressure (roughly 1 dbar per meter). \
Be careful with syntax: ensure CAST functions have proper parentheses, e.g., CAST(profiles.time AS TIMESTAMP). \
For trends over time, aggregate by day or appropriate interval, e.g., use DATE(CAST(profiles.time AS TIMESTAMP)) for daily grouping.";

const SUMMARY_SYSTEM: &str = "You are a friendly AI assistant specializing in ocean data analysis, designed to communicate like a helpful bot. \
Generate a clear, concise, and natural language response for the user's query. \
If data is available, describe key insights, trends (e.g., changes over time, averages, min/max), \
and patterns based on the data and retrieved context, using terms like 'increasing', 'decreasing', or 'stable' with supporting numbers. \
If no data is returned (empty or None), summarize the retrieved context in a conversational way, focusing on relevant details like salinity, temperature, or depth, as if you found related information. \
Do not speculate about missing data or suggest data issues unless explicitly indicated. \
For failed queries, briefly note the lack of results and provide a summary of the retrieved context. \
Keep the tone approachable, accurate, and context-appropriate.";

const GENERIC_SYSTEM: &str = "You are a friendly AI assistant with expertise in oceanography. \
The user has asked a generic or informational question about ocean data. \
Provide a clear, concise, and natural language explanation tailored to the query. \
Focus on being informative, approachable, and accurate, using general knowledge about ocean data. \
Do not reference specific datasets, measurements, or technical details unless explicitly relevant. \
Keep the response under 300 words.";

/// LLM call #1: question + retrieved context -> one SQL statement.
pub fn sql_request(context_text: &str, user_query: &str) -> ChatRequest {
    ChatRequest {
        system: SQL_SYSTEM.to_string(),
        user: format!(
            "{}Retrieved context:\n{}\n\nUser question: {}",
            SCHEMA_TEXT, context_text, user_query
        ),
        temperature: SQL_TEMPERATURE,
        max_tokens: SQL_MAX_TOKENS,
    }
}

/// LLM call #2 on the data path. `table_text` is `None` when execution failed or
/// returned no rows.
pub fn summary_request(
    user_query: &str,
    table_text: Option<&str>,
    sql_text: &str,
    context_text: &str,
) -> ChatRequest {
    let data_block = match table_text {
        Some(table) => format!("Data (as table):\n{}", table),
        None => "No data returned for the query.".to_string(),
    };
    ChatRequest {
        system: SUMMARY_SYSTEM.to_string(),
        user: format!(
            "User query: {}\n{}\nSQL used: {}\nRetrieved context: {}",
            user_query, data_block, sql_text, context_text
        ),
        temperature: ANSWER_TEMPERATURE,
        max_tokens: ANSWER_MAX_TOKENS,
    }
}

/// LLM call on the generic path.
pub fn generic_request(user_query: &str) -> ChatRequest {
    ChatRequest {
        system: GENERIC_SYSTEM.to_string(),
        user: format!("User query: {}", user_query),
        temperature: ANSWER_TEMPERATURE,
        max_tokens: ANSWER_MAX_TOKENS,
    }
}
