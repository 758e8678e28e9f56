//! Post-processing of LLM-written SQL: extraction, repair, time-cast rewrite.

pub mod rewriter;
pub mod sanitizer;

pub use rewriter::{needs_time_cast, rewrite_time_extraction, TIME_COLUMN, TIME_TABLE};
pub use sanitizer::{
    apply_repairs, extract_statement, sanitize, strip_preamble, ExtractionStrategy, RepairRule,
    EXTRACTION_ORDER, REPAIR_RULES,
};
