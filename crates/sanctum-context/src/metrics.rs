//! Prometheus metrics for context resolution

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

use crate::manager::ContextSource;

lazy_static! {
    /// Context resolutions by the path that produced them
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sanctum_context_resolutions_total",
        "Context resolutions by source",
        &["source"]
    )
    .unwrap();

    /// Swallowed cache and summarizer failures by phase
    pub static ref COLLABORATOR_ERRORS: IntCounterVec = register_int_counter_vec!(
        "sanctum_context_collaborator_errors_total",
        "Cache and summarizer failures by phase",
        &["phase"]
    )
    .unwrap();
}

pub fn record_resolution(source: ContextSource) {
    RESOLUTIONS_TOTAL.with_label_values(&[source.as_str()]).inc();
}

pub fn record_collaborator_error(phase: &str) {
    COLLABORATOR_ERRORS.with_label_values(&[phase]).inc();
}
