// Party Accounts Pipeline - Core Library
// Exposes all stages for use in the CLI, the viewer, and tests

pub mod error;          // Fatal configuration errors
pub mod config;         // Thresholds, file names, party aliases
pub mod tables;         // CSV read/write with column checks
pub mod data_quality;   // Recoverable per-row issues + WarningSink
pub mod entities;       // Filing, MP and analysis records; party aliases
pub mod normalize;      // Name Normalizer
pub mod matcher;        // Entity Matcher
pub mod deduplication;  // Record Deduplicator
pub mod classifier;     // Category Classifier
pub mod aggregation;    // Aggregator
pub mod reconciliation; // Base-count reconciliation
pub mod report;         // Results table + chart data

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use config::{
    FilePaths, PipelineConfig, TableConfig,
    CHART_TAX_RATE_THRESHOLD, TABLE_TAX_RATE_THRESHOLD,
};
pub use tables::{parse_amount, parse_flag, Row, Table};
pub use data_quality::{
    CollectingSink, DataIssue, IssueKind, IssueSummary, Severity, TracingSink, WarningSink,
};
pub use entities::{AnalysisRecord, Filing, MpRecord, PartyAliases};
pub use normalize::{canonical_key, combined_name, normalize};
pub use matcher::{
    clear_mp_columns, clear_mps, enrich_table, match_mps,
    LookupStats, MatchOutcome, MatchReport, MpLookup,
};
pub use deduplication::{dedupe_accounting_units, DedupReport, DeduplicationEngine};
pub use classifier::{Category, CategoryClassifier};
pub use aggregation::{
    aggregate, aggregate_categories, base_counts,
    AggregateOutcome, AggregateReport, BaseCounts, CategoryCounts, CountsRow,
};
pub use reconciliation::{reconcile, reconcile_counts, ReconciliationResult, ReconciliationSummary};
pub use report::{
    build_chart_data, build_results_table, write_chart_data, write_results_table,
    ChartPoint, ChartSeries, HighlightTier, MissingTaxEstimate, ResultsTable, TableRow,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
