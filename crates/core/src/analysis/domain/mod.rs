pub mod aggregation;
pub mod analysis;
pub mod analysis_collection;
pub mod analysis_detail;
pub mod analyzer;
pub mod diff_step;
pub mod error_rate;
pub mod feature_delta;
pub mod group_report;
