pub mod analyzer_adapter;
pub mod batch_executor;
pub mod batch_generation;
pub mod call_guard;
pub mod infrastructure;
pub mod pipeline_logger;
