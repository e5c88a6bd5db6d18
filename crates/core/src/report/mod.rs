pub mod report_writer;
pub mod result_table;
