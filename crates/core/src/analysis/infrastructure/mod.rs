pub mod http_analyzer;
