pub mod transcript_pair;
pub mod transcript_parser;
