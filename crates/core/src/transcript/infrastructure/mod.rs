pub mod transcript_file_reader;
