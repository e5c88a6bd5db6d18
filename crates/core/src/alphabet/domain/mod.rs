pub mod alphabet_transcoder;
