pub mod alphabet;
pub mod analysis;
pub mod pipeline;
pub mod report;
pub mod shared;
pub mod transcript;
