pub mod completion;
pub mod config;
pub mod explain;
pub mod merge;
pub mod stats;
