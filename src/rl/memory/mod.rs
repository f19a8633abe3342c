//! Experience Storage
//!
//! On-policy sample batches for PPO.

pub mod sample_batch;

pub use sample_batch::SampleBatch;
