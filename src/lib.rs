// Batchmark: batch text watermarking library

pub mod batch;
pub mod codec;
pub mod config;
pub mod handles;
pub mod logging;
pub mod preview;
pub mod watermark;
