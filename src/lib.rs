pub mod arguments;
pub mod candles;
pub mod config;
pub mod engine;
pub mod errors; // Structured error taxonomy
pub mod feed;
pub mod indicators;
pub mod logger;
pub mod trader;
pub mod trend;
