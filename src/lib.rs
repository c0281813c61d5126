pub mod background;
pub mod config;
pub mod discovery;
pub mod dom;
pub mod engine;
pub mod init;
pub mod logger;
pub mod options;
pub mod page;
pub mod pipeline;
pub mod retry;
pub mod stats;
pub mod storage;
pub mod watcher;
