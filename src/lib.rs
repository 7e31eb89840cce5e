pub mod args;
pub mod browser;
pub mod describe;
pub mod dispatch;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod mcp;
pub mod schema;
pub mod scripts;
pub mod scroll;
pub mod session;
