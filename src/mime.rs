//! Content types for common resources.

pub const HTML: &str = "text/html";
pub const JS: &str = "application/javascript";
pub const CSS: &str = "text/css";
pub const PLAIN: &str = "text/plain";
pub const JSON: &str = "application/json";
pub const BINARY: &str = "application/octet-stream";
