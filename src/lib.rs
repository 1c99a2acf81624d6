//! Embedded HTTP content registry and dispatcher.
//!
//! Firmware registers content under paths and the server answers requests
//! for them:
//!
//! * GET serves a registered resource, a span of bytes with a MIME type.
//!   Resources are static, shared or backed by a buffer the firmware keeps
//!   rewriting and truncating.
//! * POST receives the whole request body and hands it to a registered
//!   handler, whose [`Reply`] becomes the response.
//!
//! Paths are matched on their canonical form, the request target up to the
//! first `?` or `#`. Handlers still see the full target.
//!
//! ```
//! use qweb::{mime, Reply, Server, ServerConfig};
//! use qweb::test::TestEngine;
//!
//! let server = Server::<TestEngine>::start(ServerConfig::new("lamp"))?;
//!
//! server.register_file("/", mime::HTML, b"<h1>lamp</h1>")?;
//! server.register_post("/set", |uri: &str, body: &[u8]| {
//!     match qweb::path::query_value(uri, "on") {
//!         Some(_) if !body.is_empty() => Reply::ok(),
//!         _ => Reply::fail_with(mime::PLAIN, "missing ?on"),
//!     }
//! })?;
//!
//! let res = server.engine().get("/?page=1");
//! assert_eq!(res.body(), b"<h1>lamp</h1>");
//!
//! let res = server.engine().post("/set?on", "1");
//! assert_eq!(res.status(), Some(qweb::http::StatusCode::OK));
//!
//! server.stop()?;
//! # Ok::<_, qweb::Error>(())
//! ```
//!
//! [`Server`] defaults to [`TcpEngine`](tcp::TcpEngine), serving plain
//! HTTP/1.1 on `0.0.0.0`. Other transports implement [`Engine`] and feed
//! requests to the [`Dispatcher`] through [`Exchange`].

#[macro_use]
extern crate log;

pub use http;

mod error;
pub use error::{Error, Result};

pub mod body;
pub mod config;
pub mod dispatch;
pub mod exchange;
pub mod mime;
pub mod path;
pub mod registry;
pub mod reply;
pub mod script;
pub mod server;
pub mod tcp;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, MAX_CONTENT_RECEIVE};
pub use exchange::Exchange;
pub use registry::handler::{Handler, HandlerId, PostHandler};
pub use registry::resource::{
    Content, Resource, ResourceId, ResourceRef, SharedBuffer, Snapshot,
};
pub use reply::{Payload, Reply};
pub use server::{Engine, Server};
