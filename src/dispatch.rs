//! GET and POST entry points.
//!
//! A transport engine calls [`Dispatcher::dispatch`] (or the per method entry
//! points) once per request. The dispatcher keeps no per-request state. It
//! captures what it needs from a registry under a short read lock, then does
//! all I/O and runs callbacks with no lock held.
//!
//! The `Err` side of the entry points means the request was aborted, e.g.
//! the body was rejected or could not be read, leaving the connection with
//! unread input. Engines should not reuse the connection after that. A
//! failed response send is only logged.

use http::{Method, StatusCode};

use crate::body::recv_body;
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::path::canonical;
use crate::registry::handler::HandlerRegistry;
use crate::registry::resource::ResourceRegistry;

/// Default cap on POST bodies.
pub const MAX_CONTENT_RECEIVE: usize = 10240;

#[derive(Debug)]
pub struct Dispatcher {
    resources: ResourceRegistry,
    handlers: HandlerRegistry,
    max_body: usize,
}

impl Dispatcher {
    pub fn new(max_body: usize) -> Self {
        Dispatcher {
            resources: ResourceRegistry::new(),
            handlers: HandlerRegistry::new(),
            max_body,
        }
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Route a request by method.
    ///
    /// Only GET and POST are served, anything else gets a 405.
    pub fn dispatch<E: Exchange + ?Sized>(&self, method: &Method, ex: &mut E) -> Result<()> {
        if *method == Method::GET {
            self.serve_get(ex)
        } else if *method == Method::POST {
            self.serve_post(ex)
        } else {
            debug!("Method not allowed: {} {}", method, ex.uri());
            ex.set_header("Allow", "GET, POST");
            send_status(ex, StatusCode::METHOD_NOT_ALLOWED);
            Ok(())
        }
    }

    pub fn serve_get<E: Exchange + ?Sized>(&self, ex: &mut E) -> Result<()> {
        info!("GET: {}", ex.uri());

        let Some(resource) = self.resources.get(canonical(ex.uri())) else {
            debug!("No page at {}", canonical(ex.uri()));
            send_status(ex, StatusCode::NOT_FOUND);
            return Ok(());
        };

        let bytes = match resource.snapshot() {
            Ok(v) => v,
            Err(e) => {
                error!("Could not capture page {}: {}", canonical(ex.uri()), e);
                send_status(ex, StatusCode::INTERNAL_SERVER_ERROR);
                return Ok(());
            }
        };

        ex.set_status(StatusCode::OK);
        ex.set_content_type(resource.mime());
        ex.set_header("Connection", "keep-alive");

        info!("HTTP 200 OK: {}b", bytes.len());
        let sent = ex.send(&bytes);

        if let Err(e) = sent {
            warn!("Send failed for GET {}: {}", ex.uri(), e);
        }

        Ok(())
    }

    pub fn serve_post<E: Exchange + ?Sized>(&self, ex: &mut E) -> Result<()> {
        info!("POST: {}", ex.uri());

        let Some(handler) = self.handlers.get(canonical(ex.uri())) else {
            error!("Could not find post callback for {}", canonical(ex.uri()));
            send_status(ex, StatusCode::INTERNAL_SERVER_ERROR);
            return Ok(());
        };

        let quiet = handler.suppress_log();
        let len = ex.content_len();

        if len > self.max_body {
            if !quiet {
                error!(
                    "Attempted to post content of length {}b, which is too large \
                    for the buffer size {}b",
                    len, self.max_body
                );
            }
            // The body stays unread on the connection.
            ex.set_header("Connection", "close");
            send_status(ex, StatusCode::INTERNAL_SERVER_ERROR);
            return Err(Error::BodyTooLarge {
                len,
                max: self.max_body,
            });
        }

        if !quiet {
            info!("Receiving {}b for {}", len, ex.uri());
        }

        let body = match recv_body(ex) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to receive POST {}: {}", ex.uri(), e);
                ex.set_header("Connection", "close");
                send_status(ex, StatusCode::INTERNAL_SERVER_ERROR);
                return Err(e);
            }
        };

        let reply = handler.call(ex.uri(), &body);
        drop(body);

        ex.set_status(reply.status());
        ex.set_content_type(reply.content_type());

        let payload = reply.into_payload();

        if let Some(declared) = payload.declared_len() {
            if declared > payload.capacity() {
                warn!(
                    "Reply length {}b exceeds its data ({}b)",
                    declared,
                    payload.capacity()
                );
            }
        }

        let sent = ex.send(payload.bytes());

        // Transferred payloads are released here, whatever the send outcome.
        drop(payload);

        match sent {
            Ok(()) => {
                if !quiet {
                    debug!("Replied to POST {}", ex.uri());
                }
            }
            Err(e) => warn!("Send failed for POST {}: {}", ex.uri(), e),
        }

        Ok(())
    }

    /// Drop everything registered.
    pub fn clear(&self) {
        self.resources.clear();
        self.handlers.clear();
    }
}

fn send_status<E: Exchange + ?Sized>(ex: &mut E, status: StatusCode) {
    if let Err(e) = ex.send_status(status) {
        warn!("Send of {} failed for {}: {}", status, ex.uri(), e);
    }
}
