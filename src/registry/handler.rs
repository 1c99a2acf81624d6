use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{EntryId, Registry};
use crate::error::{Error, Result};
use crate::reply::Reply;

pub type HandlerId = EntryId;

/// Callback invoked for a POST request.
///
/// Receives the raw request target (query string included) and the complete
/// request body. The body is only borrowed for the duration of the call.
pub trait PostHandler: Send + Sync + 'static {
    fn call(&self, uri: &str, body: &[u8]) -> Reply;
}

impl<F> PostHandler for F
where
    F: Fn(&str, &[u8]) -> Reply + Send + Sync + 'static,
{
    fn call(&self, uri: &str, body: &[u8]) -> Reply {
        (self)(uri, body)
    }
}

/// A registered POST handler.
#[derive(Clone)]
pub struct Handler {
    callback: Arc<dyn PostHandler>,
    suppress_log: bool,
}

impl Handler {
    pub fn new(callback: impl PostHandler, suppress_log: bool) -> Self {
        Handler {
            callback: Arc::new(callback),
            suppress_log,
        }
    }

    pub fn call(&self, uri: &str, body: &[u8]) -> Reply {
        self.callback.call(uri, body)
    }

    /// Whether per-request logging is suppressed for this handler.
    pub fn suppress_log(&self) -> bool {
        self.suppress_log
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("suppress_log", &self.suppress_log)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    inner: RwLock<Registry<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the handler at `path`.
    pub fn put(&self, path: &str, handler: Handler) -> Result<HandlerId> {
        let quiet = handler.suppress_log;
        let (id, replaced) = self.inner.write().put(path, handler)?;

        let verb = if replaced.is_some() {
            "replacing"
        } else {
            "registering"
        };
        info!("{} post callback \"{}\" (quiet: {})", verb, path, quiet);

        Ok(id)
    }

    pub fn get(&self, path: &str) -> Option<Handler> {
        self.inner.read().get(path).cloned()
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        let removed = self.inner.write().remove(path);

        match removed {
            Some(_) => {
                info!("Removed post callback \"{}\"", path);
                Ok(())
            }
            None => Err(Error::NotFound(path.into())),
        }
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn shrink(&self) {
        self.inner.write().shrink();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime;
    use crate::reply::Payload;

    fn echo(_uri: &str, body: &[u8]) -> Reply {
        Reply::ok_with(mime::BINARY, body.to_vec())
    }

    #[test]
    fn put_and_call() {
        let r = HandlerRegistry::new();
        r.put("/echo", Handler::new(echo, false)).unwrap();

        let h = r.get("/echo").unwrap();
        assert!(!h.suppress_log());

        let reply = h.call("/echo", b"abc");
        assert!(reply.is_success());
        assert_eq!(reply.payload().bytes(), b"abc");
    }

    #[test]
    fn closures_capture_state() {
        let r = HandlerRegistry::new();
        let greeting = String::from("hi ");

        r.put(
            "/greet",
            Handler::new(
                move |_: &str, body: &[u8]| {
                    let mut s = greeting.clone();
                    s.push_str(std::str::from_utf8(body).unwrap_or("?"));
                    Reply::ok_with(mime::PLAIN, s)
                },
                true,
            ),
        )
        .unwrap();

        let h = r.get("/greet").unwrap();
        assert!(h.suppress_log());
        assert_eq!(h.call("/greet", b"bob").payload().bytes(), b"hi bob");
    }

    #[test]
    fn replace_and_remove() {
        let r = HandlerRegistry::new();
        r.put("/x", Handler::new(echo, false)).unwrap();
        r.put("/x", Handler::new(|_: &str, _: &[u8]| Reply::fail(), true))
            .unwrap();

        assert_eq!(r.len(), 1);
        let h = r.get("/x").unwrap();
        assert!(h.suppress_log());
        assert!(!h.call("/x", b"").is_success());

        r.remove("/x").unwrap();
        assert!(r.get("/x").is_none());
        assert!(matches!(r.remove("/x"), Err(Error::NotFound(_))));
    }

    #[test]
    fn borrowed_reply_from_handler() {
        let r = HandlerRegistry::new();
        r.put(
            "/v",
            Handler::new(|_: &str, _: &[u8]| Reply::ok_with(mime::PLAIN, "1.0.2"), false),
        )
        .unwrap();

        let reply = r.get("/v").unwrap().call("/v", b"");
        assert!(matches!(reply.payload(), Payload::BorrowedText(_)));
    }
}
