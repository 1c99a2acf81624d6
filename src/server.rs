use std::sync::Arc;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::mime;
use crate::registry::handler::{Handler, HandlerId, PostHandler};
use crate::registry::resource::{Content, ResourceId, ResourceRef, SharedBuffer};
use crate::script::CLIENT_SCRIPT;
use crate::tcp::TcpEngine;

/// A transport engine driving a [`Dispatcher`].
///
/// `start` binds whatever the engine listens on and from then on routes
/// every GET and POST request to the dispatcher. `stop` must not return
/// before the engine has stopped calling into the dispatcher.
pub trait Engine: Sized {
    fn start(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Self>;

    fn stop(self) -> Result<()>;
}

/// One running server: a pair of registries and the engine serving them.
///
/// Dropping the server stops it the same way [`Server::stop`] does, so the
/// registries are released on every path.
pub struct Server<E: Engine = TcpEngine> {
    name: String,
    dispatcher: Arc<Dispatcher>,
    engine: Option<E>,
}

impl<E: Engine> Server<E> {
    pub fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        info!("Starting webserver \"{}\" on port {}", config.name, config.port);

        let dispatcher = Arc::new(Dispatcher::new(config.max_body));
        let engine = E::start(&config, dispatcher.clone())?;

        Ok(Server {
            name: config.name,
            dispatcher,
            engine: Some(engine),
        })
    }

    /// Stop the engine, then release everything registered.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let stopped = match self.engine.take() {
            Some(engine) => engine.stop(),
            None => Ok(()),
        };

        // Registries are released even if the engine did not stop cleanly.
        self.dispatcher.clear();

        info!("Stopped webserver \"{}\"", self.name);
        stopped
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &E {
        self.engine
            .as_ref()
            .expect("engine is present until the server stops")
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Register bytes baked into the image, served in full.
    pub fn register_file(
        &self,
        path: &str,
        mime: &'static str,
        content: &'static [u8],
    ) -> Result<ResourceId> {
        self.register_page(path, mime, content, content.len())
    }

    /// Register content of which the first `len` bytes are served.
    pub fn register_page(
        &self,
        path: &str,
        mime: &'static str,
        content: impl Into<Content>,
        len: usize,
    ) -> Result<ResourceId> {
        self.dispatcher.resources().put(path, mime, content, len)
    }

    pub fn register_shared(
        &self,
        path: &str,
        mime: &'static str,
        content: Arc<[u8]>,
    ) -> Result<ResourceId> {
        let len = content.len();
        self.register_page(path, mime, content, len)
    }

    /// Register a buffer the firmware keeps rewriting, see [`Server::truncate`].
    pub fn register_buffer(
        &self,
        path: &str,
        mime: &'static str,
        buffer: SharedBuffer,
        len: usize,
    ) -> Result<ResourceId> {
        self.register_page(path, mime, buffer, len)
    }

    /// Serve the browser helper script at `path`.
    pub fn register_client_script(&self, path: &str) -> Result<ResourceId> {
        self.register_file(path, mime::JS, CLIENT_SCRIPT.as_bytes())
    }

    pub fn truncate<'a>(&self, target: impl Into<ResourceRef<'a>>, len: usize) {
        self.dispatcher.resources().truncate(target, len)
    }

    pub fn remove_page(&self, path: &str) -> Result<()> {
        self.dispatcher.resources().remove(path)
    }

    pub fn register_post(&self, path: &str, handler: impl PostHandler) -> Result<HandlerId> {
        self.dispatcher
            .handlers()
            .put(path, Handler::new(handler, false))
    }

    /// Like [`Server::register_post`], without per-request logging.
    pub fn register_post_quiet(&self, path: &str, handler: impl PostHandler) -> Result<HandlerId> {
        self.dispatcher
            .handlers()
            .put(path, Handler::new(handler, true))
    }

    pub fn remove_post(&self, path: &str) -> Result<()> {
        self.dispatcher.handlers().remove(path)
    }

    /// Release spare registry capacity once registration is done.
    pub fn shrink_registries(&self) {
        self.dispatcher.resources().shrink();
        self.dispatcher.handlers().shrink();
    }
}

impl<E: Engine> Drop for Server<E> {
    fn drop(&mut self) {
        if self.engine.is_none() {
            return;
        }
        if let Err(e) = self.shutdown() {
            warn!("Stopping webserver \"{}\" failed: {}", self.name, e);
        }
    }
}
