//! Plain HTTP/1.1 over std TCP sockets.
//!
//! One acceptor thread admits connections and hands each to its own
//! worker thread, so a slow POST body never blocks other clients. The
//! number of open connections is capped. When configured to, the least
//! recently used one is purged to make room, idle keep-alive connections
//! before busy ones.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::server::Engine;

mod conn;
mod fill_more;

use conn::Phase;

pub use conn::MAX_HEAD;

const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Engine serving the dispatcher on `0.0.0.0:port`.
#[derive(Debug)]
pub struct TcpEngine {
    name: String,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    conns: Arc<Connections>,
    acceptor: Option<JoinHandle<()>>,
}

impl TcpEngine {
    /// Address actually bound, useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently open.
    pub fn open_connections(&self) -> usize {
        self.conns.inner.lock().open.len()
    }

    fn halt(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);

        if acceptor.join().is_err() {
            warn!("Acceptor of \"{}\" panicked", self.name);
        }

        let (open, workers) = self.conns.drain();

        for slot in &open {
            slot.breaker.disconnect();
        }

        for worker in workers {
            if worker.join().is_err() {
                warn!("Connection thread of \"{}\" panicked", self.name);
            }
        }

        debug!("Engine \"{}\" halted, {} connections cut", self.name, open.len());
    }
}

impl Engine for TcpEngine {
    fn start(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        config.validate()?;

        if config.is_secure() {
            return Err(Error::TlsUnsupported);
        }

        let port = config.port;
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|source| Error::Bind { port, source })?;

        let local_addr = listener.local_addr()?;

        // Polled, so stopping never waits on a blocked accept.
        listener.set_nonblocking(true)?;

        let running = Arc::new(AtomicBool::new(true));
        let conns = Arc::new(Connections::default());

        let acceptor = Acceptor {
            listener,
            dispatcher,
            running: running.clone(),
            conns: conns.clone(),
            limits: Limits::from(config),
        };

        let handle = thread::Builder::new()
            .name(format!("{}-accept", config.name))
            .stack_size(config.stack_size)
            .spawn(move || acceptor.run())?;

        info!("Webserver \"{}\" listening on {}", config.name, local_addr);

        Ok(TcpEngine {
            name: config.name.clone(),
            local_addr,
            running,
            conns,
            acceptor: Some(handle),
        })
    }

    fn stop(mut self) -> Result<()> {
        self.halt();
        Ok(())
    }
}

impl Drop for TcpEngine {
    fn drop(&mut self) {
        self.halt();
    }
}

#[derive(Debug, Clone)]
struct Limits {
    name: String,
    stack_size: usize,
    max_sockets: usize,
    lru_purge: bool,
    recv_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
}

impl From<&ServerConfig> for Limits {
    fn from(c: &ServerConfig) -> Self {
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));

        Limits {
            name: c.name.clone(),
            stack_size: c.stack_size,
            max_sockets: c.max_sockets,
            lru_purge: c.lru_purge,
            recv_timeout: secs(c.recv_timeout_secs),
            send_timeout: secs(c.send_timeout_secs),
        }
    }
}

struct Acceptor {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
    conns: Arc<Connections>,
    limits: Limits,
}

impl Acceptor {
    fn run(self) {
        while self.running.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    trace!("Accepted {}", peer);
                    if let Err(e) = self.admit(stream) {
                        warn!("Dropped connection from {}: {}", peer, e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
    }

    fn admit(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(self.limits.recv_timeout)?;
        stream.set_write_timeout(self.limits.send_timeout)?;
        stream.set_nodelay(true)?;

        let breaker = Breaker(stream.try_clone()?);

        let Some(id) = self.conns.open(breaker, &self.limits) else {
            debug!("All {} sockets in use, refusing", self.limits.max_sockets);
            return Ok(());
        };

        let dispatcher = self.dispatcher.clone();
        let conns = self.conns.clone();

        let spawned = thread::Builder::new()
            .name(format!("{}-conn", self.limits.name))
            .stack_size(self.limits.stack_size)
            .spawn(move || {
                if let Err(e) = conn::serve(stream, &dispatcher, |p| conns.mark(id, p)) {
                    debug!("Connection {} ended: {}", id, e);
                }
                conns.close(id);
            });

        match spawned {
            Ok(handle) => {
                self.conns.track(handle);
                Ok(())
            }
            Err(e) => {
                self.conns.close(id);
                Err(e)
            }
        }
    }
}

/// Second handle on a connection, used to cut it from another thread.
#[derive(Debug)]
struct Breaker(TcpStream);

impl Breaker {
    fn disconnect(&self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
}

#[derive(Debug, Default)]
struct Connections {
    inner: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    /// Least recently used first.
    open: VecDeque<Slot>,
    workers: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
struct Slot {
    id: u64,
    breaker: Breaker,
    busy: bool,
}

impl Connections {
    fn open(&self, breaker: Breaker, limits: &Limits) -> Option<u64> {
        let mut t = self.inner.lock();

        t.workers.retain(|w| !w.is_finished());

        if t.open.len() >= limits.max_sockets {
            if !limits.lru_purge {
                return None;
            }
            let idx = t.open.iter().position(|s| !s.busy).unwrap_or(0);
            if let Some(old) = t.open.remove(idx) {
                debug!("Purging least recently used connection {}", old.id);
                old.breaker.disconnect();
            }
        }

        let id = t.next_id;
        t.next_id += 1;
        t.open.push_back(Slot {
            id,
            breaker,
            busy: false,
        });

        Some(id)
    }

    /// A new request makes the connection the most recently used.
    fn mark(&self, id: u64, phase: Phase) {
        let mut t = self.inner.lock();

        let Some(idx) = t.open.iter().position(|s| s.id == id) else {
            return;
        };

        match phase {
            Phase::Busy => {
                if let Some(mut slot) = t.open.remove(idx) {
                    slot.busy = true;
                    t.open.push_back(slot);
                }
            }
            Phase::Idle => t.open[idx].busy = false,
        }
    }

    fn close(&self, id: u64) {
        self.inner.lock().open.retain(|s| s.id != id);
    }

    fn track(&self, worker: JoinHandle<()>) {
        self.inner.lock().workers.push(worker);
    }

    fn drain(&self) -> (Vec<Slot>, Vec<JoinHandle<()>>) {
        let mut t = self.inner.lock();
        let open = t.open.drain(..).collect();
        let workers = std::mem::take(&mut t.workers);
        (open, workers)
    }
}
