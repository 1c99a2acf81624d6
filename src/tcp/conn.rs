use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};

use http::{Method, StatusCode};

use super::fill_more::FillMoreBuffer;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::exchange::Exchange;

/// Largest request head accepted.
pub const MAX_HEAD: usize = 8 * 1024;

const MAX_HEADERS: usize = 32;

// Bytes discarded after the response when closing a half-read connection.
const LINGER_LIMIT: usize = 64 * 1024;

/// Where a connection is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A request head arrived and is being served.
    Busy,
    /// Kept alive, waiting for the next request.
    Idle,
}

#[derive(Debug)]
struct Head {
    method: Method,
    uri: String,
    content_len: usize,
    chunked: bool,
    close: bool,
}

/// Serve requests on one connection until either side closes it.
///
/// `on_phase` is told when a request head arrives and when a response
/// leaves the connection open for the next one.
pub fn serve(
    stream: TcpStream,
    dispatcher: &Dispatcher,
    mut on_phase: impl FnMut(Phase),
) -> io::Result<()> {
    let mut output = stream.try_clone()?;
    let mut input = FillMoreBuffer::new(stream);

    loop {
        let head = match read_head(&mut input) {
            Ok(Some(v)) => v,
            Ok(None) => return Ok(()),
            Err(Error::Io(e)) => return Err(e),
            Err(e) => {
                debug!("Bad request head: {}", e);
                let status = match e {
                    Error::HeadTooLarge(_) => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                    _ => StatusCode::BAD_REQUEST,
                };
                refuse(&mut output, status)?;
                linger(&mut input, &output);
                return Ok(());
            }
        };

        on_phase(Phase::Busy);
        trace!("{} {} ({}b)", head.method, head.uri, head.content_len);

        if head.chunked {
            debug!("Chunked request bodies are not supported: {}", head.uri);
            refuse(&mut output, StatusCode::NOT_IMPLEMENTED)?;
            linger(&mut input, &output);
            return Ok(());
        }

        let mut ex = TcpExchange::new(&head, &mut input, &mut output);

        let dispatched = dispatcher.dispatch(&head.method, &mut ex);
        let reusable = ex.is_reusable();

        if let Err(e) = dispatched {
            debug!("Closing connection after {}: {}", head.uri, e);
            linger(&mut input, &output);
            return Ok(());
        }

        if !reusable {
            linger(&mut input, &output);
            return Ok(());
        }

        on_phase(Phase::Idle);
    }
}

fn read_head<R: io::Read>(input: &mut FillMoreBuffer<R>) -> Result<Option<Head>> {
    loop {
        if !input.buffer().is_empty() {
            if let Some((head, used)) = parse_head(input.buffer())? {
                input.consume(used);
                return Ok(Some(head));
            }
            if input.buffer().len() >= MAX_HEAD {
                return Err(Error::HeadTooLarge(MAX_HEAD));
            }
        }

        if input.fill_more()? == 0 {
            if input.buffer().is_empty() {
                return Ok(None);
            }
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid request head",
            )));
        }
    }
}

fn parse_head(buf: &[u8]) -> Result<Option<(Head, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let used = match req.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(None),
        // Same answer as an oversized head.
        Err(httparse::Error::TooManyHeaders) => return Err(Error::HeadTooLarge(MAX_HEAD)),
        Err(e) => return Err(e.into()),
    };

    let method = req
        .method
        .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
        .ok_or(httparse::Error::Token)?;

    let uri = req.path.unwrap_or("/").to_string();

    let mut content_len = 0;
    let mut chunked = false;
    let mut keep_alive = req.version == Some(1);

    for h in req.headers.iter() {
        if h.name.eq_ignore_ascii_case("content-length") {
            content_len = std::str::from_utf8(h.value)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .ok_or(httparse::Error::HeaderValue)?;
        } else if h.name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = !h.value.eq_ignore_ascii_case(b"identity");
        } else if h.name.eq_ignore_ascii_case("connection") {
            for token in h.value.split(|c| *c == b',') {
                let token = trim(token);
                if token.eq_ignore_ascii_case(b"close") {
                    keep_alive = false;
                } else if token.eq_ignore_ascii_case(b"keep-alive") {
                    keep_alive = true;
                }
            }
        }
    }

    let head = Head {
        method,
        uri,
        content_len,
        chunked,
        close: !keep_alive,
    };

    Ok(Some((head, used)))
}

fn trim(mut v: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = v {
        v = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = v {
        v = rest;
    }
    v
}

fn refuse(output: &mut TcpStream, status: StatusCode) -> io::Result<()> {
    write!(
        output,
        "HTTP/1.1 {} {}\r\nConnection: close\r\nContent-Length: 0\r\n\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )?;
    output.flush()
}

// Half close and discard what the peer still sends, so the response is
// not lost to a reset caused by unread input.
fn linger(input: &mut FillMoreBuffer<TcpStream>, output: &TcpStream) {
    let _ = output.shutdown(Shutdown::Write);

    let mut tmp = [0; 512];
    let mut discarded = 0;

    while discarded < LINGER_LIMIT {
        match input.read_into(&mut tmp) {
            Ok(0) | Err(_) => break,
            Ok(n) => discarded += n,
        }
    }
}

struct TcpExchange<'a> {
    head: &'a Head,
    input: &'a mut FillMoreBuffer<TcpStream>,
    output: &'a mut TcpStream,
    received: usize,
    status: StatusCode,
    content_type: Option<String>,
    headers: Vec<(&'static str, &'static str)>,
    close: bool,
    sent: bool,
}

impl<'a> TcpExchange<'a> {
    fn new(
        head: &'a Head,
        input: &'a mut FillMoreBuffer<TcpStream>,
        output: &'a mut TcpStream,
    ) -> Self {
        TcpExchange {
            head,
            input,
            output,
            received: 0,
            status: StatusCode::OK,
            content_type: None,
            headers: Vec::new(),
            close: head.close,
            sent: false,
        }
    }

    /// Whether the next request can follow on the same connection.
    fn is_reusable(&self) -> bool {
        self.sent && !self.close && self.received == self.head.content_len
    }
}

impl Exchange for TcpExchange<'_> {
    fn uri(&self) -> &str {
        &self.head.uri
    }

    fn content_len(&self) -> usize {
        self.head.content_len
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.head.content_len - self.received;
        let max = buf.len().min(left);

        if max == 0 {
            return Ok(0);
        }

        let n = self.input.read_into(&mut buf[..max])?;
        self.received += n;

        Ok(n)
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_content_type(&mut self, mime: &str) {
        self.content_type = Some(mime.to_string());
    }

    fn set_header(&mut self, name: &'static str, value: &'static str) {
        if name.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("close") {
            self.close = true;
        }
        self.headers.push((name, value));
    }

    fn send(&mut self, body: &[u8]) -> io::Result<()> {
        self.sent = true;

        let mut head = Vec::with_capacity(256);

        write!(
            head,
            "HTTP/1.1 {} {}\r\n",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("")
        )?;

        if let Some(mime) = &self.content_type {
            write!(head, "Content-Type: {}\r\n", mime)?;
        }

        for (name, value) in &self.headers {
            // Decided below, the peer may have asked to close.
            if name.eq_ignore_ascii_case("connection") {
                continue;
            }
            write!(head, "{}: {}\r\n", name, value)?;
        }

        let connection = if self.close { "close" } else { "keep-alive" };
        write!(
            head,
            "Connection: {}\r\nContent-Length: {}\r\n\r\n",
            connection,
            body.len()
        )?;

        let sent = self
            .output
            .write_all(&head)
            .and_then(|_| self.output.write_all(body))
            .and_then(|_| self.output.flush());

        if sent.is_err() {
            self.close = true;
        }

        sent
    }
}
