use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use qweb::tcp::TcpEngine;
use qweb::{mime, Error, Reply, Server, ServerConfig};

struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn start(config: ServerConfig) -> Server<TcpEngine> {
    let s: Server<TcpEngine> = Server::start(config.port(0)).unwrap();
    s.register_file("/", mime::HTML, b"<p>hello</p>").unwrap();
    s.register_post("/echo", |_: &str, body: &[u8]| {
        Reply::ok_with(mime::BINARY, body.to_vec())
    })
    .unwrap();
    s
}

fn connect(s: &Server<TcpEngine>) -> TcpStream {
    let addr = SocketAddr::from(([127, 0, 0, 1], s.engine().local_addr().port()));
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn read_response(stream: &mut TcpStream) -> Response {
    let mut buf = Vec::new();
    let mut tmp = [0; 1024];

    loop {
        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut res = httparse::Response::new(&mut headers);

        if let httparse::Status::Complete(used) = res.parse(&buf).unwrap() {
            let headers: Vec<(String, String)> = res
                .headers
                .iter()
                .map(|h| {
                    let value = String::from_utf8_lossy(h.value).to_string();
                    (h.name.to_string(), value)
                })
                .collect();

            let len: usize = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
                .map(|(_, v)| v.parse().unwrap())
                .unwrap_or(0);

            let status = res.code.unwrap();
            let mut body = buf[used..].to_vec();

            while body.len() < len {
                let n = stream.read(&mut tmp).unwrap();
                assert!(n > 0, "connection closed mid body");
                body.extend_from_slice(&tmp[..n]);
            }

            return Response {
                status,
                headers,
                body,
            };
        }

        let n = stream.read(&mut tmp).unwrap();
        assert!(n > 0, "connection closed mid head");
        buf.extend_from_slice(&tmp[..n]);
    }
}

fn request(stream: &mut TcpStream, raw: &[u8]) -> Response {
    stream.write_all(raw).unwrap();
    read_response(stream)
}

fn is_closed(stream: &mut TcpStream) -> bool {
    let mut tmp = [0; 16];
    matches!(stream.read(&mut tmp), Ok(0) | Err(_))
}

#[test]
fn get_keep_alive() {
    let s = start(ServerConfig::new("get"));
    let mut c = connect(&s);

    let r = request(&mut c, b"GET /?x=1 HTTP/1.1\r\nHost: dev\r\n\r\n");
    assert_eq!(r.status, 200);
    assert_eq!(r.header("content-type"), Some(mime::HTML));
    assert_eq!(r.header("connection"), Some("keep-alive"));
    assert_eq!(r.body, b"<p>hello</p>");

    let r = request(&mut c, b"GET /missing HTTP/1.1\r\nHost: dev\r\n\r\n");
    assert_eq!(r.status, 404);

    let r = request(&mut c, b"GET / HTTP/1.1\r\nHost: dev\r\n\r\n");
    assert_eq!(r.status, 200);

    s.stop().unwrap();
}

#[test]
fn post_echo() {
    let s = start(ServerConfig::new("post"));
    let mut c = connect(&s);

    let r = request(
        &mut c,
        b"POST /echo?a=b HTTP/1.1\r\nHost: dev\r\nContent-Length: 5\r\n\r\nhello",
    );
    assert_eq!(r.status, 200);
    assert_eq!(r.body, b"hello");

    // Head and body in separate writes.
    c.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 3\r\n\r\n")
        .unwrap();
    c.flush().unwrap();
    let r = request(&mut c, b"abc");
    assert_eq!(r.body, b"abc");

    let r = request(&mut c, b"POST /nowhere HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    assert_eq!(r.status, 500);
}

#[test]
fn oversized_post_closes() {
    let s = start(ServerConfig::new("big").max_body(8));
    let mut c = connect(&s);

    let r = request(
        &mut c,
        b"POST /echo HTTP/1.1\r\nContent-Length: 20\r\n\r\n01234567890123456789",
    );
    assert_eq!(r.status, 500);
    assert_eq!(r.header("connection"), Some("close"));
    assert!(is_closed(&mut c));

    let mut c = connect(&s);
    let r = request(&mut c, b"POST /echo HTTP/1.1\r\nContent-Length: 8\r\n\r\n01234567");
    assert_eq!(r.status, 200);
    assert_eq!(r.body, b"01234567");
}

#[test]
fn connection_close_honored() {
    let s = start(ServerConfig::new("close"));
    let mut c = connect(&s);

    let r = request(&mut c, b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");
    assert_eq!(r.status, 200);
    assert_eq!(r.header("connection"), Some("close"));
    assert!(is_closed(&mut c));
}

#[test]
fn other_methods() {
    let s = start(ServerConfig::new("methods"));
    let mut c = connect(&s);

    let r = request(&mut c, b"DELETE / HTTP/1.1\r\n\r\n");
    assert_eq!(r.status, 405);
    assert_eq!(r.header("allow"), Some("GET, POST"));

    let r = request(
        &mut c,
        b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
    );
    assert_eq!(r.status, 501);
    assert!(is_closed(&mut c));
}

#[test]
fn malformed_head() {
    let s = start(ServerConfig::new("bad"));
    let mut c = connect(&s);

    let r = request(&mut c, b"POST /echo HTTP/1.1\r\nContent-Length: many\r\n\r\n");
    assert_eq!(r.status, 400);
    assert!(is_closed(&mut c));
}

#[test]
fn too_many_headers() {
    let s = start(ServerConfig::new("headers"));
    let mut c = connect(&s);

    let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
    for i in 0..40 {
        raw.extend_from_slice(format!("X-H{}: v\r\n", i).as_bytes());
    }
    raw.extend_from_slice(b"\r\n");

    let r = request(&mut c, &raw);
    assert_eq!(r.status, 431);
    assert!(is_closed(&mut c));
}

#[test]
fn bind_conflict() {
    let s = start(ServerConfig::new("first"));
    let port = s.engine().local_addr().port();

    let second = Server::<TcpEngine>::start(ServerConfig::new("second").port(port));
    assert!(matches!(second, Err(Error::Bind { port: p, .. }) if p == port));
}

#[test]
fn tls_unsupported() {
    let config = ServerConfig::secure("tls", b"cert".to_vec(), b"key".to_vec()).port(0);
    let r = Server::<TcpEngine>::start(config);
    assert!(matches!(r, Err(Error::TlsUnsupported)));
}

#[test]
fn stop_cuts_open_connections() {
    let s = start(ServerConfig::new("stop"));
    let mut c = connect(&s);

    let r = request(&mut c, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(r.status, 200);

    let d = s.dispatcher().clone();
    s.stop().unwrap();

    assert!(is_closed(&mut c));
    assert!(d.resources().is_empty());
}

#[test]
fn full_without_purge_refuses() {
    let s = start(ServerConfig::new("full").max_sockets(1).lru_purge(false));

    let mut first = connect(&s);
    assert_eq!(request(&mut first, b"GET / HTTP/1.1\r\n\r\n").status, 200);

    let mut second = connect(&s);
    let _ = second.write_all(b"GET / HTTP/1.1\r\n\r\n");
    assert!(is_closed(&mut second));

    assert_eq!(request(&mut first, b"GET / HTTP/1.1\r\n\r\n").status, 200);
}

#[test]
fn full_with_purge_evicts_oldest() {
    let s = start(ServerConfig::new("purge").max_sockets(1));

    let mut first = connect(&s);
    assert_eq!(request(&mut first, b"GET / HTTP/1.1\r\n\r\n").status, 200);

    let mut second = connect(&s);
    assert_eq!(request(&mut second, b"GET / HTTP/1.1\r\n\r\n").status, 200);

    assert!(is_closed(&mut first));
    assert_eq!(s.engine().open_connections(), 1);
}
