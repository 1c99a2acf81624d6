use std::io;

use http::StatusCode;

/// One request/response pair as seen by the dispatcher.
///
/// This is everything the dispatcher needs from a transport engine. Status,
/// content type and headers are staged with the setters and go out with the
/// single [`Exchange::send`] call that completes the response.
pub trait Exchange {
    /// Raw request target, query string and fragment included.
    fn uri(&self) -> &str;

    /// Declared length of the request body.
    fn content_len(&self) -> usize;

    /// Read the next part of the request body into `buf`.
    ///
    /// May return fewer bytes than asked for. `Ok(0)` means the peer stopped
    /// sending.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn set_status(&mut self, status: StatusCode);

    fn set_content_type(&mut self, mime: &str);

    fn set_header(&mut self, name: &'static str, value: &'static str);

    /// Send the response with `body` as its complete content.
    fn send(&mut self, body: &[u8]) -> io::Result<()>;

    /// Send a response consisting of only a status.
    fn send_status(&mut self, status: StatusCode) -> io::Result<()> {
        self.set_status(status);
        self.send(&[])
    }
}
