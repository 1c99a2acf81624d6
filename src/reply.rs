//! What a POST handler hands back to the dispatcher.
//!
//! A [`Reply`] says whether the request succeeded (200 vs 500), which
//! content type to answer with, and carries a [`Payload`]. The payload
//! variant decides two things independently:
//!
//! | variant         | ownership   | length                    |
//! |-----------------|-------------|---------------------------|
//! | `BorrowedText`  | borrowed    | implicit, up to first NUL |
//! | `BorrowedBytes` | borrowed    | explicit                  |
//! | `OwnedText`     | transferred | implicit, up to first NUL |
//! | `OwnedBytes`    | transferred | explicit                  |
//!
//! Transferred payloads are dropped by the dispatcher once the response has
//! been handed to the transport, whether that send worked or not. Borrowed
//! payloads are `'static` and are never released by the dispatcher.

use http::StatusCode;

use crate::mime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    BorrowedText(&'static str),
    BorrowedBytes { data: &'static [u8], len: usize },
    OwnedText(String),
    OwnedBytes { data: Vec<u8>, len: usize },
}

impl Payload {
    /// Borrowed bytes of which the first `len` are sent.
    pub fn sized(data: &'static [u8], len: usize) -> Self {
        Payload::BorrowedBytes { data, len }
    }

    /// Owned bytes of which the first `len` are sent.
    pub fn owned_sized(data: Vec<u8>, len: usize) -> Self {
        Payload::OwnedBytes { data, len }
    }

    /// The bytes to send, with the length resolved.
    ///
    /// An explicit length past the end of the data is clamped.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::BorrowedText(v) => until_nul(v.as_bytes()),
            Payload::BorrowedBytes { data, len } => &data[..(*len).min(data.len())],
            Payload::OwnedText(v) => until_nul(v.as_bytes()),
            Payload::OwnedBytes { data, len } => &data[..(*len).min(data.len())],
        }
    }

    /// Whether the dispatcher owns, and must release, the payload.
    pub fn is_transferred(&self) -> bool {
        matches!(self, Payload::OwnedText(_) | Payload::OwnedBytes { .. })
    }

    /// Explicit length as declared by the handler, if any.
    pub fn declared_len(&self) -> Option<usize> {
        match self {
            Payload::BorrowedBytes { len, .. } | Payload::OwnedBytes { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Size of the data actually backing the payload.
    pub fn capacity(&self) -> usize {
        match self {
            Payload::BorrowedText(v) => v.len(),
            Payload::BorrowedBytes { data, .. } => data.len(),
            Payload::OwnedText(v) => v.len(),
            Payload::OwnedBytes { data, .. } => data.len(),
        }
    }
}

fn until_nul(b: &[u8]) -> &[u8] {
    let end = b.iter().position(|c| *c == 0).unwrap_or(b.len());
    &b[..end]
}

impl Default for Payload {
    fn default() -> Self {
        Payload::BorrowedText("")
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Payload::BorrowedText(value)
    }
}

impl From<&'static [u8]> for Payload {
    fn from(value: &'static [u8]) -> Self {
        Payload::BorrowedBytes {
            data: value,
            len: value.len(),
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::OwnedText(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        let len = value.len();
        Payload::OwnedBytes { data: value, len }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    success: bool,
    content_type: &'static str,
    payload: Payload,
}

impl Reply {
    pub fn new(success: bool, content_type: &'static str, payload: impl Into<Payload>) -> Self {
        Reply {
            success,
            content_type,
            payload: payload.into(),
        }
    }

    /// Empty 200 response.
    pub fn ok() -> Self {
        Self::new(true, mime::PLAIN, Payload::default())
    }

    /// Empty 500 response.
    pub fn fail() -> Self {
        Self::new(false, mime::PLAIN, Payload::default())
    }

    pub fn ok_with(content_type: &'static str, payload: impl Into<Payload>) -> Self {
        Self::new(true, content_type, payload)
    }

    pub fn fail_with(content_type: &'static str, payload: impl Into<Payload>) -> Self {
        Self::new(false, content_type, payload)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn status(&self) -> StatusCode {
        if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shorthands() {
        let ok = Reply::ok();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.content_type(), mime::PLAIN);
        assert!(ok.payload().bytes().is_empty());
        assert!(!ok.payload().is_transferred());

        let fail = Reply::fail();
        assert_eq!(fail.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(fail.payload().bytes().is_empty());
    }

    #[test]
    fn conversions_pick_variant() {
        assert!(matches!(Payload::from("x"), Payload::BorrowedText("x")));
        assert!(matches!(
            Payload::from(&b"xy"[..]),
            Payload::BorrowedBytes { len: 2, .. }
        ));
        assert!(matches!(
            Payload::from(String::from("x")),
            Payload::OwnedText(_)
        ));
        assert!(matches!(
            Payload::from(vec![1_u8, 2, 3]),
            Payload::OwnedBytes { len: 3, .. }
        ));
    }

    #[test]
    fn ownership() {
        assert!(!Payload::from("x").is_transferred());
        assert!(!Payload::sized(b"abc", 2).is_transferred());
        assert!(Payload::from(String::from("x")).is_transferred());
        assert!(Payload::owned_sized(vec![0; 4], 4).is_transferred());
    }

    #[test]
    fn implicit_length_stops_at_nul() {
        assert_eq!(Payload::from("abc\0def").bytes(), b"abc");
        assert_eq!(Payload::from(String::from("abc\0")).bytes(), b"abc");
        assert_eq!(Payload::from("abc").bytes(), b"abc");
        assert_eq!(Payload::from("\0").bytes(), b"");
    }

    #[test]
    fn explicit_length_keeps_nul() {
        let p = Payload::sized(b"a\0b\0", 3);
        assert_eq!(p.bytes(), b"a\0b");
        assert_eq!(p.declared_len(), Some(3));

        let p = Payload::owned_sized(vec![0, 1, 2, 3], 2);
        assert_eq!(p.bytes(), &[0_u8, 1]);
    }

    #[test]
    fn explicit_length_is_clamped() {
        let p = Payload::sized(b"abc", 10);
        assert_eq!(p.bytes(), b"abc");
        assert_eq!(p.declared_len(), Some(10));
        assert_eq!(p.capacity(), 3);
    }
}
