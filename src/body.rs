use std::io;
use std::ops::Deref;

use crate::error::{Error, Result};
use crate::exchange::Exchange;

/// Complete request body.
///
/// The backing buffer is one byte longer than the body and ends in a NUL,
/// so text bodies can be handed to code expecting C strings. Derefs to the
/// body without the terminator.
#[derive(Debug)]
pub struct RecvBody {
    buf: Vec<u8>,
}

impl RecvBody {
    /// Body followed by its NUL terminator.
    pub fn with_nul(&self) -> &[u8] {
        &self.buf
    }
}

impl Deref for RecvBody {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buf[..self.buf.len() - 1]
    }
}

/// Receive the entire declared body of a request.
///
/// Loops over partial reads until the declared length is in. Never reads
/// past the declared length. On any failure the partially filled buffer is
/// dropped before the error is returned.
pub fn recv_body<E: Exchange + ?Sized>(ex: &mut E) -> Result<RecvBody> {
    let expected = ex.content_len();
    let size = expected.checked_add(1).ok_or(Error::Alloc(usize::MAX))?;

    let mut buf = Vec::new();
    buf.try_reserve_exact(size).map_err(|_| Error::Alloc(size))?;
    buf.resize(size, 0);

    let mut received = 0;

    while received < expected {
        let n = match ex.recv(&mut buf[received..expected]) {
            Ok(0) => {
                let source = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "body ended before declared length",
                );
                return Err(Error::Receive {
                    received,
                    expected,
                    source,
                });
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(Error::Receive {
                    received,
                    expected,
                    source,
                })
            }
        };

        received += n.min(expected - received);
        trace!("Received {}/{}b", received, expected);
    }

    Ok(RecvBody { buf })
}
