use std::io;

const INCREMENT: usize = 1024;
const THRESHOLD: usize = 64;

/// Read buffer that grows while a request head is incomplete.
///
/// Bytes past the head stay buffered and are handed out first when the
/// body is received.
pub struct FillMoreBuffer<Read> {
    buffer: Vec<u8>,
    pos: usize,
    reader: Read,
}

impl<Read: io::Read> FillMoreBuffer<Read> {
    pub fn new(reader: Read) -> Self {
        Self {
            buffer: vec![0; INCREMENT],
            pos: 0,
            reader,
        }
    }

    /// Read more from the source. Returns the amount read, 0 on end of stream.
    pub fn fill_more(&mut self) -> io::Result<usize> {
        if self.pos > self.buffer.len() - THRESHOLD {
            self.buffer.resize(self.buffer.len() + INCREMENT, 0);
        }

        let n = loop {
            match self.reader.read(&mut self.buffer[self.pos..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                r => break r?,
            }
        };
        self.pos += n;

        Ok(n)
    }

    pub fn consume(&mut self, amount: usize) {
        let max = amount.min(self.pos);
        self.buffer.copy_within(max..self.pos, 0);
        self.pos -= max;
    }

    /// Copy out of what is already buffered, or read straight from the
    /// source when nothing is.
    pub fn read_into(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if self.pos == 0 {
            return self.reader.read(dst);
        }

        let n = dst.len().min(self.pos);
        dst[..n].copy_from_slice(&self.buffer[..n]);
        self.consume(n);

        Ok(n)
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Reader handing out a fixed number of bytes per call.
    struct Trickle<'a>(&'a [u8], usize);

    impl io::Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.0.len().min(buf.len()).min(self.1);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn grows_past_increment() {
        let input = vec![b'x'; INCREMENT * 3];
        let mut b = FillMoreBuffer::new(Trickle(&input, 500));

        while b.fill_more().unwrap() > 0 {}

        assert_eq!(b.buffer().len(), INCREMENT * 3);
    }

    #[test]
    fn consume_keeps_rest() {
        let mut b = FillMoreBuffer::new(Trickle(b"GET / HTTP/1.1\r\n\r\nbody", 100));
        b.fill_more().unwrap();

        b.consume(18);
        assert_eq!(b.buffer(), b"body");
    }

    #[test]
    fn read_into_drains_buffer_first() {
        let mut b = FillMoreBuffer::new(Trickle(b"abcdef", 4));
        b.fill_more().unwrap();

        let mut dst = [0; 3];
        assert_eq!(b.read_into(&mut dst).unwrap(), 3);
        assert_eq!(&dst, b"abc");

        assert_eq!(b.read_into(&mut dst).unwrap(), 1);
        assert_eq!(&dst[..1], b"d");

        assert_eq!(b.read_into(&mut dst).unwrap(), 2);
        assert_eq!(&dst[..2], b"ef");

        assert_eq!(b.read_into(&mut dst).unwrap(), 0);
    }
}
