//! Length-prefixed frames over a byte stream.
//!
//! Wire format: 4-byte big-endian length, then the rkyv payload. TCP
//! gives no message boundaries, so every battle-phase message goes
//! through here; a frame split across reads is reassembled, and two
//! frames coalesced into one read come back out as two frames.

use std::io::{self, Read, Write};

use super::protocol::MAX_FRAME_SIZE;

const LEN_PREFIX: usize = 4;
const READ_CHUNK: usize = 8192;
const MAX_SEND_BACKLOG: usize = 4 * MAX_FRAME_SIZE as usize;

fn check_payload(payload: &[u8]) -> io::Result<()> {
    if payload.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "empty frame"));
    }
    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds size limit",
        ));
    }
    Ok(())
}

/// Write one frame to a blocking writer.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    check_payload(payload)?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Outbound queue for non-blocking writers. `write_all` is not atomic
/// on a non-blocking socket: a full send buffer can cut it off with
/// part of a frame already on the wire, and anything written after
/// that desyncs the peer's length parsing. Queued frames are therefore
/// flushed from a single backlog, and a partially accepted frame is
/// resumed from its exact offset on the next flush.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one frame. Errors on empty or oversized payloads, or when
    /// the backlog cap says the peer has stopped draining.
    pub fn push(&mut self, payload: &[u8]) -> io::Result<()> {
        check_payload(payload)?;
        if self.buf.len() + LEN_PREFIX + payload.len() > MAX_SEND_BACKLOG {
            return Err(io::Error::other("send backlog full"));
        }
        self.buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(payload);
        Ok(())
    }

    /// Write as much of the backlog as the writer accepts right now.
    /// `WouldBlock`/`TimedOut` leaves the remainder queued.
    pub fn flush<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        let mut written = 0;
        let result = loop {
            if written == self.buf.len() {
                break Ok(());
            }
            match writer.write(&self.buf[written..]) {
                Ok(0) => {
                    break Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "writer accepted nothing",
                    ));
                }
                Ok(n) => written += n,
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        self.buf.drain(..written);
        result
    }

    pub fn backlog(&self) -> usize {
        self.buf.len()
    }
}

/// Accumulates bytes from non-blocking reads and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain whatever the stream has right now. `WouldBlock`/`TimedOut`
    /// is the steady state, not an error. Returns `Ok(false)` once the
    /// peer has closed the stream.
    pub fn fill<R: Read>(&mut self, reader: &mut R) -> io::Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(ref e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(true);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pop the next complete frame, if one has fully arrived.
    pub fn next_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }

        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "empty frame"));
        }
        if len > MAX_FRAME_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame length {} exceeds limit {}", len, MAX_FRAME_SIZE),
            ));
        }

        let total = LEN_PREFIX + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let frame = self.buf[LEN_PREFIX..total].to_vec();
        self.buf.drain(..total);
        Ok(Some(frame))
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_roundtrip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello").unwrap();
        write_frame(&mut wire, b"world!").unwrap();

        let mut reader = FrameReader::new();
        let mut cursor = Cursor::new(wire);
        assert!(!reader.fill(&mut cursor).unwrap()); // cursor hits EOF

        assert_eq!(reader.next_frame().unwrap().unwrap(), b"hello");
        assert_eq!(reader.next_frame().unwrap().unwrap(), b"world!");
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_split_frame_reassembled() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"split across reads").unwrap();
        let (first, second) = wire.split_at(7);

        let mut reader = FrameReader::new();
        reader.fill(&mut Cursor::new(first.to_vec())).unwrap();
        assert!(reader.next_frame().unwrap().is_none());

        reader.fill(&mut Cursor::new(second.to_vec())).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap(), b"split across reads");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut reader = FrameReader::new();
        let bogus = (MAX_FRAME_SIZE + 1).to_be_bytes();
        reader.fill(&mut Cursor::new(bogus.to_vec())).unwrap();
        assert!(reader.next_frame().is_err());
    }

    #[test]
    fn test_zero_length_frame_rejected() {
        let mut reader = FrameReader::new();
        reader.fill(&mut Cursor::new(vec![0, 0, 0, 0])).unwrap();
        assert!(reader.next_frame().is_err());
    }

    #[test]
    fn test_write_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_FRAME_SIZE as usize + 1];
        let mut wire = Vec::new();
        assert!(write_frame(&mut wire, &payload).is_err());
        assert!(wire.is_empty());
    }

    /// Accepts a bounded number of bytes, then reports `WouldBlock`
    /// like a non-blocking socket with a full send buffer.
    struct ChokedWriter {
        accepted: Vec<u8>,
        capacity: usize,
    }

    impl Write for ChokedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.capacity == 0 {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "buffer full"));
            }
            let n = buf.len().min(self.capacity);
            self.capacity -= n;
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_resumes_without_tearing_frames() {
        let mut writer = FrameWriter::new();
        let mut sink = ChokedWriter {
            accepted: Vec::new(),
            capacity: 6,
        };

        // The socket stalls after the prefix plus two payload bytes.
        writer.push(b"hello").unwrap();
        writer.flush(&mut sink).unwrap();
        assert_eq!(sink.accepted.len(), 6);
        assert_eq!(writer.backlog(), 3);

        // A later frame queues behind the remainder instead of
        // starting mid-stream.
        writer.push(b"world").unwrap();
        sink.capacity = usize::MAX;
        writer.flush(&mut sink).unwrap();
        assert_eq!(writer.backlog(), 0);

        let mut reader = FrameReader::new();
        reader.fill(&mut Cursor::new(sink.accepted)).unwrap();
        assert_eq!(reader.next_frame().unwrap().unwrap(), b"hello");
        assert_eq!(reader.next_frame().unwrap().unwrap(), b"world");
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_stalled_peer_hits_backlog_cap() {
        let mut writer = FrameWriter::new();
        let payload = vec![7u8; MAX_FRAME_SIZE as usize];
        for _ in 0..3 {
            writer.push(&payload).unwrap();
        }
        assert!(writer.push(&payload).is_err());
        // The queued frames are still intact.
        assert_eq!(writer.backlog(), 3 * (LEN_PREFIX + payload.len()));
    }
}
