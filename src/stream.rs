//! Stream helpers shared by the detectors.
//!
//! Detectors are tried one after another on the same stream, so each one
//! must leave the read cursor exactly where it found it. [`RewindGuard`]
//! does that on drop, whatever path the detector leaves by. Detectors call
//! [`RewindGuard::restore`] on their normal path so a failed seek becomes
//! an error instead of a logged fault.

use std::io::{Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{DetectError, Result};

/// A readable, seekable byte source.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Restores a stream's position when dropped.
pub struct RewindGuard<'a, S: Seek + ?Sized> {
    stream: &'a mut S,
    origin: u64,
    detector: &'static str,
    sink: &'a dyn DiagnosticSink,
    restored: bool,
}

impl<'a, S: Seek + ?Sized> RewindGuard<'a, S> {
    /// Remember the current position of `stream`.
    pub fn new(
        stream: &'a mut S,
        detector: &'static str,
        sink: &'a dyn DiagnosticSink,
    ) -> Result<Self> {
        let origin = stream.stream_position()?;
        Ok(Self {
            stream,
            origin,
            detector,
            sink,
            restored: false,
        })
    }

    /// Offset the stream is restored to.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Seek back to the origin now and report failure to the caller.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        let origin = self.origin;
        self.stream.seek(SeekFrom::Start(origin)).map_err(|e| {
            DetectError::fault(format!("failed to restore stream to offset {}: {}", origin, e))
        })?;
        Ok(())
    }
}

impl<S: Seek + ?Sized> Deref for RewindGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: Seek + ?Sized> DerefMut for RewindGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: Seek + ?Sized> Drop for RewindGuard<'_, S> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.stream.seek(SeekFrom::Start(self.origin)) {
            self.sink.record(Diagnostic::Fault {
                detector: self.detector,
                message: format!("failed to restore stream to offset {}: {}", self.origin, e),
            });
        }
    }
}

/// Read at most `limit` bytes from the current position.
///
/// Short reads from the underlying source are retried until `limit` bytes
/// arrive or the source is exhausted.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, limit: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    Read::take(&mut *reader, limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NullSink, RecordingSink};
    use std::io::{self, Cursor};

    /// Hands out at most three bytes per read call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            self.0.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_guard_restores_position() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.set_position(10);
        {
            let mut guard = RewindGuard::new(&mut cursor, "test", &NullSink).unwrap();
            assert_eq!(guard.origin(), 10);
            let bytes = read_up_to(&mut *guard, 20).unwrap();
            assert_eq!(bytes.len(), 20);
            assert_eq!(guard.position(), 30);
        }
        assert_eq!(cursor.position(), 10);
    }

    /// Relative seeks work, absolute ones fail.
    struct NoRewind(Cursor<Vec<u8>>);

    impl Read for NoRewind {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for NoRewind {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            match pos {
                SeekFrom::Start(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "no rewind")),
                other => self.0.seek(other),
            }
        }
    }

    #[test]
    fn test_explicit_restore() {
        let mut cursor = Cursor::new(vec![0u8; 64]);
        cursor.set_position(8);
        let sink = RecordingSink::new();
        let mut guard = RewindGuard::new(&mut cursor, "test", &sink).unwrap();
        read_up_to(&mut *guard, 16).unwrap();
        guard.restore().unwrap();
        assert_eq!(cursor.position(), 8);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_failed_restore_is_an_error() {
        let mut stream = NoRewind(Cursor::new(vec![0u8; 64]));
        let sink = RecordingSink::new();
        let mut guard = RewindGuard::new(&mut stream, "test", &sink).unwrap();
        read_up_to(&mut *guard, 16).unwrap();

        let err = guard.restore().unwrap_err();
        assert!(matches!(err, DetectError::InternalFault { .. }));
        // Drop does not report the same failure again
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_failed_drop_restore_recorded() {
        let mut stream = NoRewind(Cursor::new(vec![0u8; 64]));
        let sink = RecordingSink::new();
        {
            let mut guard = RewindGuard::new(&mut stream, "test", &sink).unwrap();
            read_up_to(&mut *guard, 16).unwrap();
        }
        assert!(sink.contains(|e| matches!(e, Diagnostic::Fault { detector: "test", .. })));
    }

    #[test]
    fn test_read_up_to_short_source() {
        let mut cursor = Cursor::new(vec![1u8; 5]);
        let bytes = read_up_to(&mut cursor, 256).unwrap();
        assert_eq!(bytes, vec![1u8; 5]);
    }

    #[test]
    fn test_read_up_to_retries_short_reads() {
        let mut trickle = Trickle(Cursor::new((0u8..=255).collect()));
        let bytes = read_up_to(&mut trickle, 256).unwrap();
        assert_eq!(bytes.len(), 256);
        assert_eq!(bytes[255], 255);
    }
}
