//! Request boundary detection
//!
//! Requests are never parsed. A request is complete when the byte stream
//! contains `"\r\n\r\n"`; every terminator earns one canned response.
//! The scanner keeps its partial match between receives so a terminator
//! split across two reads is counted once. Matches do not overlap.

/// End-of-headers marker.
pub const TERMINATOR: &[u8; 4] = b"\r\n\r\n";

/// Streaming matcher for [`TERMINATOR`].
///
/// `matched` is the length of the terminator prefix seen at the end of the
/// bytes fed so far (0..=3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryScanner {
    matched: u8,
}

impl BoundaryScanner {
    pub const fn new() -> Self {
        Self { matched: 0 }
    }

    /// Consume `bytes`, returning the number of completed terminators.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut completed = 0;
        for &b in bytes {
            if b == TERMINATOR[self.matched as usize] {
                self.matched += 1;
                if self.matched as usize == TERMINATOR.len() {
                    completed += 1;
                    self.matched = 0;
                }
            } else if b == b'\r' {
                // "\r" is both a mismatch and a fresh prefix
                self.matched = 1;
            } else {
                self.matched = 0;
            }
        }
        completed
    }

    /// Bytes of a terminator currently pending.
    #[inline]
    pub fn partial(&self) -> usize {
        self.matched as usize
    }

    pub fn reset(&mut self) {
        self.matched = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Non-overlapping `windows(4)` count for a single buffer.
    fn reference_count(buf: &[u8]) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i + 4 <= buf.len() {
            if &buf[i..i + 4] == TERMINATOR {
                count += 1;
                i += 4;
            } else {
                i += 1;
            }
        }
        count
    }

    #[test]
    fn test_single_request() {
        let mut s = BoundaryScanner::new();
        assert_eq!(s.feed(b"GET / HTTP/1.1\r\n\r\n"), 1);
        assert_eq!(s.partial(), 0);
    }

    #[test]
    fn test_no_terminator() {
        let mut s = BoundaryScanner::new();
        assert_eq!(s.feed(b"GET / HTTP/1.1\r\nHost: x\r\n"), 0);
        assert_eq!(s.partial(), 2);
        assert_eq!(s.feed(b""), 0);
    }

    #[test]
    fn test_pipelined_requests() {
        let mut s = BoundaryScanner::new();
        let buf = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\nHost: h\r\n\r\n";
        assert_eq!(s.feed(buf), 2);
    }

    #[test]
    fn test_split_terminator_counted_once() {
        for cut in 0..=4 {
            let mut s = BoundaryScanner::new();
            let mut total = s.feed(b"GET / HTTP/1.1");
            total += s.feed(&TERMINATOR[..cut]);
            total += s.feed(&TERMINATOR[cut..]);
            assert_eq!(total, 1, "cut at {}", cut);
        }
    }

    #[test]
    fn test_cr_restarts_match() {
        let mut s = BoundaryScanner::new();
        assert_eq!(s.feed(b"\r\r\n\r\n"), 1);
        assert_eq!(s.feed(b"\r\n\r\r\n\r\n"), 1);
    }

    #[test]
    fn test_matches_reference() {
        let samples: [&[u8]; 5] = [
            b"\r\n\r\n\r\n\r\n",
            b"\r\n\r\n\r\n",
            b"abc\r\n\r\ndef\r\n\r\r\n\r\n",
            b"\n\n\r\r\n\n\r\n\r",
            b"",
        ];
        for sample in samples {
            let mut s = BoundaryScanner::new();
            assert_eq!(s.feed(sample), reference_count(sample), "{:?}", sample);
        }
    }

    #[test]
    fn test_reset() {
        let mut s = BoundaryScanner::new();
        s.feed(b"\r\n\r");
        assert_eq!(s.partial(), 3);
        s.reset();
        assert_eq!(s.feed(b"\n"), 0);
    }
}
