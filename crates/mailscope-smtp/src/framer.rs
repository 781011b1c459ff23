//! Line framing over arbitrary chunk boundaries.
//!
//! TCP delivers byte chunks with no alignment to protocol lines. The framer
//! carries the unterminated tail of each direction across chunk boundaries
//! so that downstream parsers only ever see complete lines. Framing is
//! chunk-boundary invariant: any split of the same byte stream yields the
//! same sequence of lines.

use bytes::{Buf, BytesMut};

/// The SMTP line terminator.
pub const CR_LF: &[u8] = b"\r\n";

/// Splits one direction of a byte stream into CRLF-terminated lines.
///
/// One framer instance serves one direction of one connection. There is no
/// bound on residual growth here; bounding excessively long unterminated
/// input is the host's concern (see [`LineFramer::residual_len`]).
#[derive(Debug, Default)]
pub struct LineFramer {
    residual: BytesMut,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every complete line.
    ///
    /// The CRLF terminator is stripped from each returned line. Bytes after
    /// the last terminator stay buffered until a later chunk completes them.
    /// A lone `\n` does not terminate a line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.residual.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(index) = find_crlf(&self.residual) {
            let line = self.residual.split_to(index);
            self.residual.advance(CR_LF.len());
            lines.push(line.to_vec());
        }
        lines
    }

    /// Number of bytes buffered without a terminator.
    #[must_use]
    pub fn residual_len(&self) -> usize {
        self.residual.len()
    }
}

fn find_crlf(buffer: &[u8]) -> Option<usize> {
    buffer.windows(CR_LF.len()).position(|window| window == CR_LF)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"220 smtp.example.com ESMTP\r\n");
        assert_eq!(lines, vec![b"220 smtp.example.com ESMTP".to_vec()]);
        assert_eq!(framer.residual_len(), 0);
    }

    #[test]
    fn test_partial_line_is_buffered() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"MAIL FROM:<a@exam").is_empty());
        assert_eq!(framer.residual_len(), 17);
        let lines = framer.push(b"ple.com>\r\n");
        assert_eq!(lines, vec![b"MAIL FROM:<a@example.com>".to_vec()]);
        assert_eq!(framer.residual_len(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"250-ok\r\n250-PIPELINING\r\n250 SIZE\r\ntail");
        assert_eq!(
            lines,
            vec![b"250-ok".to_vec(), b"250-PIPELINING".to_vec(), b"250 SIZE".to_vec()]
        );
        assert_eq!(framer.residual_len(), 4);
    }

    #[test]
    fn test_terminator_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"QUIT\r").is_empty());
        let lines = framer.push(b"\n");
        assert_eq!(lines, vec![b"QUIT".to_vec()]);
    }

    #[test]
    fn test_bare_lf_does_not_terminate() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"NOOP\n").is_empty());
        let lines = framer.push(b"\r\n");
        assert_eq!(lines, vec![b"NOOP\n".to_vec()]);
    }

    #[test]
    fn test_empty_line_is_emitted() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"\r\n");
        assert_eq!(lines, vec![Vec::<u8>::new()]);
    }

    #[test]
    fn test_long_unterminated_input_just_buffers() {
        let mut framer = LineFramer::new();
        let chunk = vec![b'x'; 64 * 1024];
        for _ in 0..8 {
            assert!(framer.push(&chunk).is_empty());
        }
        assert_eq!(framer.residual_len(), 8 * 64 * 1024);
    }

    fn frame_with_splits(stream: &[u8], mut splits: Vec<usize>) -> Vec<Vec<u8>> {
        splits.sort_unstable();
        splits.dedup();
        let mut framer = LineFramer::new();
        let mut lines = Vec::new();
        let mut start = 0;
        for split in splits.into_iter().chain(std::iter::once(stream.len())) {
            let split = split.min(stream.len());
            if split > start {
                lines.extend(framer.push(&stream[start..split]));
                start = split;
            }
        }
        lines
    }

    proptest! {
        #[test]
        fn test_framing_is_chunk_boundary_invariant(
            splits in prop::collection::vec(0usize..64, 0..12)
        ) {
            let stream: &[u8] =
                b"EHLO a\r\nMAIL FROM:<a@b>\r\nRCPT TO:<c@d>\r\nDATA\r\nhi\r\n.\r\nQUIT\r\n";
            let expected = frame_with_splits(stream, vec![]);
            let actual = frame_with_splits(stream, splits);
            prop_assert_eq!(actual, expected);
        }
    }
}
