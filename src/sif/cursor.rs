use std::io::{BufRead, Read, Seek, SeekFrom};

use crate::error::{Result, SifError};

// ---------------------------------------------------------------------------
// Mark – a position the cursor may rewind to
// ---------------------------------------------------------------------------

/// Byte position recorded by [`TokenCursor::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark(u64);

impl Mark {
    pub fn offset(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// TokenCursor – forward-only tokenizer over the header
// ---------------------------------------------------------------------------

/// Sequential reader over the hybrid text/binary header.
///
/// The cursor only moves forward. The single exception is [`rewind`], which
/// returns to a [`Mark`] taken earlier; it is how optional tokens are probed.
///
/// [`rewind`]: TokenCursor::rewind
pub struct TokenCursor<R> {
    inner: R,
}

impl<R: BufRead + Seek> TokenCursor<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current byte offset from the start of the stream.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn mark(&mut self) -> Result<Mark> {
        self.position().map(Mark)
    }

    pub fn rewind(&mut self, mark: Mark) -> Result<()> {
        self.inner.seek(SeekFrom::Start(mark.0))?;
        Ok(())
    }

    /// Next byte without consuming it; `None` at end of stream.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.inner.fill_buf()?.first().copied())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.inner.consume(1);
        }
        Ok(byte)
    }

    /// Read exactly `n` raw bytes. The buffer only grows with bytes actually
    /// present, so a corrupt length cannot force a huge allocation.
    pub fn read_fixed(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut buf = Vec::new();
        self.inner.by_ref().take(n as u64).read_to_end(&mut buf)?;
        if buf.len() < n {
            return Err(SifError::format(
                offset,
                format!("expected {n} bytes, stream ended early"),
            ));
        }
        Ok(buf)
    }

    /// Read exactly `n` bytes as (lossy UTF-8) text.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_fixed(n)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.read_fixed(n).map(drop)
    }

    /// Read up to the next `\n` (consumed, not returned). An empty vector at
    /// end of stream.
    pub fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        self.inner.read_until(b'\n', &mut line)?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(line)
    }

    pub fn skip_line(&mut self) -> Result<()> {
        self.read_line().map(drop)
    }

    pub fn skip_lines(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.skip_line()?;
        }
        Ok(())
    }

    /// A decimal length on its own line, followed by that many raw bytes.
    pub fn read_length_prefixed(&mut self) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let line = self.read_line()?;
        let len: usize = parse_number(&line, offset, "length prefix")?;
        self.read_fixed(len)
    }

    /// Accumulate bytes until `terminator` or a line end. Leading terminators
    /// and line ends are skipped; the closing one is consumed.
    pub fn read_word(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut word = Vec::new();
        loop {
            match self.next_byte()? {
                Some(b) if b == terminator || b == b'\n' => {
                    if !word.is_empty() {
                        return Ok(word);
                    }
                }
                Some(b) => word.push(b),
                None if !word.is_empty() => return Ok(word),
                None => {
                    return Err(SifError::format(
                        offset,
                        "expected a token, stream ended early",
                    ))
                }
            }
        }
    }

    pub fn skip_word(&mut self) -> Result<()> {
        self.read_word(b' ').map(drop)
    }

    pub fn skip_words(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.skip_word()?;
        }
        Ok(())
    }

    pub fn read_int(&mut self) -> Result<i64> {
        let offset = self.position()?;
        let word = self.read_word(b' ')?;
        parse_number(&word, offset, "integer")
    }

    pub fn read_float(&mut self) -> Result<f64> {
        let offset = self.position()?;
        let word = self.read_word(b' ')?;
        parse_number(&word, offset, "float")
    }

    /// Consume spaces and line ends up to the next other byte (or the end).
    pub fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b) = self.peek_byte()? {
            if b != b' ' && b != b'\n' {
                break;
            }
            self.inner.consume(1);
        }
        Ok(())
    }
}

/// Parse a token as a number, ignoring surrounding whitespace.
pub(crate) fn parse_number<T: std::str::FromStr>(bytes: &[u8], offset: u64, what: &str) -> Result<T> {
    let text = std::str::from_utf8(bytes).map(str::trim).map_err(|_| {
        SifError::format(offset, format!("expected {what}, found non-UTF-8 bytes"))
    })?;
    text.parse::<T>()
        .map_err(|_| SifError::format(offset, format!("expected {what}, found {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(bytes: &[u8]) -> TokenCursor<Cursor<Vec<u8>>> {
        TokenCursor::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn words_skip_leading_separators() {
        let mut c = cursor(b"  65567 \n 0 12.5\nrest");
        assert_eq!(c.read_int().unwrap(), 65567);
        assert_eq!(c.read_int().unwrap(), 0);
        assert_eq!(c.read_float().unwrap(), 12.5);
        assert_eq!(c.read_line().unwrap(), b"rest");
    }

    #[test]
    fn word_with_custom_terminator_keeps_spaces() {
        let mut c = cursor(b"0 0 1\nnext");
        assert_eq!(c.read_word(b'\n').unwrap(), b"0 0 1");
        assert_eq!(c.read_line().unwrap(), b"next");
    }

    #[test]
    fn non_numeric_token_is_a_format_error() {
        let mut c = cursor(b"abc ");
        let err = c.read_int().unwrap_err();
        assert!(matches!(err, SifError::Format { offset: 0, .. }), "{err}");
    }

    #[test]
    fn read_fixed_past_end_is_a_format_error() {
        let mut c = cursor(b"short");
        assert!(matches!(c.read_fixed(10), Err(SifError::Format { .. })));
    }

    #[test]
    fn length_prefixed_reads_raw_bytes() {
        let mut c = cursor(b"5\nab\ncd7\n");
        assert_eq!(c.read_length_prefixed().unwrap(), b"ab\ncd");
        assert_eq!(c.read_int().unwrap(), 7);
    }

    #[test]
    fn oversized_length_prefix_is_a_format_error() {
        let mut c = cursor(b"18446744073709551615\nabc");
        assert!(matches!(
            c.read_length_prefixed(),
            Err(SifError::Format { offset: 21, .. })
        ));
    }

    #[test]
    fn rewind_returns_to_mark() {
        let mut c = cursor(b"12\n34\n");
        let mark = c.mark().unwrap();
        c.skip_lines(2).unwrap();
        assert_eq!(c.peek_byte().unwrap(), None);
        c.rewind(mark).unwrap();
        assert_eq!(c.peek_byte().unwrap(), Some(b'1'));
        assert_eq!(mark.offset(), 0);
    }

    #[test]
    fn word_at_end_of_stream() {
        let mut c = cursor(b"  42");
        assert_eq!(c.read_int().unwrap(), 42);
        assert!(matches!(c.read_word(b' '), Err(SifError::Format { .. })));
    }

    #[test]
    fn skip_whitespace_stops_before_data() {
        let mut c = cursor(b" \n \nX");
        c.skip_whitespace().unwrap();
        assert_eq!(c.position().unwrap(), 4);
    }
}
