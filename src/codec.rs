use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Frame decoder that turns bytes in a legacy charset into UTF-8 chunks.
///
/// Spreadsheet tools on the front desk machines export `windows-1252` by
/// default, so stock lists rarely arrive as UTF-8.
pub struct CharsetDecoder {
    inner: encoding_rs::Decoder,
}

impl CharsetDecoder {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            inner: encoding.new_decoder(),
        }
    }

    /// Decode as much of `src` as possible; returns `(consumed, utf8)`.
    fn convert(&mut self, src: &[u8], last: bool) -> (usize, Vec<u8>) {
        let capacity = if last {
            self.inner.max_utf8_buffer_length(src.len())
        } else {
            self.inner
                .max_utf8_buffer_length_without_replacement(src.len())
        }
        .unwrap_or(src.len() * 3);

        let mut out = vec![0; capacity];
        let (_, read, written, _) = self.inner.decode_to_utf8(src, &mut out, last);
        out.truncate(written);
        (read, out)
    }
}

impl Decoder for CharsetDecoder {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let (read, out) = self.convert(&src[..], false);
        if read == 0 && out.is_empty() {
            // incomplete multi-byte sequence, wait for more input
            return Ok(None);
        }

        src.advance(read);
        Ok(Some(BytesMut::from(&out[..])))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let (_, out) = self.convert(&src[..], true);
        src.clear();

        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(BytesMut::from(&out[..])))
        }
    }
}
