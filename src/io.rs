use crate::{IngestError, IngestResult};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;

use crate::codec::CharsetDecoder;

/// What we know about an input before reading it.
#[derive(Debug, Clone)]
pub struct InputMeta {
    /// e.g. "application/gzip" or "text/csv"
    pub content_type: String,
    /// e.g. "gzip", "zstd" or empty
    pub content_encoding: String,
    /// file name, used for extension fallback and in the run report
    pub name_hint: String,
    /// Character encoding of the raw bytes (defaults to UTF-8)
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for InputMeta {
    fn default() -> Self {
        Self {
            content_type: String::new(),
            content_encoding: String::new(),
            name_hint: String::new(),
            charset: encoding_rs::UTF_8,
        }
    }
}

impl InputMeta {
    fn is_gzip(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        let ct = self.content_type.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "gzip")
            || matches!(ct.as_str(), "application/gzip" | "application/x-gzip")
            || self.name_hint.ends_with(".gz")
    }

    fn is_zstd(&self) -> bool {
        let ce = self.content_encoding.to_ascii_lowercase();
        ce.split(',').any(|s| s.trim() == "zstd")
            || self.content_type.eq_ignore_ascii_case("application/zstd")
            || self.name_hint.ends_with(".zst")
    }
}

/// Resolve a charset label such as `latin1` or `windows-1252`.
pub fn charset_for_label(label: &str) -> IngestResult<&'static encoding_rs::Encoding> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| IngestError::UnknownCharset(label.to_string()))
}

/// Wrap a raw reader with decompression and UTF-8 transcoding as `meta` asks.
pub fn build_input_reader<R>(raw: R, meta: &InputMeta) -> Box<dyn AsyncRead + Unpin + Send>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = BufReader::with_capacity(1 << 16, raw);
    let decompressed: Box<dyn AsyncRead + Unpin + Send> = if meta.is_gzip() {
        Box::new(GzipDecoder::new(buf))
    } else if meta.is_zstd() {
        Box::new(ZstdDecoder::new(buf))
    } else {
        Box::new(buf)
    };

    if meta.charset == encoding_rs::UTF_8 {
        return decompressed;
    }

    let framed = FramedRead::new(decompressed, CharsetDecoder::new(meta.charset));
    Box::new(StreamReader::new(framed))
}

/// Open a local inventory export; compression is inferred from the extension.
pub async fn reader_from_path(
    path: &Path,
    charset: &'static encoding_rs::Encoding,
) -> IngestResult<(Box<dyn AsyncRead + Unpin + Send>, InputMeta)> {
    let file = File::open(path).await?;
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let mut meta = InputMeta {
        name_hint: name,
        charset,
        ..Default::default()
    };

    match path.extension().and_then(|s| s.to_str()).unwrap_or_default() {
        "gz" => {
            meta.content_type = "application/gzip".into();
            meta.content_encoding = "gzip".into();
        }
        "zst" => {
            meta.content_type = "application/zstd".into();
            meta.content_encoding = "zstd".into();
        }
        _ => meta.content_type = "text/csv".into(),
    }

    tracing::debug!(
        file = %meta.name_hint,
        content_type = %meta.content_type,
        charset = meta.charset.name(),
        "opened input"
    );
    Ok((build_input_reader(file, &meta), meta))
}
