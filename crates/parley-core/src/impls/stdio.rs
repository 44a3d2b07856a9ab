//! StdioTransport - 改行区切り JSON（1 行 = 1 envelope）
//!
//! reader / writer はジェネリックなので、テストではバイト列を渡せます。
//!
//! # 読み取り
//! - `fill_buf` / `consume` でチャンク単位に読み、行の途中は `line` に溜める
//! - 保持するのは最大 `max_frame_bytes` バイトまで。超えた行は改行まで読み捨てて
//!   `FrameTooLarge` を返す
//! - UTF-8 でない行は `InvalidUtf8`。どちらも link は生きたまま、その行だけが捨てられる
//! - 空行は読み飛ばす

use std::mem;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::ports::{Transport, TransportError};

pub struct StdioTransport<R, W> {
    reader: R,
    writer: W,
    max_frame_bytes: usize,
    /// Bytes of the current line read so far.
    line: Vec<u8>,
    /// Length seen so far of a line that went over the limit.
    overflow: Option<usize>,
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            writer,
            max_frame_bytes,
            line: Vec::new(),
            overflow: None,
        }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Close off the current line. `Ok(None)` for a blank one.
    fn finish_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(len) = self.overflow.take() {
            self.line.clear();
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }
        let bytes = mem::take(&mut self.line);
        let len = bytes.len();
        let text = String::from_utf8(bytes).map_err(|_| TransportError::InvalidUtf8 { len })?;
        let frame = text.trim();
        if frame.is_empty() {
            Ok(None)
        } else {
            Ok(Some(frame.to_string()))
        }
    }
}

impl StdioTransport<BufReader<Stdin>, Stdout> {
    /// Process stdin/stdout.
    pub fn stdio(max_frame_bytes: usize) -> Self {
        Self::new(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            max_frame_bytes,
        )
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    // Cancel-safe: the only await is fill_buf, and a chunk is consumed in the
    // same poll that copies it into `line`.
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                if self.overflow.is_none() && self.line.is_empty() {
                    return Ok(None);
                }
                // last line without a trailing newline
                match self.finish_line()? {
                    Some(frame) => return Ok(Some(frame)),
                    None => return Ok(None),
                }
            }

            let newline = chunk.iter().position(|&b| b == b'\n');
            let part = &chunk[..newline.unwrap_or(chunk.len())];
            if let Some(seen) = self.overflow.as_mut() {
                *seen += part.len();
            } else if self.line.len() + part.len() > self.max_frame_bytes {
                self.overflow = Some(self.line.len() + part.len());
                self.line = Vec::new();
            } else {
                self.line.extend_from_slice(part);
            }
            let used = part.len() + usize::from(newline.is_some());
            self.reader.consume(used);

            if newline.is_some()
                && let Some(frame) = self.finish_line()?
            {
                return Ok(Some(frame));
            }
        }
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_one_frame_per_line_skipping_blanks() {
        let input: &[u8] = b"{\"kind\":\"shutdown\"}\r\n\n   \n{\"kind\":\"invoke\"}";
        let mut transport = StdioTransport::new(input, Vec::new(), 1024);

        assert_eq!(
            transport.recv().await.unwrap().as_deref(),
            Some(r#"{"kind":"shutdown"}"#)
        );
        assert_eq!(
            transport.recv().await.unwrap().as_deref(),
            Some(r#"{"kind":"invoke"}"#)
        );
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lines_spanning_many_chunks_are_joined() {
        let input: &[u8] = b"{\"kind\":\"shutdown\"}\n{}\n";
        let reader = BufReader::with_capacity(3, input);
        let mut transport = StdioTransport::new(reader, Vec::new(), 1024);

        assert_eq!(
            transport.recv().await.unwrap().as_deref(),
            Some(r#"{"kind":"shutdown"}"#)
        );
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{}"));
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_reported_and_skipped() {
        let input: &[u8] = b"0123456789abcdef\n{}\n";
        let mut transport = StdioTransport::new(input, Vec::new(), 8);

        let err = transport.recv().await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, TransportError::FrameTooLarge { len: 16, max: 8 }));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn oversized_line_is_never_held_in_memory() {
        let mut input = vec![b'x'; 4 * 1024 * 1024];
        input.extend_from_slice(b"\n{}\n");
        let reader = BufReader::with_capacity(64, input.as_slice());
        let mut transport = StdioTransport::new(reader, Vec::new(), 8);

        let err = transport.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { len, max: 8 } if len == 4 * 1024 * 1024));
        assert!(transport.line.capacity() <= 8);
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn unterminated_oversized_stream_ends_with_frame_too_large() {
        let input = vec![b'x'; 1024 * 1024];
        let reader = BufReader::with_capacity(64, input.as_slice());
        let mut transport = StdioTransport::new(reader, Vec::new(), 8);

        assert!(matches!(
            transport.recv().await,
            Err(TransportError::FrameTooLarge { max: 8, .. })
        ));
        assert!(transport.line.capacity() <= 8);
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_recoverable() {
        let input: &[u8] = b"\xff\xfe garbage\n{}\n";
        let mut transport = StdioTransport::new(input, Vec::new(), 1024);

        let err = transport.recv().await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, TransportError::InvalidUtf8 { len: 10 }));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn writes_newline_terminated_frames() {
        let input: &[u8] = b"";
        let mut transport = StdioTransport::new(input, Vec::new(), 1024);
        transport.send(r#"{"kind":"ready"}"#.into()).await.unwrap();
        transport.send(r#"{"kind":"shutdown"}"#.into()).await.unwrap();

        let (_, written) = transport.into_parts();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "{\"kind\":\"ready\"}\n{\"kind\":\"shutdown\"}\n"
        );
    }
}
