use crate::{
    connection::{Connection, Connector, TcpConnector},
    AsyncDevice, Frame, Result,
};
use async_trait::async_trait;
use log::debug;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Frames larger than this are rejected by `read_frame`.
pub const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

/// The LED matrix server speaking the length prefixed protocol.
///
/// Every frame goes out as two writes on the same stream: the PNG size as a
/// big endian `u64`, then the PNG itself. The display never answers.
#[derive(Debug)]
pub struct TcpDisplay<C: Connector = TcpConnector> {
    connection: Connection<C>,
}

impl TcpDisplay {
    pub fn new(hostport: impl Into<String>) -> Self {
        Self::from_connection(Connection::new(hostport))
    }
}

impl<C: Connector> TcpDisplay<C> {
    pub fn from_connection(connection: Connection<C>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection<C> {
        &self.connection
    }
}

#[async_trait]
impl<C: Connector> AsyncDevice for TcpDisplay<C> {
    async fn draw(&mut self, frame: &Frame) -> Result<()> {
        self.connection.write_all(&frame.header()).await?;
        self.connection.write_all(frame.as_bytes()).await?;
        debug!(
            "Sent {} byte frame to {}",
            frame.len(),
            self.connection.hostport()
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.connection.close().await
    }
}

/// Reads the next frame written by a `TcpDisplay`.
///
/// Returns `Ok(None)` once the sender hung up between two frames. Hanging up
/// anywhere inside a frame, header included, is an `UnexpectedEof` error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut header = [0u8; 8];
    if reader.read(&mut header[..1]).await? == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[1..]).await?;

    let len = u64::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
        ));
    }

    let len = usize::try_from(len).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut png = vec![0u8; len];
    reader.read_exact(&mut png).await?;
    Ok(Some(Frame::from_png(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        marker::PhantomData,
        pin::Pin,
        sync::{Arc, Mutex},
        task::{Context, Poll},
    };
    use tokio::io::{duplex, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

    /// A stream that may move between threads but never be shared, like
    /// most TLS or serial transports.
    struct Unshared {
        inner: DuplexStream,
        _not_sync: PhantomData<Cell<()>>,
    }

    impl AsyncRead for Unshared {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for Unshared {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    /// Hands out a single in-memory pipe and keeps the far end.
    #[derive(Default)]
    struct Loopback {
        peer: Arc<Mutex<Option<DuplexStream>>>,
    }

    #[async_trait]
    impl Connector for Loopback {
        type Stream = Unshared;

        async fn connect(&self, _hostport: &str) -> io::Result<Unshared> {
            let (ours, theirs) = duplex(64 * 1024);
            *self.peer.lock().unwrap() = Some(theirs);
            Ok(Unshared {
                inner: ours,
                _not_sync: PhantomData,
            })
        }
    }

    #[tokio::test]
    async fn draws_from_a_spawned_task_over_an_unshared_stream() {
        let connector = Loopback::default();
        let peer = connector.peer.clone();
        let mut display =
            TcpDisplay::from_connection(Connection::with_connector("loopback", connector));
        let frame = Frame::blank().unwrap();
        let expected = frame.clone();

        tokio::spawn(async move { display.draw(&frame).await })
            .await
            .unwrap()
            .unwrap();

        let mut peer = peer.lock().unwrap().take().unwrap();
        let received = read_frame(&mut peer).await.unwrap().unwrap();
        assert_eq!(received.as_bytes(), expected.as_bytes());
    }

    #[tokio::test]
    async fn rejects_oversized_frames() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();

        let err = read_frame(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn hang_up_between_frames_is_not_an_error() {
        let (tx, mut rx) = duplex(64);
        drop(tx);
        assert!(read_frame(&mut rx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hang_up_inside_the_header_is_an_error() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&[0, 0, 1]).await.unwrap();
        drop(tx);

        let err = read_frame(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn hang_up_inside_the_image_is_an_error() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(&16u64.to_be_bytes()).await.unwrap();
        tx.write_all(b"short").await.unwrap();
        drop(tx);

        let err = read_frame(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
