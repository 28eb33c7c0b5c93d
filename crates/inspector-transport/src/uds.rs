use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use inspector_wire::{EnvelopeCodec, FrameConfig};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{
    BoxFuture, Connector, Target, TransportEvent, TransportHandle, TransportListener,
};

/// Connects to an endpoint listening on a Unix domain socket.
///
/// Every envelope travels as one length-prefixed frame. Each connection gets
/// a reader task and a writer task on the ambient tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct UnixSocketConnector {
    frame_config: FrameConfig,
}

impl UnixSocketConnector {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_config(frame_config: FrameConfig) -> Self {
        Self { frame_config }
    }

    /// Connect to `path` and start the I/O tasks.
    pub async fn connect_path(
        &self,
        path: impl AsRef<Path>,
        listener: Arc<dyn TransportListener>,
    ) -> Result<UnixSocketHandle> {
        let path = path.as_ref().to_path_buf();
        validate_path_len(&path, Self::MAX_PATH_LEN)?;

        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| TransportError::Connect {
                target: path.display().to_string(),
                source,
            })?;
        debug!(?path, "connected to unix domain socket");

        Ok(UnixSocketHandle::start(
            stream,
            EnvelopeCodec::new(self.frame_config.clone()),
            listener,
        ))
    }
}

impl Connector for UnixSocketConnector {
    fn connect(
        &self,
        target: &Target,
        listener: Arc<dyn TransportListener>,
    ) -> BoxFuture<'static, Result<Box<dyn TransportHandle>>> {
        let connector = self.clone();
        let path = PathBuf::from(target.as_str());
        Box::pin(async move {
            let handle = connector.connect_path(path, listener).await?;
            Ok(Box::new(handle) as Box<dyn TransportHandle>)
        })
    }
}

fn validate_path_len(path: &Path, max: usize) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= max {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max,
        });
    }
    Ok(())
}

/// Live unix socket channel.
pub struct UnixSocketHandle {
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl UnixSocketHandle {
    fn start(
        stream: UnixStream,
        codec: EnvelopeCodec,
        listener: Arc<dyn TransportListener>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let closed = Arc::new(AtomicBool::new(false));

        let mut frames_in = FramedRead::new(read_half, codec.clone());
        let reader_listener = listener.clone();
        let reader_closed = closed.clone();
        let reader = tokio::spawn(async move {
            while let Some(next) = frames_in.next().await {
                match next {
                    Ok(payload) => reader_listener.on_event(TransportEvent::Message(payload)),
                    Err(err) => {
                        warn!(error = %err, "inbound frame rejected; closing channel");
                        reader_listener.on_event(TransportEvent::Error(err.into()));
                        break;
                    }
                }
            }
            notify_closed(&reader_closed, reader_listener.as_ref());
        });

        let mut frames_out = FramedWrite::new(write_half, codec);
        let writer_closed = closed.clone();
        let writer = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(err) = frames_out.send(payload).await {
                    warn!(error = %err, "outbound frame failed; closing channel");
                    listener.on_event(TransportEvent::Error(err.into()));
                    notify_closed(&writer_closed, listener.as_ref());
                    break;
                }
            }
        });

        Self {
            outbound: Some(tx),
            reader,
            writer,
            closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn notify_closed(closed: &AtomicBool, listener: &dyn TransportListener) {
    if !closed.swap(true, Ordering::SeqCst) {
        debug!("unix socket channel closed by remote");
        listener.on_event(TransportEvent::Closed);
    }
}

impl TransportHandle for UnixSocketHandle {
    fn send(&mut self, payload: Bytes) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        let outbound = self.outbound.as_ref().ok_or(TransportError::Shutdown)?;
        outbound
            .send(payload)
            .map_err(|_| TransportError::Shutdown)
    }

    fn close(&mut self) {
        // Mark closed first so the aborted tasks never report a remote close.
        self.closed.store(true, Ordering::SeqCst);
        self.outbound = None;
        self.reader.abort();
        self.writer.abort();
    }

    fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }
}

impl Drop for UnixSocketHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use inspector_wire::{decode_frame, encode_frame, DEFAULT_MAX_PAYLOAD};
    use parking_lot::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        notify: tokio::sync::Notify,
    }

    impl TransportListener for Recorder {
        fn on_event(&self, event: TransportEvent) {
            let entry = match event {
                TransportEvent::Message(payload) => {
                    format!("message:{}", String::from_utf8_lossy(&payload))
                }
                TransportEvent::Closed => "closed".to_string(),
                TransportEvent::Error(err) => format!("error:{err}"),
            };
            self.events.lock().push(entry);
            self.notify.notify_one();
        }
    }

    impl Recorder {
        async fn wait_for(&self, count: usize) -> Vec<String> {
            loop {
                {
                    let events = self.events.lock();
                    if events.len() >= count {
                        return events.clone();
                    }
                }
                self.notify.notified().await;
            }
        }
    }

    fn temp_socket_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "insp-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("endpoint.sock")
    }

    #[tokio::test]
    async fn sends_and_receives_framed_envelopes() {
        let path = temp_socket_path("roundtrip");
        let endpoint = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = endpoint.accept().await.unwrap();
            let mut buf = BytesMut::new();
            let payload = loop {
                if let Some(payload) = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap() {
                    break payload;
                }
                let mut chunk = [0u8; 256];
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            };
            let mut reply = BytesMut::new();
            encode_frame(&payload, &mut reply).unwrap();
            stream.write_all(&reply).await.unwrap();
        });

        let recorder = Arc::new(Recorder::default());
        let mut handle = UnixSocketConnector::new()
            .connect_path(&path, recorder.clone())
            .await
            .unwrap();
        handle
            .send(Bytes::from_static(br#"{"id":1,"result":{}}"#))
            .unwrap();

        let events = recorder.wait_for(2).await;
        assert_eq!(events[0], r#"message:{"id":1,"result":{}}"#);
        assert_eq!(events[1], "closed");
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(Bytes::from_static(b"{}")),
            Err(TransportError::Shutdown)
        ));

        server.await.unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn garbage_from_endpoint_reports_error_then_close() {
        let path = temp_socket_path("garbage");
        let endpoint = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = endpoint.accept().await.unwrap();
            stream.write_all(&[0xFF; 8]).await.unwrap();
            // Hold the stream open until the client gives up on it.
            let mut sink = [0u8; 8];
            let _ = stream.read(&mut sink).await;
        });

        let recorder = Arc::new(Recorder::default());
        let mut handle = UnixSocketConnector::new()
            .connect_path(&path, recorder.clone())
            .await
            .unwrap();

        let events = recorder.wait_for(2).await;
        assert!(events[0].starts_with("error:"));
        assert_eq!(events[1], "closed");

        handle.close();
        server.await.unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let path = temp_socket_path("missing");
        let recorder = Arc::new(Recorder::default());

        let result = UnixSocketConnector::new()
            .connect(&Target::new(path.display().to_string()), recorder)
            .await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_path_too_long() {
        let long_path = PathBuf::from("/tmp/".to_string() + &"a".repeat(200) + ".sock");
        let result = validate_path_len(&long_path, UnixSocketConnector::MAX_PATH_LEN);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }
}
