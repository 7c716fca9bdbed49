use crate::pipeline::DecisionPipeline;
use policy_codec::FRAME_TERMINATOR;
use policy_lifecycle::{Activity, ShutdownSubscription};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Accepts TCP connections and dispatches each framed inquiry on them to
/// a [`DecisionPipeline`].
pub struct ConnectionServer {
    listener: TcpListener,
    pipeline: Arc<DecisionPipeline>,
}

impl ConnectionServer {
    pub async fn bind(addr: SocketAddr, pipeline: Arc<DecisionPipeline>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| anyhow::anyhow!("failed to bind {addr}: {err}"))?;
        tracing::info!(%addr, "policy server listening");
        Ok(Self { listener, pipeline })
    }

    /// Runs the accept loop until `shutdown` fires. Transient accept
    /// errors pause briefly and retry rather than tearing down the
    /// server; a bind failure is handled by [`Self::bind`] instead, since
    /// that one is fatal to startup.
    pub async fn run(&self, mut shutdown: ShutdownSubscription) {
        loop {
            tokio::select! {
                _ = shutdown.shutting_down() => {
                    tracing::info!("connection server shutting down, no longer accepting");
                    return;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let pipeline = Arc::clone(&self.pipeline);
                            let conn_shutdown = ShutdownSubscription::get();
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(stream, pipeline, conn_shutdown).await {
                                    tracing::debug!(%peer, error = %err, "connection closed");
                                }
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed, retrying shortly");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }
}

/// Reads one connection's byte stream, splitting it into inquiries on
/// `\n\n`, running each through the pipeline, and writing the response
/// back before reading the next inquiry. Inquiries on one connection are
/// therefore answered strictly in the order they were received.
async fn handle_connection(
    mut stream: TcpStream,
    pipeline: Arc<DecisionPipeline>,
    mut shutdown: ShutdownSubscription,
) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        while let Some(pos) = find_terminator(&buf) {
            let block = buf.drain(..pos + FRAME_TERMINATOR.len()).collect::<Vec<u8>>();
            let block = std::str::from_utf8(&block[..block.len() - FRAME_TERMINATOR.len()])
                .map_err(|err| anyhow::anyhow!("non-utf8 inquiry: {err}"))?;

            // Hold an Activity token for the duration of handling this
            // one inquiry so a shutdown in progress waits for it.
            let _activity = Activity::get_opt();
            let response = pipeline.handle(block).await;
            stream.write_all(response.as_bytes()).await?;
        }

        tokio::select! {
            _ = shutdown.shutting_down() => {
                return Ok(());
            }
            read = stream.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    return Ok(());
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_TERMINATOR.len())
        .position(|window| window == FRAME_TERMINATOR)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_terminator_position() {
        assert_eq!(find_terminator(b"a=b\n\n"), Some(3));
        assert_eq!(find_terminator(b"a=b\n"), None);
        assert_eq!(find_terminator(b""), None);
    }

    #[test]
    fn finds_first_terminator_when_multiple_frames_buffered() {
        assert_eq!(find_terminator(b"a=b\n\nc=d\n\n"), Some(3));
    }
}
