use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Pair of a handle and the future the gRPC server waits on. The server stops once the handle is
/// triggered or dropped.
pub(crate) fn shutdown_signal() -> (RpcServerShutdownHandle, RpcServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (RpcServerShutdownHandle { tx }, RpcServerShutdownSignal { rx })
}

pub(crate) struct RpcServerShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl RpcServerShutdownHandle {
    pub(crate) fn trigger(self) {
        let _ = self.tx.send(());
    }
}

pub(crate) struct RpcServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for RpcServerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, both mean stop.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn dropping_handle_fires_signal() {
        let (handle, signal) = shutdown_signal();
        drop(handle);

        assert!(timeout(Duration::from_secs(1), signal).await.is_ok());
    }

    #[tokio::test]
    async fn signal_waits_for_trigger() {
        let (handle, signal) = shutdown_signal();
        let mut signal = Box::pin(signal);

        assert!(timeout(Duration::from_millis(20), &mut signal).await.is_err());
        handle.trigger();
        assert!(timeout(Duration::from_secs(1), &mut signal).await.is_ok());
    }
}
