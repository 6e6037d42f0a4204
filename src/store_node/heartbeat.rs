use crate::model::Region;
use crate::pd::{ControlPlaneClient, ControlPlaneError, HeartbeatResponse, RegionHeartbeatStream, StoreStats};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// A report a store node hands to its heartbeat worker.
#[derive(Debug)]
pub enum Outbound {
    Store(StoreStats),
    Region(Region),
}

/// HeartbeatWorker owns one store's connection to the control plane: it forwards reports, and
/// routes region heartbeat responses back to the node. A broken stream is reopened with
/// exponential backoff while reports keep queueing.
pub struct HeartbeatWorker {
    logger: slog::Logger,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    responses: mpsc::UnboundedSender<HeartbeatResponse>,
}

enum StreamEnd {
    // Stop for good.
    Exit,
    Reopen,
}

impl HeartbeatWorker {
    pub(crate) fn new(
        logger: slog::Logger,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        responses: mpsc::UnboundedSender<HeartbeatResponse>,
    ) -> Self {
        HeartbeatWorker {
            logger,
            outbound,
            responses,
        }
    }

    /// Runs until `cancel` fires or the node is dropped.
    pub async fn run(mut self, client: Arc<dyn ControlPlaneClient>, cancel: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let opened = tokio::select! {
                _ = cancel.cancelled() => return,
                opened = client.region_heartbeat() => opened,
            };
            match opened {
                Ok(stream) => {
                    backoff = INITIAL_BACKOFF;
                    if let StreamEnd::Exit = self.pump(client.as_ref(), stream, &cancel).await {
                        return;
                    }
                }
                Err(e) => slog::warn!(self.logger, "Failed to open region heartbeat stream: {}", e),
            }

            slog::debug!(self.logger, "Reopening region heartbeat stream in {:?}", backoff);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn pump(
        &mut self,
        client: &dyn ControlPlaneClient,
        mut stream: RegionHeartbeatStream,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return StreamEnd::Exit,
                message = self.outbound.recv() => match message {
                    None => return StreamEnd::Exit,
                    Some(Outbound::Store(stats)) => {
                        if let Err(e) = client.store_heartbeat(&stats).await {
                            slog::warn!(self.logger, "Store heartbeat failed: {}", e);
                        }
                    }
                    Some(Outbound::Region(region)) => {
                        if stream.requests.send(region).is_err() {
                            slog::warn!(self.logger, "Region heartbeat stream is closed");
                            return StreamEnd::Reopen;
                        }
                    }
                },
                response = stream.responses.recv() => match response {
                    Some(Ok(response)) => {
                        if self.responses.send(response).is_err() {
                            return StreamEnd::Exit;
                        }
                    }
                    Some(Err(e @ ControlPlaneError::Malformed(_))) => {
                        slog::warn!(self.logger, "Ignoring heartbeat response: {}", e);
                    }
                    Some(Err(e)) => {
                        slog::warn!(self.logger, "Region heartbeat stream failed: {}", e);
                        return StreamEnd::Reopen;
                    }
                    None => return StreamEnd::Reopen,
                },
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn outbound_mut(&mut self) -> &mut mpsc::UnboundedReceiver<Outbound> {
        &mut self.outbound
    }

    #[cfg(test)]
    pub(crate) fn response_sender(&self) -> &mpsc::UnboundedSender<HeartbeatResponse> {
        &self.responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Peer, PeerId, RegionEpoch, RegionId, Store, StoreId};
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    type ServerSide = (
        mpsc::UnboundedReceiver<Region>,
        mpsc::UnboundedSender<Result<HeartbeatResponse, ControlPlaneError>>,
    );

    #[derive(Default)]
    struct MockClient {
        opened: AtomicUsize,
        streams: Mutex<VecDeque<ServerSide>>,
    }

    #[async_trait::async_trait]
    impl ControlPlaneClient for MockClient {
        async fn get_cluster_id(&self) -> Result<u64, ControlPlaneError> {
            Ok(1)
        }

        async fn alloc_id(&self) -> Result<u64, ControlPlaneError> {
            Ok(1)
        }

        async fn bootstrap(&self, _: &Store, _: &Region, _: u64) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn put_store(&self, _: &Store) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn store_heartbeat(&self, _: &StoreStats) -> Result<(), ControlPlaneError> {
            Ok(())
        }

        async fn region_heartbeat(&self) -> Result<RegionHeartbeatStream, ControlPlaneError> {
            let (request_tx, request_rx) = mpsc::unbounded_channel();
            let (response_tx, response_rx) = mpsc::unbounded_channel();
            self.streams.lock().unwrap().push_back((request_rx, response_tx));
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(RegionHeartbeatStream {
                requests: request_tx,
                responses: response_rx,
            })
        }
    }

    impl MockClient {
        async fn wait_for_streams(&self, count: usize) {
            timeout(Duration::from_secs(5), async {
                while self.opened.load(Ordering::SeqCst) < count {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("Stream was never opened");
        }

        fn take_stream(&self) -> ServerSide {
            self.streams.lock().unwrap().pop_front().expect("No open stream")
        }
    }

    fn region() -> Region {
        Region::new(
            RegionId::new(1),
            Bytes::new(),
            Bytes::new(),
            vec![Peer::voter(PeerId::new(2), StoreId::new(1))],
            RegionEpoch::new(1, 1),
        )
    }

    fn start() -> (
        Arc<MockClient>,
        mpsc::UnboundedSender<Outbound>,
        mpsc::UnboundedReceiver<HeartbeatResponse>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let worker = HeartbeatWorker::new(logger, outbound_rx, response_tx);
        let client = Arc::new(MockClient::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(client.clone(), cancel.clone()));

        (client, outbound_tx, response_rx, cancel, handle)
    }

    #[tokio::test]
    async fn reports_and_responses_flow_both_ways() {
        // -- setup --
        let (client, outbound, mut responses, cancel, handle) = start();
        client.wait_for_streams(1).await;
        let (mut requests, replies) = client.take_stream();

        // -- execute --
        outbound.send(Outbound::Region(region())).unwrap();
        let received = timeout(Duration::from_secs(5), requests.recv()).await.unwrap().unwrap();
        replies
            .send(Ok(HeartbeatResponse {
                region_id: received.id(),
                epoch: received.epoch(),
                operator: None,
            }))
            .unwrap();
        let response = timeout(Duration::from_secs(5), responses.recv()).await.unwrap().unwrap();

        // -- verify --
        assert_eq!(RegionId::new(1), response.region_id);
        cancel.cancel();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_stream_is_reopened() {
        // -- setup --
        let (client, outbound, _responses, cancel, handle) = start();
        client.wait_for_streams(1).await;

        // -- execute --
        let (_requests, replies) = client.take_stream();
        replies.send(Err(ControlPlaneError::StreamClosed)).unwrap();
        client.wait_for_streams(2).await;

        // -- verify --
        let (mut requests, _replies) = client.take_stream();
        outbound.send(Outbound::Region(region())).unwrap();
        let received = timeout(Duration::from_secs(5), requests.recv()).await.unwrap();
        assert!(received.is_some());

        cancel.cancel();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dropping_the_node_stops_the_worker() {
        let (client, outbound, _responses, _cancel, handle) = start();
        client.wait_for_streams(1).await;

        drop(outbound);

        assert!(timeout(Duration::from_secs(5), handle).await.is_ok());
    }
}
