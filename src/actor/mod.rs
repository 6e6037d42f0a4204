use crate::config::ControlPlaneConfig;
use crate::model::Region;
use crate::pd::{ControlPlaneError, HeartbeatResponse, StoreMeta, StoreStats};
use crate::scheduler::Cluster;
use std::error::Error;
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot};

pub(crate) fn create(
    logger: slog::Logger,
    buffer_size: usize,
    config: ControlPlaneConfig,
    cluster_id: u64,
) -> (ActorClient, ClusterActor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let client = ActorClient { sender: tx };
    let handler = ClusterActor {
        receiver: rx,
        cluster: Cluster::new(logger, config, cluster_id),
    };

    (client, handler)
}

// Every request from every connection funnels through one event loop, so the cluster view is
// only ever touched by a single task.
#[derive(Debug)]
enum Event {
    GetClusterId(Callback<u64, ControlPlaneError>),
    AllocId(u64, Callback<u64, ControlPlaneError>),
    Bootstrap(BootstrapInput, Callback<(), ControlPlaneError>),
    PutStore(u64, StoreMeta, Callback<(), ControlPlaneError>),
    StoreHeartbeat(u64, StoreStats, Callback<(), ControlPlaneError>),
    RegionHeartbeat(u64, Region, Callback<Option<HeartbeatResponse>, ControlPlaneError>),
    Summary(Callback<ClusterSummary, ControlPlaneError>),
}

#[derive(Debug)]
pub(crate) struct BootstrapInput {
    pub(crate) cluster_id: u64,
    pub(crate) store: StoreMeta,
    pub(crate) region: Region,
    pub(crate) id_floor: u64,
}

/// Point in time counters of the embedded control plane.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterSummary {
    pub stores: usize,
    pub regions: usize,
    pub running_operators: usize,
    pub finished_operators: u64,
    pub timed_out_operators: u64,
}

#[derive(Debug)]
struct Callback<O: Debug, E: Error>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Error> Callback<O, E> {
    pub fn send(self, message: Result<O, E>) {
        let _ = self.0.send(message);
    }
}

#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: mpsc::Sender<Event>,
}

impl ActorClient {
    pub(crate) async fn get_cluster_id(&self) -> Result<u64, ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::GetClusterId(Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn alloc_id(&self, cluster_id: u64) -> Result<u64, ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::AllocId(cluster_id, Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn bootstrap(&self, input: BootstrapInput) -> Result<(), ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Bootstrap(input, Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn put_store(&self, cluster_id: u64, store: StoreMeta) -> Result<(), ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::PutStore(cluster_id, store, Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn store_heartbeat(&self, cluster_id: u64, stats: StoreStats) -> Result<(), ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::StoreHeartbeat(cluster_id, stats, Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn region_heartbeat(
        &self,
        cluster_id: u64,
        region: Region,
    ) -> Result<Option<HeartbeatResponse>, ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::RegionHeartbeat(cluster_id, region, Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    pub(crate) async fn summary(&self) -> Result<ClusterSummary, ControlPlaneError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Summary(Callback(tx))).await;

        rx.await.expect("Cluster event loop actor dropped our channel. WTF!")
    }

    async fn send(&self, event: Event) {
        self.sender
            .send(event)
            .await
            .expect("Cluster event loop actor is dead. WTF!!");
    }
}

/// ClusterActor is the embedded control plane's cluster state in actor model.
pub(crate) struct ClusterActor {
    receiver: mpsc::Receiver<Event>,
    cluster: Cluster,
}

impl ClusterActor {
    pub(crate) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event);
        }
    }

    // This must NOT be async.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::GetClusterId(callback) => {
                callback.send(Ok(self.cluster.cluster_id()));
            }
            Event::AllocId(cluster_id, callback) => {
                callback.send(self.cluster.alloc_id(cluster_id));
            }
            Event::Bootstrap(input, callback) => {
                let result = self
                    .cluster
                    .bootstrap(input.cluster_id, input.store, input.region, input.id_floor);
                callback.send(result);
            }
            Event::PutStore(cluster_id, store, callback) => {
                callback.send(self.cluster.put_store(cluster_id, store));
            }
            Event::StoreHeartbeat(cluster_id, stats, callback) => {
                callback.send(self.cluster.store_heartbeat(cluster_id, stats));
            }
            Event::RegionHeartbeat(cluster_id, region, callback) => {
                let result = self.cluster.region_heartbeat(cluster_id, region);
                callback.send(result);
            }
            Event::Summary(callback) => {
                callback.send(Ok(self.cluster.summary()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Peer, PeerId, RegionEpoch, RegionId, StoreId, StoreStatus};
    use bytes::Bytes;

    fn store(id: u64) -> StoreMeta {
        StoreMeta {
            id: StoreId::new(id),
            address: format!("mock://store-{}", id),
            status: StoreStatus::Up,
            version: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn requests_are_served_in_order() {
        // -- setup --
        let logger = slog::Logger::root(slog::Discard, slog::o!());
        let (client, actor) = create(logger, 16, ControlPlaneConfig::default(), 9);
        tokio::spawn(actor.run_event_loop());
        let region = Region::new(
            RegionId::new(2),
            Bytes::new(),
            Bytes::new(),
            vec![Peer::voter(PeerId::new(3), StoreId::new(1))],
            RegionEpoch::new(1, 1),
        );

        // -- execute --
        let cluster_id = client.get_cluster_id().await.unwrap();
        client
            .bootstrap(BootstrapInput {
                cluster_id,
                store: store(1),
                region,
                id_floor: 4,
            })
            .await
            .unwrap();
        let first = client.alloc_id(cluster_id).await.unwrap();
        let second = client.alloc_id(cluster_id).await.unwrap();

        // -- verify --
        assert_eq!(9, cluster_id);
        assert_eq!((4, 5), (first, second));
        let summary = client.summary().await.unwrap();
        assert_eq!(1, summary.stores);
        assert_eq!(1, summary.regions);
    }
}
