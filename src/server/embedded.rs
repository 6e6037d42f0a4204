use crate::actor::{self, ActorClient, ClusterSummary};
use crate::config::ControlPlaneConfig;
use crate::pd::ControlPlaneError;
use crate::server::{shutdown_signal, RpcServer, RpcServerShutdownHandle};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const ACTOR_BUFFER: usize = 1024;

/// EmbeddedControlPlane is an in process control plane served over real gRPC on a loopback port,
/// for runs without an external one.
pub struct EmbeddedControlPlane {
    address: SocketAddr,
    cluster: ActorClient,
    shutdown: Option<RpcServerShutdownHandle>,
    server: JoinHandle<()>,
}

impl EmbeddedControlPlane {
    pub async fn start(
        logger: slog::Logger,
        config: ControlPlaneConfig,
        cluster_id: u64,
    ) -> io::Result<EmbeddedControlPlane> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let logger = logger.new(slog::o!("control_plane" => address.to_string()));

        let (cluster, cluster_actor) = actor::create(logger.clone(), ACTOR_BUFFER, config, cluster_id);
        tokio::spawn(cluster_actor.run_event_loop());

        let (handle, signal) = shutdown_signal();
        let server = tokio::spawn(RpcServer::new(logger, cluster.clone()).run(listener, signal));

        Ok(EmbeddedControlPlane {
            address,
            cluster,
            shutdown: Some(handle),
            server,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub async fn summary(&self) -> Result<ClusterSummary, ControlPlaneError> {
        self.cluster.summary().await
    }

    /// Stop accepting connections and wait for open streams to drain.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.shutdown.take() {
            handle.trigger();
        }
        let _ = (&mut self.server).await;
    }
}
