use crate::actor::{ActorClient, BootstrapInput};
use crate::grpc::grpc_control_plane_server::{GrpcControlPlane, GrpcControlPlaneServer};
use crate::grpc::{
    proto_alloc_id_result, proto_bootstrap_result, proto_put_store_result, proto_store_heartbeat_result,
    ProtoAllocIdReq, ProtoAllocIdResult, ProtoAllocIdSuccess, ProtoBootstrapReq, ProtoBootstrapResult,
    ProtoBootstrapSuccess, ProtoGetClusterIdReq, ProtoGetClusterIdResult, ProtoPutStoreReq, ProtoPutStoreResult,
    ProtoPutStoreSuccess, ProtoRegionHeartbeatReq, ProtoRegionHeartbeatResp, ProtoStoreHeartbeatReq,
    ProtoStoreHeartbeatResult, ProtoStoreHeartbeatSuccess,
};
use crate::pd::{convert, ControlPlaneError, StoreStats};
use crate::server::RpcServerShutdownSignal;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

/// Outstanding heartbeat responses per stream before the reader waits for the store to catch up.
const RESPONSE_BUFFER: usize = 128;

/// RpcServer is the type that implements the control plane gRPC interface.
pub(crate) struct RpcServer {
    logger: slog::Logger,
    cluster: ActorClient,
}

impl RpcServer {
    pub(crate) fn new(logger: slog::Logger, cluster: ActorClient) -> Self {
        RpcServer { logger, cluster }
    }

    pub(crate) async fn run(self, listener: TcpListener, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", listener.local_addr());

        let result = Server::builder()
            .add_service(GrpcControlPlaneServer::new(self))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_alloc_id(&self, rpc_request: ProtoAllocIdReq) -> ProtoAllocIdResult {
        let result = match self.cluster.alloc_id(rpc_request.cluster_id).await {
            Ok(id) => proto_alloc_id_result::Result::Ok(ProtoAllocIdSuccess { id }),
            Err(e) => proto_alloc_id_result::Result::Err(convert::error_to_proto(&e)),
        };
        ProtoAllocIdResult { result: Some(result) }
    }

    async fn handle_bootstrap(&self, rpc_request: ProtoBootstrapReq) -> Result<ProtoBootstrapResult, Status> {
        let app_input = Self::convert_bootstrap_input(rpc_request)?;
        let result = match self.cluster.bootstrap(app_input).await {
            Ok(()) => proto_bootstrap_result::Result::Ok(ProtoBootstrapSuccess {}),
            Err(e) => proto_bootstrap_result::Result::Err(convert::error_to_proto(&e)),
        };
        Ok(ProtoBootstrapResult { result: Some(result) })
    }

    fn convert_bootstrap_input(rpc_request: ProtoBootstrapReq) -> Result<BootstrapInput, Status> {
        let store = rpc_request
            .store
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("Bootstrap without store"))?;
        let region = rpc_request
            .region
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("Bootstrap without region"))?;

        Ok(BootstrapInput {
            cluster_id: rpc_request.cluster_id,
            store: convert::store_from_proto(store).map_err(invalid_argument)?,
            region: convert::region_from_proto(region).map_err(invalid_argument)?,
            id_floor: rpc_request.id_floor,
        })
    }

    async fn handle_put_store(&self, rpc_request: ProtoPutStoreReq) -> Result<ProtoPutStoreResult, Status> {
        let store = rpc_request
            .store
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("PutStore without store"))?;
        let store = convert::store_from_proto(store).map_err(invalid_argument)?;

        let result = match self.cluster.put_store(rpc_request.cluster_id, store).await {
            Ok(()) => proto_put_store_result::Result::Ok(ProtoPutStoreSuccess {}),
            Err(e) => proto_put_store_result::Result::Err(convert::error_to_proto(&e)),
        };
        Ok(ProtoPutStoreResult { result: Some(result) })
    }

    async fn handle_store_heartbeat(
        &self,
        rpc_request: ProtoStoreHeartbeatReq,
    ) -> Result<ProtoStoreHeartbeatResult, Status> {
        let stats: StoreStats = rpc_request
            .stats
            .as_ref()
            .ok_or_else(|| Status::invalid_argument("StoreHeartbeat without stats"))
            .and_then(|s| convert::store_stats_from_proto(s).map_err(invalid_argument))?;

        let result = match self.cluster.store_heartbeat(rpc_request.cluster_id, stats).await {
            Ok(()) => proto_store_heartbeat_result::Result::Ok(ProtoStoreHeartbeatSuccess {}),
            Err(e) => proto_store_heartbeat_result::Result::Err(convert::error_to_proto(&e)),
        };
        Ok(ProtoStoreHeartbeatResult { result: Some(result) })
    }
}

/// Reads one region heartbeat stream until the store closes it. Requests are handled one at a
/// time, so responses keep the order of the reports that caused them.
async fn serve_region_heartbeats(
    logger: slog::Logger,
    cluster: ActorClient,
    mut inbound: Streaming<ProtoRegionHeartbeatReq>,
    outbound: mpsc::Sender<Result<ProtoRegionHeartbeatResp, Status>>,
) {
    loop {
        let rpc_request = match inbound.message().await {
            Ok(Some(rpc_request)) => rpc_request,
            Ok(None) => break,
            Err(status) => {
                slog::warn!(logger, "Region heartbeat stream failed: {:?}", status);
                break;
            }
        };
        slog::debug!(logger, "ServerWire - {:?}", rpc_request);

        let region = match convert::region_heartbeat_from_proto(&rpc_request) {
            Ok(region) => region,
            Err(e) => {
                slog::warn!(logger, "Dropping malformed region heartbeat: {}", e);
                continue;
            }
        };

        let response = match cluster.region_heartbeat(rpc_request.cluster_id, region).await {
            Ok(Some(response)) => convert::heartbeat_response_to_proto(&response),
            Ok(None) => continue,
            Err(ControlPlaneError::ClusterMismatch(expected)) => {
                let _ = outbound
                    .send(Err(Status::failed_precondition(format!(
                        "Cluster id mismatch, expected {}",
                        expected
                    ))))
                    .await;
                break;
            }
            Err(e) => {
                slog::debug!(logger, "Region heartbeat refused: {}", e);
                continue;
            }
        };

        slog::debug!(logger, "ServerWire - {:?}", response);
        if outbound.send(Ok(response)).await.is_err() {
            break;
        }
    }
    slog::debug!(logger, "Region heartbeat stream closed");
}

fn invalid_argument(e: ControlPlaneError) -> Status {
    Status::invalid_argument(e.to_string())
}

#[async_trait::async_trait]
impl GrpcControlPlane for RpcServer {
    async fn get_cluster_id(
        &self,
        _: Request<ProtoGetClusterIdReq>,
    ) -> Result<Response<ProtoGetClusterIdResult>, Status> {
        let cluster_id = self
            .cluster
            .get_cluster_id()
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(ProtoGetClusterIdResult { cluster_id }))
    }

    async fn alloc_id(
        &self,
        rpc_request_wrapped: Request<ProtoAllocIdReq>,
    ) -> Result<Response<ProtoAllocIdResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();
        let rpc_result = self.handle_alloc_id(rpc_request).await;

        Ok(Response::new(rpc_result))
    }

    async fn bootstrap(
        &self,
        rpc_request_wrapped: Request<ProtoBootstrapReq>,
    ) -> Result<Response<ProtoBootstrapResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_bootstrap(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn put_store(
        &self,
        rpc_request_wrapped: Request<ProtoPutStoreReq>,
    ) -> Result<Response<ProtoPutStoreResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_put_store(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn store_heartbeat(
        &self,
        rpc_request_wrapped: Request<ProtoStoreHeartbeatReq>,
    ) -> Result<Response<ProtoStoreHeartbeatResult>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();
        let rpc_result = self.handle_store_heartbeat(rpc_request).await;

        rpc_result.map(Response::new)
    }

    type RegionHeartbeatStream = ReceiverStream<Result<ProtoRegionHeartbeatResp, Status>>;

    async fn region_heartbeat(
        &self,
        rpc_request_wrapped: Request<Streaming<ProtoRegionHeartbeatReq>>,
    ) -> Result<Response<Self::RegionHeartbeatStream>, Status> {
        let inbound = rpc_request_wrapped.into_inner();
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);

        tokio::spawn(serve_region_heartbeats(
            self.logger.clone(),
            self.cluster.clone(),
            inbound,
            tx,
        ));

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
