use crate::grpc::grpc_control_plane_client::GrpcControlPlaneClient;
use crate::grpc::{
    proto_alloc_id_result, proto_bootstrap_result, proto_put_store_result, proto_store_heartbeat_result,
    ProtoAllocIdReq, ProtoBootstrapReq, ProtoGetClusterIdReq, ProtoPutStoreReq, ProtoStoreHeartbeatReq,
};
use crate::model::{Region, Store};
use crate::pd::convert;
use crate::pd::{ControlPlaneClient, ControlPlaneError, RegionHeartbeatStream, StoreMeta, StoreStats};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

/// RpcControlPlaneClient talks to a control plane over gRPC. Every unary call is bounded by
/// `timeout`.
#[derive(Clone)]
pub struct RpcControlPlaneClient {
    logger: slog::Logger,
    inner: GrpcControlPlaneClient<Channel>,
    cluster_id: u64,
    timeout: Duration,
}

impl RpcControlPlaneClient {
    /// Connect to `address` (`host:port`, or a full `http://` url) and learn the cluster id.
    pub async fn connect(logger: slog::Logger, address: &str, timeout: Duration) -> Result<Self, ControlPlaneError> {
        let url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        slog::info!(logger, "Connecting to control plane at {} ...", url);
        let endpoint = Endpoint::from_shared(url)?;
        let connection = with_timeout(timeout, async { Ok(endpoint.connect().await?) }).await?;

        let mut client = RpcControlPlaneClient {
            logger,
            inner: GrpcControlPlaneClient::new(connection),
            cluster_id: 0,
            timeout,
        };
        client.cluster_id = client.get_cluster_id().await?;
        slog::info!(client.logger, "Connected to cluster {}", client.cluster_id);

        Ok(client)
    }
}

#[async_trait::async_trait]
impl ControlPlaneClient for RpcControlPlaneClient {
    async fn get_cluster_id(&self) -> Result<u64, ControlPlaneError> {
        let mut inner = self.inner.clone();
        let reply = with_timeout(self.timeout, async {
            Ok(inner.get_cluster_id(Request::new(ProtoGetClusterIdReq {})).await?)
        })
        .await?
        .into_inner();

        Ok(reply.cluster_id)
    }

    async fn alloc_id(&self) -> Result<u64, ControlPlaneError> {
        let mut inner = self.inner.clone();
        let rpc_request = ProtoAllocIdReq {
            cluster_id: self.cluster_id,
        };
        let reply = with_timeout(self.timeout, async { Ok(inner.alloc_id(Request::new(rpc_request)).await?) })
            .await?
            .into_inner();

        match reply.result {
            Some(proto_alloc_id_result::Result::Ok(ok)) => Ok(ok.id),
            Some(proto_alloc_id_result::Result::Err(err)) => Err(convert::error_from_proto(Some(err))),
            None => Err(ControlPlaneError::Malformed("empty AllocId result")),
        }
    }

    async fn bootstrap(&self, store: &Store, region: &Region, id_floor: u64) -> Result<(), ControlPlaneError> {
        let mut inner = self.inner.clone();
        let rpc_request = ProtoBootstrapReq {
            cluster_id: self.cluster_id,
            store: Some(convert::store_to_proto(&StoreMeta::from(store))),
            region: Some(convert::region_to_proto(region)),
            id_floor,
        };
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let reply = with_timeout(self.timeout, async { Ok(inner.bootstrap(Request::new(rpc_request)).await?) })
            .await?
            .into_inner();
        slog::debug!(self.logger, "ClientWire - {:?}", reply);

        match reply.result {
            Some(proto_bootstrap_result::Result::Ok(_)) => Ok(()),
            Some(proto_bootstrap_result::Result::Err(err)) => Err(convert::error_from_proto(Some(err))),
            None => Err(ControlPlaneError::Malformed("empty Bootstrap result")),
        }
    }

    async fn put_store(&self, store: &Store) -> Result<(), ControlPlaneError> {
        let mut inner = self.inner.clone();
        let rpc_request = ProtoPutStoreReq {
            cluster_id: self.cluster_id,
            store: Some(convert::store_to_proto(&StoreMeta::from(store))),
        };
        slog::debug!(self.logger, "ClientWire - {:?}", rpc_request);
        let reply = with_timeout(self.timeout, async { Ok(inner.put_store(Request::new(rpc_request)).await?) })
            .await?
            .into_inner();

        match reply.result {
            Some(proto_put_store_result::Result::Ok(_)) => Ok(()),
            Some(proto_put_store_result::Result::Err(err)) => Err(convert::error_from_proto(Some(err))),
            None => Err(ControlPlaneError::Malformed("empty PutStore result")),
        }
    }

    async fn store_heartbeat(&self, stats: &StoreStats) -> Result<(), ControlPlaneError> {
        let mut inner = self.inner.clone();
        let rpc_request = ProtoStoreHeartbeatReq {
            cluster_id: self.cluster_id,
            stats: Some(convert::store_stats_to_proto(stats)),
        };
        let reply = with_timeout(self.timeout, async {
            Ok(inner.store_heartbeat(Request::new(rpc_request)).await?)
        })
        .await?
        .into_inner();

        match reply.result {
            Some(proto_store_heartbeat_result::Result::Ok(_)) => Ok(()),
            Some(proto_store_heartbeat_result::Result::Err(err)) => Err(convert::error_from_proto(Some(err))),
            None => Err(ControlPlaneError::Malformed("empty StoreHeartbeat result")),
        }
    }

    async fn region_heartbeat(&self) -> Result<RegionHeartbeatStream, ControlPlaneError> {
        let mut inner = self.inner.clone();
        let cluster_id = self.cluster_id;

        let (request_tx, request_rx) = mpsc::unbounded_channel::<Region>();
        let outbound = UnboundedReceiverStream::new(request_rx)
            .map(move |region| convert::region_heartbeat_to_proto(cluster_id, &region));
        let mut inbound = with_timeout(self.timeout, async {
            Ok(inner.region_heartbeat(Request::new(outbound)).await?)
        })
        .await?
        .into_inner();

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            loop {
                let item = match inbound.message().await {
                    Ok(Some(reply)) => {
                        slog::debug!(logger, "ClientWire - {:?}", reply);
                        convert::heartbeat_response_from_proto(reply)
                    }
                    Ok(None) => Err(ControlPlaneError::StreamClosed),
                    Err(status) => Err(ControlPlaneError::Rpc(status)),
                };
                let terminal = matches!(item, Err(ControlPlaneError::StreamClosed) | Err(ControlPlaneError::Rpc(_)));
                if response_tx.send(item).is_err() || terminal {
                    break;
                }
            }
        });

        Ok(RegionHeartbeatStream {
            requests: request_tx,
            responses: response_rx,
        })
    }
}

async fn with_timeout<T, F>(timeout: Duration, future: F) -> Result<T, ControlPlaneError>
where
    F: Future<Output = Result<T, ControlPlaneError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ControlPlaneError::Timeout(timeout)),
    }
}
