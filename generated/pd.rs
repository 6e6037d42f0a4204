#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPeer {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub store_id: u64,
    #[prost(enumeration = "ProtoPeerRole", tag = "3")]
    pub role: i32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEpoch {
    #[prost(uint64, tag = "1")]
    pub conf_ver: u64,
    #[prost(uint64, tag = "2")]
    pub version: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegion {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub start_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub end_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub epoch: ::core::option::Option<ProtoEpoch>,
    #[prost(message, repeated, tag = "5")]
    pub peers: ::prost::alloc::vec::Vec<ProtoPeer>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStore {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
    #[prost(enumeration = "ProtoStoreState", tag = "3")]
    pub state: i32,
    #[prost(string, tag = "4")]
    pub version: ::prost::alloc::string::String,
}
// ------- Errors --------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNotBootstrapped {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBootstrapConflict {
    #[prost(uint64, tag = "1")]
    pub store_id: u64,
    #[prost(uint64, tag = "2")]
    pub region_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoClusterMismatch {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStoreTombstone {
    #[prost(uint64, tag = "1")]
    pub store_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoServerFault {
    #[prost(string, tag = "1")]
    pub message: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoControlPlaneError {
    #[prost(oneof = "proto_control_plane_error::Err", tags = "1, 2, 3, 4, 5")]
    pub err: ::core::option::Option<proto_control_plane_error::Err>,
}
/// Nested message and enum types in `ProtoControlPlaneError`.
pub mod proto_control_plane_error {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Err {
        #[prost(message, tag = "1")]
        NotBootstrapped(super::ProtoNotBootstrapped),
        #[prost(message, tag = "2")]
        BootstrapConflict(super::ProtoBootstrapConflict),
        #[prost(message, tag = "3")]
        ClusterMismatch(super::ProtoClusterMismatch),
        #[prost(message, tag = "4")]
        StoreTombstone(super::ProtoStoreTombstone),
        #[prost(message, tag = "5")]
        ServerFault(super::ProtoServerFault),
    }
}
// ------- Unary RPCs --------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGetClusterIdReq {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoGetClusterIdResult {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoAllocIdReq {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoAllocIdSuccess {
    #[prost(uint64, tag = "1")]
    pub id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoAllocIdResult {
    #[prost(oneof = "proto_alloc_id_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_alloc_id_result::Result>,
}
/// Nested message and enum types in `ProtoAllocIdResult`.
pub mod proto_alloc_id_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoAllocIdSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoControlPlaneError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBootstrapReq {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub store: ::core::option::Option<ProtoStore>,
    #[prost(message, optional, tag = "3")]
    pub region: ::core::option::Option<ProtoRegion>,
    /// Every id below this floor is owned by the simulator; AllocId never returns one.
    #[prost(uint64, tag = "4")]
    pub id_floor: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBootstrapSuccess {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoBootstrapResult {
    #[prost(oneof = "proto_bootstrap_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_bootstrap_result::Result>,
}
/// Nested message and enum types in `ProtoBootstrapResult`.
pub mod proto_bootstrap_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoBootstrapSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoControlPlaneError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPutStoreReq {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub store: ::core::option::Option<ProtoStore>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPutStoreSuccess {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPutStoreResult {
    #[prost(oneof = "proto_put_store_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_put_store_result::Result>,
}
/// Nested message and enum types in `ProtoPutStoreResult`.
pub mod proto_put_store_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoPutStoreSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoControlPlaneError),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStoreStats {
    #[prost(uint64, tag = "1")]
    pub store_id: u64,
    #[prost(uint64, tag = "2")]
    pub capacity: u64,
    #[prost(uint64, tag = "3")]
    pub used_size: u64,
    #[prost(uint64, tag = "4")]
    pub available: u64,
    #[prost(uint32, tag = "5")]
    pub region_count: u32,
    #[prost(uint32, tag = "6")]
    pub leader_count: u32,
    #[prost(int64, tag = "7")]
    pub start_time: i64,
    #[prost(uint32, tag = "8")]
    pub sending_snap_count: u32,
    #[prost(uint32, tag = "9")]
    pub receiving_snap_count: u32,
    #[prost(uint32, tag = "10")]
    pub applied_snap_count: u32,
    #[prost(uint64, tag = "11")]
    pub bytes_written: u64,
    #[prost(uint64, tag = "12")]
    pub bytes_read: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStoreHeartbeatReq {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub stats: ::core::option::Option<ProtoStoreStats>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStoreHeartbeatSuccess {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoStoreHeartbeatResult {
    #[prost(oneof = "proto_store_heartbeat_result::Result", tags = "1, 2")]
    pub result: ::core::option::Option<proto_store_heartbeat_result::Result>,
}
/// Nested message and enum types in `ProtoStoreHeartbeatResult`.
pub mod proto_store_heartbeat_result {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Ok(super::ProtoStoreHeartbeatSuccess),
        #[prost(message, tag = "2")]
        Err(super::ProtoControlPlaneError),
    }
}
// ------- Region heartbeat stream --------

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegionHeartbeatReq {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub region: ::core::option::Option<ProtoRegion>,
    #[prost(message, optional, tag = "3")]
    pub leader: ::core::option::Option<ProtoPeer>,
    #[prost(message, repeated, tag = "4")]
    pub down_peers: ::prost::alloc::vec::Vec<ProtoPeer>,
    #[prost(message, repeated, tag = "5")]
    pub pending_peers: ::prost::alloc::vec::Vec<ProtoPeer>,
    #[prost(uint64, tag = "6")]
    pub bytes_written: u64,
    #[prost(uint64, tag = "7")]
    pub bytes_read: u64,
    #[prost(uint64, tag = "8")]
    pub approximate_size: u64,
    #[prost(uint64, tag = "9")]
    pub approximate_keys: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoChangePeer {
    #[prost(enumeration = "ProtoChangePeerType", tag = "1")]
    pub change_type: i32,
    #[prost(message, optional, tag = "2")]
    pub peer: ::core::option::Option<ProtoPeer>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoTransferLeader {
    #[prost(message, optional, tag = "1")]
    pub peer: ::core::option::Option<ProtoPeer>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoMerge {
    /// The adjacent region to fold together with the heartbeat's region.
    #[prost(message, optional, tag = "1")]
    pub source: ::core::option::Option<ProtoRegion>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSplit {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub keys: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoRegionHeartbeatResp {
    #[prost(uint64, tag = "1")]
    pub region_id: u64,
    #[prost(message, optional, tag = "2")]
    pub region_epoch: ::core::option::Option<ProtoEpoch>,
    #[prost(oneof = "proto_region_heartbeat_resp::Operator", tags = "3, 4, 5, 6")]
    pub operator: ::core::option::Option<proto_region_heartbeat_resp::Operator>,
}
/// Nested message and enum types in `ProtoRegionHeartbeatResp`.
pub mod proto_region_heartbeat_resp {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Operator {
        #[prost(message, tag = "3")]
        ChangePeer(super::ProtoChangePeer),
        #[prost(message, tag = "4")]
        TransferLeader(super::ProtoTransferLeader),
        #[prost(message, tag = "5")]
        Merge(super::ProtoMerge),
        #[prost(message, tag = "6")]
        Split(super::ProtoSplit),
    }
}
// ------- Topology --------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoPeerRole {
    Voter = 0,
    Learner = 1,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoStoreState {
    Up = 0,
    Down = 1,
    Offline = 2,
    Tombstone = 3,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoChangePeerType {
    AddVoter = 0,
    AddLearner = 1,
    Remove = 2,
}
#[doc = r" Generated client implementations."]
pub mod grpc_control_plane_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = " Control plane as seen by simulated stores."]
    pub struct GrpcControlPlaneClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl GrpcControlPlaneClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> GrpcControlPlaneClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        pub async fn get_cluster_id(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoGetClusterIdReq>,
        ) -> Result<tonic::Response<super::ProtoGetClusterIdResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/GetClusterId");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn alloc_id(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoAllocIdReq>,
        ) -> Result<tonic::Response<super::ProtoAllocIdResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/AllocId");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn bootstrap(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoBootstrapReq>,
        ) -> Result<tonic::Response<super::ProtoBootstrapResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/Bootstrap");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn put_store(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoPutStoreReq>,
        ) -> Result<tonic::Response<super::ProtoPutStoreResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/PutStore");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn store_heartbeat(
            &mut self,
            request: impl tonic::IntoRequest<super::ProtoStoreHeartbeatReq>,
        ) -> Result<tonic::Response<super::ProtoStoreHeartbeatResult>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/StoreHeartbeat");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn region_heartbeat(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::ProtoRegionHeartbeatReq>,
        ) -> Result<
            tonic::Response<tonic::codec::Streaming<super::ProtoRegionHeartbeatResp>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/pd.GrpcControlPlane/RegionHeartbeat");
            self.inner
                .streaming(request.into_streaming_request(), path, codec)
                .await
        }
    }
    impl<T: Clone> Clone for GrpcControlPlaneClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for GrpcControlPlaneClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "GrpcControlPlaneClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod grpc_control_plane_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with GrpcControlPlaneServer."]
    #[async_trait]
    pub trait GrpcControlPlane: Send + Sync + 'static {
        async fn get_cluster_id(
            &self,
            request: tonic::Request<super::ProtoGetClusterIdReq>,
        ) -> Result<tonic::Response<super::ProtoGetClusterIdResult>, tonic::Status>;
        async fn alloc_id(
            &self,
            request: tonic::Request<super::ProtoAllocIdReq>,
        ) -> Result<tonic::Response<super::ProtoAllocIdResult>, tonic::Status>;
        async fn bootstrap(
            &self,
            request: tonic::Request<super::ProtoBootstrapReq>,
        ) -> Result<tonic::Response<super::ProtoBootstrapResult>, tonic::Status>;
        async fn put_store(
            &self,
            request: tonic::Request<super::ProtoPutStoreReq>,
        ) -> Result<tonic::Response<super::ProtoPutStoreResult>, tonic::Status>;
        async fn store_heartbeat(
            &self,
            request: tonic::Request<super::ProtoStoreHeartbeatReq>,
        ) -> Result<tonic::Response<super::ProtoStoreHeartbeatResult>, tonic::Status>;
        #[doc = "Server streaming response type for the RegionHeartbeat method."]
        type RegionHeartbeatStream: futures_core::Stream<Item = Result<super::ProtoRegionHeartbeatResp, tonic::Status>>
            + Send
            + Sync
            + 'static;
        async fn region_heartbeat(
            &self,
            request: tonic::Request<tonic::Streaming<super::ProtoRegionHeartbeatReq>>,
        ) -> Result<tonic::Response<Self::RegionHeartbeatStream>, tonic::Status>;
    }
    #[doc = " Control plane as seen by simulated stores."]
    #[derive(Debug)]
    pub struct GrpcControlPlaneServer<T: GrpcControlPlane> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: GrpcControlPlane> GrpcControlPlaneServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for GrpcControlPlaneServer<T>
    where
        T: GrpcControlPlane,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/pd.GrpcControlPlane/GetClusterId" => {
                    #[allow(non_camel_case_types)]
                    struct GetClusterIdSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane>
                        tonic::server::UnaryService<super::ProtoGetClusterIdReq>
                        for GetClusterIdSvc<T>
                    {
                        type Response = super::ProtoGetClusterIdResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoGetClusterIdReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).get_cluster_id(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = GetClusterIdSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pd.GrpcControlPlane/AllocId" => {
                    #[allow(non_camel_case_types)]
                    struct AllocIdSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane> tonic::server::UnaryService<super::ProtoAllocIdReq> for AllocIdSvc<T> {
                        type Response = super::ProtoAllocIdResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoAllocIdReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).alloc_id(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = AllocIdSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pd.GrpcControlPlane/Bootstrap" => {
                    #[allow(non_camel_case_types)]
                    struct BootstrapSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane> tonic::server::UnaryService<super::ProtoBootstrapReq>
                        for BootstrapSvc<T>
                    {
                        type Response = super::ProtoBootstrapResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoBootstrapReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).bootstrap(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = BootstrapSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pd.GrpcControlPlane/PutStore" => {
                    #[allow(non_camel_case_types)]
                    struct PutStoreSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane> tonic::server::UnaryService<super::ProtoPutStoreReq> for PutStoreSvc<T> {
                        type Response = super::ProtoPutStoreResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoPutStoreReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).put_store(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = PutStoreSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pd.GrpcControlPlane/StoreHeartbeat" => {
                    #[allow(non_camel_case_types)]
                    struct StoreHeartbeatSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane>
                        tonic::server::UnaryService<super::ProtoStoreHeartbeatReq>
                        for StoreHeartbeatSvc<T>
                    {
                        type Response = super::ProtoStoreHeartbeatResult;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::ProtoStoreHeartbeatReq>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).store_heartbeat(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = StoreHeartbeatSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/pd.GrpcControlPlane/RegionHeartbeat" => {
                    #[allow(non_camel_case_types)]
                    struct RegionHeartbeatSvc<T: GrpcControlPlane>(pub Arc<T>);
                    impl<T: GrpcControlPlane>
                        tonic::server::StreamingService<super::ProtoRegionHeartbeatReq>
                        for RegionHeartbeatSvc<T>
                    {
                        type Response = super::ProtoRegionHeartbeatResp;
                        type ResponseStream = T::RegionHeartbeatStream;
                        type Future =
                            BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<
                                tonic::Streaming<super::ProtoRegionHeartbeatReq>,
                            >,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).region_heartbeat(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1;
                        let inner = inner.0;
                        let method = RegionHeartbeatSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: GrpcControlPlane> Clone for GrpcControlPlaneServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: GrpcControlPlane> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: GrpcControlPlane> tonic::transport::NamedService for GrpcControlPlaneServer<T> {
        const NAME: &'static str = "pd.GrpcControlPlane";
    }
}
