//! Conversions between domain types and their wire messages, shared by the gRPC client and the
//! embedded control plane server.

use crate::grpc::{
    proto_control_plane_error, proto_region_heartbeat_resp, ProtoBootstrapConflict, ProtoChangePeer,
    ProtoChangePeerType, ProtoClusterMismatch, ProtoControlPlaneError, ProtoEpoch, ProtoMerge, ProtoNotBootstrapped,
    ProtoPeer, ProtoPeerRole, ProtoRegion, ProtoRegionHeartbeatReq, ProtoRegionHeartbeatResp, ProtoServerFault,
    ProtoSplit, ProtoStore, ProtoStoreState, ProtoStoreStats, ProtoStoreTombstone, ProtoTransferLeader,
};
use crate::model::{Peer, PeerId, PeerRole, Region, RegionEpoch, RegionId, StoreId, StoreStatus};
use crate::pd::{ChangePeerType, ControlPlaneError, HeartbeatResponse, Operator, StoreMeta, StoreStats};
use bytes::Bytes;
use chrono::{TimeZone, Utc};

type ConvertResult<T> = Result<T, ControlPlaneError>;

// ------- Topology --------

pub(crate) fn peer_to_proto(peer: &Peer) -> ProtoPeer {
    let role = match peer.role() {
        PeerRole::Voter => ProtoPeerRole::Voter,
        PeerRole::Learner => ProtoPeerRole::Learner,
    };

    ProtoPeer {
        id: peer.id().as_u64(),
        store_id: peer.store_id().as_u64(),
        role: role as i32,
    }
}

pub(crate) fn peer_from_proto(proto: &ProtoPeer) -> ConvertResult<Peer> {
    let role = match ProtoPeerRole::from_i32(proto.role) {
        Some(ProtoPeerRole::Voter) => PeerRole::Voter,
        Some(ProtoPeerRole::Learner) => PeerRole::Learner,
        None => return Err(ControlPlaneError::Malformed("unknown peer role")),
    };
    if proto.id == 0 || proto.store_id == 0 {
        return Err(ControlPlaneError::Malformed("peer without id"));
    }

    Ok(Peer::new(PeerId::new(proto.id), StoreId::new(proto.store_id), role))
}

pub(crate) fn epoch_to_proto(epoch: RegionEpoch) -> ProtoEpoch {
    ProtoEpoch {
        conf_ver: epoch.conf_ver,
        version: epoch.version,
    }
}

pub(crate) fn epoch_from_proto(proto: Option<&ProtoEpoch>) -> ConvertResult<RegionEpoch> {
    proto
        .map(|e| RegionEpoch::new(e.conf_ver, e.version))
        .ok_or(ControlPlaneError::Malformed("missing region epoch"))
}

pub(crate) fn region_to_proto(region: &Region) -> ProtoRegion {
    ProtoRegion {
        id: region.id().as_u64(),
        start_key: region.start_key().to_vec(),
        end_key: region.end_key().to_vec(),
        epoch: Some(epoch_to_proto(region.epoch())),
        peers: region.peers().iter().map(peer_to_proto).collect(),
    }
}

/// Topology only. Sizes, flows and leader are left empty.
pub(crate) fn region_from_proto(proto: &ProtoRegion) -> ConvertResult<Region> {
    let peers = proto.peers.iter().map(peer_from_proto).collect::<ConvertResult<Vec<_>>>()?;

    Ok(Region::new(
        RegionId::new(proto.id),
        Bytes::from(proto.start_key.clone()),
        Bytes::from(proto.end_key.clone()),
        peers,
        epoch_from_proto(proto.epoch.as_ref())?,
    ))
}

pub(crate) fn store_status_to_proto(status: StoreStatus) -> ProtoStoreState {
    match status {
        StoreStatus::Up => ProtoStoreState::Up,
        StoreStatus::Down => ProtoStoreState::Down,
        StoreStatus::Offline => ProtoStoreState::Offline,
        StoreStatus::Tombstone => ProtoStoreState::Tombstone,
    }
}

pub(crate) fn store_to_proto(store: &StoreMeta) -> ProtoStore {
    ProtoStore {
        id: store.id.as_u64(),
        address: store.address.clone(),
        state: store_status_to_proto(store.status) as i32,
        version: store.version.clone(),
    }
}

pub(crate) fn store_from_proto(proto: &ProtoStore) -> ConvertResult<StoreMeta> {
    let status = match ProtoStoreState::from_i32(proto.state) {
        Some(ProtoStoreState::Up) => StoreStatus::Up,
        Some(ProtoStoreState::Down) => StoreStatus::Down,
        Some(ProtoStoreState::Offline) => StoreStatus::Offline,
        Some(ProtoStoreState::Tombstone) => StoreStatus::Tombstone,
        None => return Err(ControlPlaneError::Malformed("unknown store state")),
    };
    if proto.id == 0 {
        return Err(ControlPlaneError::Malformed("store without id"));
    }

    Ok(StoreMeta {
        id: StoreId::new(proto.id),
        address: proto.address.clone(),
        status,
        version: proto.version.clone(),
    })
}

// ------- Heartbeats --------

pub(crate) fn store_stats_to_proto(stats: &StoreStats) -> ProtoStoreStats {
    ProtoStoreStats {
        store_id: stats.store_id.as_u64(),
        capacity: stats.capacity,
        used_size: stats.used_size,
        available: stats.available,
        region_count: stats.region_count,
        leader_count: stats.leader_count,
        start_time: stats.start_time.timestamp(),
        sending_snap_count: stats.sending_snap_count,
        receiving_snap_count: stats.receiving_snap_count,
        applied_snap_count: stats.applied_snap_count,
        bytes_written: stats.bytes_written,
        bytes_read: stats.bytes_read,
    }
}

pub(crate) fn store_stats_from_proto(proto: &ProtoStoreStats) -> ConvertResult<StoreStats> {
    let start_time = Utc
        .timestamp_opt(proto.start_time, 0)
        .single()
        .ok_or(ControlPlaneError::Malformed("store start time out of range"))?;

    Ok(StoreStats {
        store_id: StoreId::new(proto.store_id),
        capacity: proto.capacity,
        used_size: proto.used_size,
        available: proto.available,
        region_count: proto.region_count,
        leader_count: proto.leader_count,
        start_time,
        sending_snap_count: proto.sending_snap_count,
        receiving_snap_count: proto.receiving_snap_count,
        applied_snap_count: proto.applied_snap_count,
        bytes_written: proto.bytes_written,
        bytes_read: proto.bytes_read,
    })
}

pub(crate) fn region_heartbeat_to_proto(cluster_id: u64, region: &Region) -> ProtoRegionHeartbeatReq {
    ProtoRegionHeartbeatReq {
        cluster_id,
        region: Some(region_to_proto(region)),
        leader: region.leader().map(peer_to_proto),
        down_peers: region.down_peers().iter().map(peer_to_proto).collect(),
        pending_peers: region.pending_peers().iter().map(peer_to_proto).collect(),
        bytes_written: region.written_bytes(),
        bytes_read: region.read_bytes(),
        approximate_size: region.approximate_size(),
        approximate_keys: region.approximate_keys(),
    }
}

/// Rebuild the full region view a leader reported.
pub(crate) fn region_heartbeat_from_proto(proto: &ProtoRegionHeartbeatReq) -> ConvertResult<Region> {
    let proto_region = proto
        .region
        .as_ref()
        .ok_or(ControlPlaneError::Malformed("heartbeat without region"))?;
    let mut region =
        region_from_proto(proto_region)?.with_size(proto.approximate_size, proto.approximate_keys);
    if let Some(leader) = &proto.leader {
        region.set_leader(PeerId::new(leader.id));
    }
    region.set_written_bytes(proto.bytes_written);
    region.set_read_bytes(proto.bytes_read);
    region.set_down_peers(proto.down_peers.iter().map(|p| PeerId::new(p.id)).collect());
    region.set_pending_peers(proto.pending_peers.iter().map(|p| PeerId::new(p.id)).collect());

    Ok(region)
}

pub(crate) fn heartbeat_response_to_proto(response: &HeartbeatResponse) -> ProtoRegionHeartbeatResp {
    use proto_region_heartbeat_resp::Operator as ProtoOperator;

    let operator = response.operator.as_ref().map(|op| match op {
        Operator::ChangePeer { change, peer } => {
            let change_type = match change {
                ChangePeerType::AddVoter => ProtoChangePeerType::AddVoter,
                ChangePeerType::AddLearner => ProtoChangePeerType::AddLearner,
                ChangePeerType::Remove => ProtoChangePeerType::Remove,
            };
            ProtoOperator::ChangePeer(ProtoChangePeer {
                change_type: change_type as i32,
                peer: Some(peer_to_proto(peer)),
            })
        }
        Operator::TransferLeader { peer } => ProtoOperator::TransferLeader(ProtoTransferLeader {
            peer: Some(peer_to_proto(peer)),
        }),
        Operator::Merge { source } => ProtoOperator::Merge(ProtoMerge {
            source: Some(region_to_proto(source)),
        }),
        Operator::Split { keys } => ProtoOperator::Split(ProtoSplit {
            keys: keys.iter().map(|k| k.to_vec()).collect(),
        }),
    });

    ProtoRegionHeartbeatResp {
        region_id: response.region_id.as_u64(),
        region_epoch: Some(epoch_to_proto(response.epoch)),
        operator,
    }
}

pub(crate) fn heartbeat_response_from_proto(proto: ProtoRegionHeartbeatResp) -> ConvertResult<HeartbeatResponse> {
    use proto_region_heartbeat_resp::Operator as ProtoOperator;

    let missing_peer = ControlPlaneError::Malformed("operator without peer");
    let operator = match proto.operator {
        None => None,
        Some(ProtoOperator::ChangePeer(change_peer)) => {
            let change = match ProtoChangePeerType::from_i32(change_peer.change_type) {
                Some(ProtoChangePeerType::AddVoter) => ChangePeerType::AddVoter,
                Some(ProtoChangePeerType::AddLearner) => ChangePeerType::AddLearner,
                Some(ProtoChangePeerType::Remove) => ChangePeerType::Remove,
                None => return Err(ControlPlaneError::Malformed("unknown change peer type")),
            };
            let peer = peer_from_proto(change_peer.peer.as_ref().ok_or(missing_peer)?)?;
            Some(Operator::ChangePeer { change, peer })
        }
        Some(ProtoOperator::TransferLeader(transfer)) => {
            let peer = peer_from_proto(transfer.peer.as_ref().ok_or(missing_peer)?)?;
            Some(Operator::TransferLeader { peer })
        }
        Some(ProtoOperator::Merge(merge)) => {
            let source = merge
                .source
                .as_ref()
                .ok_or(ControlPlaneError::Malformed("merge without source region"))?;
            Some(Operator::Merge {
                source: region_from_proto(source)?,
            })
        }
        Some(ProtoOperator::Split(split)) => Some(Operator::Split {
            keys: split.keys.into_iter().map(Bytes::from).collect(),
        }),
    };

    Ok(HeartbeatResponse {
        region_id: RegionId::new(proto.region_id),
        epoch: epoch_from_proto(proto.region_epoch.as_ref())?,
        operator,
    })
}

// ------- Errors --------

pub(crate) fn error_to_proto(error: &ControlPlaneError) -> ProtoControlPlaneError {
    use proto_control_plane_error::Err as ProtoErr;

    let err = match error {
        ControlPlaneError::NotBootstrapped => ProtoErr::NotBootstrapped(ProtoNotBootstrapped {}),
        ControlPlaneError::BootstrapConflict { store_id, region_id } => {
            ProtoErr::BootstrapConflict(ProtoBootstrapConflict {
                store_id: store_id.as_u64(),
                region_id: region_id.as_u64(),
            })
        }
        ControlPlaneError::ClusterMismatch(cluster_id) => ProtoErr::ClusterMismatch(ProtoClusterMismatch {
            cluster_id: *cluster_id,
        }),
        ControlPlaneError::StoreTombstone(store_id) => ProtoErr::StoreTombstone(ProtoStoreTombstone {
            store_id: store_id.as_u64(),
        }),
        other => ProtoErr::ServerFault(ProtoServerFault {
            message: other.to_string(),
        }),
    };

    ProtoControlPlaneError { err: Some(err) }
}

pub(crate) fn error_from_proto(proto: Option<ProtoControlPlaneError>) -> ControlPlaneError {
    use proto_control_plane_error::Err as ProtoErr;

    match proto.and_then(|e| e.err) {
        Some(ProtoErr::NotBootstrapped(_)) => ControlPlaneError::NotBootstrapped,
        Some(ProtoErr::BootstrapConflict(conflict)) => ControlPlaneError::BootstrapConflict {
            store_id: StoreId::new(conflict.store_id),
            region_id: RegionId::new(conflict.region_id),
        },
        Some(ProtoErr::ClusterMismatch(mismatch)) => ControlPlaneError::ClusterMismatch(mismatch.cluster_id),
        Some(ProtoErr::StoreTombstone(tombstone)) => ControlPlaneError::StoreTombstone(StoreId::new(tombstone.store_id)),
        Some(ProtoErr::ServerFault(fault)) => ControlPlaneError::ServerFault(fault.message),
        None => ControlPlaneError::Malformed("error without detail"),
    }
}
