mod checkers;
mod cluster;
mod operator;

pub(crate) use cluster::Cluster;
