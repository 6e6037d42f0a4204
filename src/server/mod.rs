mod embedded;
mod server;
mod shutdown;

pub use embedded::EmbeddedControlPlane;
pub(crate) use server::RpcServer;
pub(crate) use shutdown::shutdown_signal;
pub(crate) use shutdown::RpcServerShutdownHandle;
pub(crate) use shutdown::RpcServerShutdownSignal;
