//! Pooled SSH transport to cluster hosts.
//!
//! Every remote operation — running `docker` subcommands, streaming an
//! image through `docker load`, writing a secrets env-file, tailing a
//! service's logs — goes through a [`Session`] handed out by the
//! process-wide [`SessionPool`]. Connections are multiplexed over
//! OpenSSH's native ControlMaster socket, so repeated calls against the
//! same host reuse one TCP/SSH handshake instead of paying for a new
//! one per command.

mod pool;
mod session;

pub use pool::SessionPool;
pub use session::{RemoteCommandOutput, Session, StreamingUpload};
