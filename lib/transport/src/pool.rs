use std::sync::Arc;

use dashmap::DashMap;
use model::Server;
use tracing::{debug, warn};

use crate::session::Session;

/// Keys a pooled [`Session`] by everything that determines whether two
/// `Server` entries would actually open the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConnectionKey {
  host: String,
  user: String,
  port: u16,
}

impl From<&Server> for ConnectionKey {
  fn from(server: &Server) -> Self {
    Self {
      host: server.host.clone(),
      user: server.user.clone(),
      port: server.port,
    }
  }
}

/// Process-wide cache of live SSH connections. One pool is constructed
/// at startup and shared across the cluster manager, distributor,
/// observer, and health prober — they all want the same multiplexed
/// connection to a given host rather than five independent ones.
#[derive(Default)]
pub struct SessionPool {
  sessions: DashMap<ConnectionKey, Arc<Session>>,
}

impl SessionPool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the pooled session for `server`, connecting lazily on
  /// first use.
  pub async fn get(&self, server: &Server) -> anyhow::Result<Arc<Session>> {
    let key = ConnectionKey::from(server);
    if let Some(session) = self.sessions.get(&key) {
      return Ok(session.clone());
    }

    debug!("opening ssh session to {}", server.host);
    let session = Arc::new(Session::connect(server).await?);
    self.sessions.insert(key, session.clone());
    Ok(session)
  }

  /// Drops the pooled entry for `server`, forcing the next [`Self::get`]
  /// to reconnect. Called after a command errors in a way that looks
  /// like a dead mux socket (connection reset, broken pipe) rather than
  /// a remote command failure.
  pub fn invalidate(&self, server: &Server) {
    let key = ConnectionKey::from(server);
    if self.sessions.remove(&key).is_some() {
      warn!("invalidated ssh session to {}", server.host);
    }
  }
}
