use std::process::Stdio;

use anyhow::{Context, anyhow};
use command::quote;
use model::{Server, ServerAuth};
use openssh::{KnownHosts, SessionBuilder};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// The result of a command run on a remote host. Mirrors
/// [`command::CommandOutput`], just without the local-process framing —
/// the orchestrator never runs a remote command it doesn't also want to
/// log the way it logs a local one.
#[derive(Debug, Clone)]
pub struct RemoteCommandOutput {
  pub success: bool,
  pub stdout: String,
  pub stderr: String,
}

/// A live, multiplexed connection to one cluster host.
pub struct Session {
  inner: openssh::Session,
  host_label: String,
}

impl Session {
  pub(crate) async fn connect(server: &Server) -> anyhow::Result<Self> {
    let mut builder = SessionBuilder::default();
    builder.user(server.user.clone()).port(server.port);

    match &server.auth {
      ServerAuth::KeyPath(path) => {
        builder.keyfile(path);
      }
      ServerAuth::Password(_) => {
        return Err(anyhow!(
          "server '{}' is configured with password auth, but the SSH \
           transport requires key-based auth (native ControlMaster \
           multiplexing has no password prompt path); configure \
           `auth.key_path` instead",
          server.name
        ));
      }
    }

    // Cluster hosts are operator-provisioned infrastructure, not
    // arbitrary network endpoints; we trust the first connection and
    // rely on the operator's own known_hosts hygiene.
    builder.known_hosts_check(KnownHosts::Accept);

    let inner = builder
      .connect_mux(&server.host)
      .await
      .with_context(|| format!("failed to connect to {}", server.host))?;

    Ok(Self { inner, host_label: server.host.clone() })
  }

  pub fn host_label(&self) -> &str {
    &self.host_label
  }

  /// Runs `command` through the remote shell (`sh -c`), so it may
  /// contain pipes, redirects, and `&&` chains. Every interpolated
  /// argument should already have been through [`command::quote`].
  pub async fn execute(
    &self,
    command: &str,
  ) -> anyhow::Result<RemoteCommandOutput> {
    let output = self
      .inner
      .shell(command)
      .output()
      .await
      .with_context(|| format!("command failed on {}", self.host_label))?;
    Ok(RemoteCommandOutput {
      success: output.status.success(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }

  /// Runs `program` with `args` passed as literal argv entries — no
  /// shell involved, so none of `args` need quoting.
  pub async fn execute_args(
    &self,
    program: &str,
    args: &[&str],
  ) -> anyhow::Result<RemoteCommandOutput> {
    let output = self
      .inner
      .command(program)
      .args(args)
      .output()
      .await
      .with_context(|| format!("command failed on {}", self.host_label))?;
    Ok(RemoteCommandOutput {
      success: output.status.success(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }

  pub async fn path_exists(&self, remote_path: &str) -> anyhow::Result<bool> {
    let out = self
      .execute(&format!("test -e {}", quote(remote_path)))
      .await?;
    Ok(out.success)
  }

  /// Writes `contents` to `remote_path` and chmods it, via a piped
  /// `cat > path` — avoids needing sftp just to materialize small
  /// files (secrets env-files, compose overrides, join tokens).
  pub async fn write_file(
    &self,
    remote_path: &str,
    contents: &[u8],
    mode: u32,
  ) -> anyhow::Result<()> {
    let mut child = self
      .inner
      .shell(format!("cat > {}", quote(remote_path)))
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .spawn()
      .await
      .context("failed to spawn remote write")?;

    let mut stdin = child
      .stdin()
      .take()
      .context("remote write has no stdin")?;
    stdin
      .write_all(contents)
      .await
      .context("failed to stream file contents to remote host")?;
    stdin.shutdown().await.ok();
    drop(stdin);

    let status = child.wait().await.context("remote write did not exit")?;
    if !status.success() {
      return Err(anyhow!(
        "writing {remote_path} on {} exited with {status}",
        self.host_label
      ));
    }

    self
      .execute(&format!("chmod {mode:o} {}", quote(remote_path)))
      .await?
      .into_result(&format!("chmod {remote_path}"))
  }

  /// Spawns `command` with stdin piped through, for streaming a local
  /// `docker save` directly into a remote `docker load` without
  /// staging the tarball on disk either side.
  pub async fn start_streaming_upload(
    &self,
    command: &str,
  ) -> anyhow::Result<StreamingUpload> {
    let mut child = self
      .inner
      .shell(command)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .await
      .with_context(|| {
        format!("failed to start streaming command on {}", self.host_label)
      })?;
    let stdin = child
      .stdin()
      .take()
      .context("streaming command has no stdin")?;
    Ok(StreamingUpload { child, stdin: Some(stdin) })
  }

  /// Spawns `command` with only stdout/stderr piped, for tailing a
  /// long-running remote process (e.g. waiting on certificate issuance
  /// logs during the SSL-wait probe).
  pub async fn spawn_reader(
    &self,
    command: &str,
  ) -> anyhow::Result<(
    impl AsyncRead + Send + Unpin + use<>,
    impl AsyncRead + Send + Unpin + use<>,
  )> {
    let mut child = self
      .inner
      .shell(command)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .await
      .with_context(|| {
        format!("failed to spawn reader command on {}", self.host_label)
      })?;
    let stdout = child.stdout().take().context("no stdout")?;
    let stderr = child.stderr().take().context("no stderr")?;
    // The child outlives this call; we detach it and let the pipes
    // close naturally when the remote process exits.
    tokio::spawn(async move {
      let _ = child.wait().await;
    });
    Ok((stdout, stderr))
  }
}

impl RemoteCommandOutput {
  fn into_result(self, what: &str) -> anyhow::Result<()> {
    if self.success {
      Ok(())
    } else {
      Err(anyhow!("{what} failed: {}", self.stderr.trim()))
    }
  }
}

/// A remote process with its stdin still open, fed from a local
/// `AsyncRead` (typically a local `docker save` child's stdout).
pub struct StreamingUpload {
  child: openssh::RemoteChild<'static>,
  stdin: Option<openssh::ChildStdin<'static>>,
}

impl StreamingUpload {
  pub async fn pipe_from(
    &mut self,
    mut reader: impl AsyncRead + Unpin,
  ) -> anyhow::Result<()> {
    let stdin = self.stdin.as_mut().context("stdin already closed")?;
    tokio::io::copy(&mut reader, stdin)
      .await
      .context("failed to stream image data to remote host")?;
    if let Some(mut stdin) = self.stdin.take() {
      stdin.shutdown().await.ok();
    }
    Ok(())
  }

  pub async fn finish(mut self) -> anyhow::Result<RemoteCommandOutput> {
    if let Some(mut stdin) = self.stdin.take() {
      stdin.shutdown().await.ok();
    }
    let status = self.child.wait().await.context("remote load did not exit")?;
    Ok(RemoteCommandOutput {
      success: status.success(),
      stdout: String::new(),
      stderr: String::new(),
    })
  }
}
