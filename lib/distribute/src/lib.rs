//! Image distribution: getting an image built (or pulled) on the manager
//! onto every worker node that might schedule a task running it (§4.6).
//!
//! Neither side of a transfer has SSH access to the other — the
//! orchestrator is the only party holding sessions to both the manager and
//! every worker, so it relays the bytes itself rather than having the
//! manager dial out to workers directly.

use anyhow::Context;
use futures_util::future::join_all;
use model::Server;
use tracing::{info, warn};
use transport::SessionPool;

/// Which fan-out shape to use once we know which workers are missing the
/// image. A single missing worker never benefits from staging a shared tar
/// file, so it streams directly; more than one reuses a single `docker
/// save` by staging it once on the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
  Streaming,
  Parallel,
}

fn choose_strategy(missing_count: usize) -> Strategy {
  if missing_count <= 1 { Strategy::Streaming } else { Strategy::Parallel }
}

#[derive(Debug, Clone)]
pub struct NodeOutcome {
  pub node: String,
  pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
  pub distributed: bool,
  pub outcomes: Vec<NodeOutcome>,
}

fn sanitize_image_ref(image_ref: &str) -> String {
  image_ref
    .chars()
    .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
    .collect()
}

/// Ensures `image_ref` is present on every server in `workers`, pulling it
/// from `manager` (where it was built) as needed. Returns whether any
/// transfer actually happened, plus a per-node report — a failure on one
/// worker never aborts the others (§4.6 step 4).
pub async fn ensure_image_on_all_nodes(
  manager: &Server,
  workers: &[Server],
  image_ref: &str,
  pool: &SessionPool,
) -> anyhow::Result<DistributionReport> {
  let manager_session = pool.get(manager).await?;

  let probes = join_all(workers.iter().map(|worker| async move {
    let session = pool.get(worker).await?;
    let out = session
      .execute(&format!("docker image inspect {} >/dev/null 2>&1", command::quote(image_ref)))
      .await?;
    anyhow::Ok((worker.clone(), out.success))
  }))
  .await;

  let mut missing = Vec::new();
  for probe in probes {
    let (worker, present) = probe?;
    if !present {
      missing.push(worker);
    }
  }

  if missing.is_empty() {
    return Ok(DistributionReport { distributed: false, outcomes: vec![] });
  }

  let strategy = choose_strategy(missing.len());
  info!(
    "distributing '{image_ref}' to {} node(s) via {strategy:?}",
    missing.len()
  );

  let outcomes = match strategy {
    Strategy::Streaming => {
      stream_sequentially(&manager_session, &missing, image_ref, pool).await
    }
    Strategy::Parallel => {
      distribute_via_staged_tar(&manager_session, &missing, image_ref, pool).await
    }
  };

  Ok(DistributionReport { distributed: true, outcomes })
}

async fn stream_sequentially(
  manager_session: &transport::Session,
  missing: &[Server],
  image_ref: &str,
  pool: &SessionPool,
) -> Vec<NodeOutcome> {
  let mut outcomes = Vec::with_capacity(missing.len());
  for worker in missing {
    let result = stream_one(manager_session, worker, image_ref, pool).await;
    outcomes.push(NodeOutcome {
      node: worker.name.clone(),
      error: result.err().map(|e| format!("{e:#}")),
    });
  }
  outcomes
}

async fn stream_one(
  manager_session: &transport::Session,
  worker: &Server,
  image_ref: &str,
  pool: &SessionPool,
) -> anyhow::Result<()> {
  let (mut stdout, _stderr) = manager_session
    .spawn_reader(&format!("docker save {}", command::quote(image_ref)))
    .await
    .context("failed to start docker save on manager")?;

  let worker_session = pool.get(worker).await?;
  let mut upload = worker_session
    .start_streaming_upload("docker load")
    .await
    .with_context(|| format!("failed to start docker load on '{}'", worker.name))?;

  upload.pipe_from(&mut stdout).await?;
  let out = upload.finish().await?;
  if !out.success {
    anyhow::bail!("docker load failed on '{}'", worker.name);
  }
  Ok(())
}

async fn distribute_via_staged_tar(
  manager_session: &transport::Session,
  missing: &[Server],
  image_ref: &str,
  pool: &SessionPool,
) -> Vec<NodeOutcome> {
  let tar_path = format!("/tmp/tako_image_{}.tar", sanitize_image_ref(image_ref));

  let save = manager_session
    .execute(&format!(
      "docker save -o {} {}",
      command::quote(&tar_path),
      command::quote(image_ref)
    ))
    .await;

  let staged = match save {
    Ok(out) if out.success => true,
    Ok(out) => {
      warn!("failed to stage image tar on manager: {}", out.stderr.trim());
      false
    }
    Err(e) => {
      warn!("failed to stage image tar on manager: {e:#}");
      false
    }
  };

  let outcomes = if staged {
    join_all(missing.iter().map(|worker| {
      load_from_staged_tar(manager_session, worker, &tar_path, pool)
    }))
    .await
  } else {
    missing
      .iter()
      .map(|worker| NodeOutcome {
        node: worker.name.clone(),
        error: Some("manager failed to stage image tar".to_string()),
      })
      .collect()
  };

  let cleanup = manager_session
    .execute(&format!("rm -f {}", command::quote(&tar_path)))
    .await;
  if let Err(e) = cleanup {
    warn!("failed to remove staged image tar on manager: {e:#}");
  }

  outcomes
}

async fn load_from_staged_tar(
  manager_session: &transport::Session,
  worker: &Server,
  tar_path: &str,
  pool: &SessionPool,
) -> NodeOutcome {
  let result: anyhow::Result<()> = async {
    let (mut stdout, _stderr) = manager_session
      .spawn_reader(&format!("cat {}", command::quote(tar_path)))
      .await
      .context("failed to read staged tar on manager")?;

    let worker_session = pool.get(worker).await?;
    let mut upload = worker_session
      .start_streaming_upload("docker load")
      .await
      .with_context(|| format!("failed to start docker load on '{}'", worker.name))?;

    upload.pipe_from(&mut stdout).await?;
    let out = upload.finish().await?;
    if !out.success {
      anyhow::bail!("docker load failed on '{}'", worker.name);
    }
    Ok(())
  }
  .await;

  NodeOutcome { node: worker.name.clone(), error: result.err().map(|e| format!("{e:#}")) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn streaming_chosen_for_a_single_missing_node() {
    assert_eq!(choose_strategy(1), Strategy::Streaming);
    assert_eq!(choose_strategy(0), Strategy::Streaming);
  }

  #[test]
  fn parallel_chosen_for_multiple_missing_nodes() {
    assert_eq!(choose_strategy(2), Strategy::Parallel);
    assert_eq!(choose_strategy(5), Strategy::Parallel);
  }

  #[test]
  fn sanitizes_image_ref_for_tar_filename() {
    assert_eq!(sanitize_image_ref("registry.example.com/app:1.2.3"), "registry.example.com_app_1.2.3");
  }
}
