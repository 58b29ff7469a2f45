use model::{Placement, PlacementStrategy};

/// Compiles a service's [`Placement`] into `docker service create/update`
/// constraint/preference flags (§4.12). `global` mode itself is handled
/// by the caller (it's a `--mode` flag, not a placement flag) — this
/// only ever emits `--constraint`/`--placement-pref`.
pub fn compile(placement: &Placement) -> anyhow::Result<String> {
  let mut flags = String::new();

  match placement.strategy {
    PlacementStrategy::Spread => {
      flags.push_str(" --placement-pref 'spread=node.hostname'");
    }
    PlacementStrategy::Pinned => {
      if placement.pinned_hosts.is_empty() {
        anyhow::bail!("placement strategy is 'pinned' but no hosts were listed");
      }
      for host in &placement.pinned_hosts {
        flags.push_str(&format!(
          " --constraint {}",
          command::quote(&format!("node.hostname=={host}"))
        ));
      }
    }
    PlacementStrategy::Global | PlacementStrategy::Any => {}
  }

  for constraint in &placement.constraints {
    flags.push_str(&format!(" --constraint {}", command::quote(constraint)));
  }
  for preference in &placement.preferences {
    flags.push_str(&format!(" --placement-pref {}", command::quote(preference)));
  }

  Ok(flags)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn spread_emits_hostname_preference() {
    let placement = Placement { strategy: PlacementStrategy::Spread, ..Default::default() };
    assert!(compile(&placement).unwrap().contains("spread=node.hostname"));
  }

  #[test]
  fn pinned_emits_one_constraint_per_host() {
    let placement = Placement {
      strategy: PlacementStrategy::Pinned,
      pinned_hosts: vec!["host-a".into(), "host-b".into()],
      ..Default::default()
    };
    let flags = compile(&placement).unwrap();
    assert!(flags.contains("node.hostname==host-a"));
    assert!(flags.contains("node.hostname==host-b"));
  }

  #[test]
  fn pinned_with_no_hosts_is_an_error() {
    let placement = Placement { strategy: PlacementStrategy::Pinned, ..Default::default() };
    assert!(compile(&placement).is_err());
  }

  #[test]
  fn global_emits_no_placement_flags() {
    let placement = Placement { strategy: PlacementStrategy::Global, ..Default::default() };
    assert_eq!(compile(&placement).unwrap(), "");
  }

  #[test]
  fn arbitrary_constraints_are_appended_verbatim() {
    let placement = Placement {
      constraints: vec!["node.labels.zone==eu".into()],
      ..Default::default()
    };
    assert!(compile(&placement).unwrap().contains("node.labels.zone==eu"));
  }
}
