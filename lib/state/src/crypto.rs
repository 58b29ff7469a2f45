use anyhow::{Context, Result, anyhow};
use chacha20poly1305::{
  ChaCha20Poly1305, Key, KeyInit, Nonce,
  aead::{Aead, OsRng},
};
use rand::RngCore;

use crate::StatePaths;

const NONCE_LEN: usize = 12;

/// The cluster state file carries Swarm join tokens, which are
/// bearer credentials for adding a node to the cluster — anyone who
/// reads `cluster-state.json` off disk or a backup gets them in
/// plaintext otherwise. We encrypt the file at rest with a key that
/// never leaves this host, generated on first use.
pub struct ClusterStateCipher {
  cipher: ChaCha20Poly1305,
}

impl ClusterStateCipher {
  pub async fn load_or_create(paths: &StatePaths) -> Result<Self> {
    let key_path = paths.root().join(".keyring");
    let key_bytes = match tokio::fs::read(&key_path).await {
      Ok(bytes) if bytes.len() == 32 => bytes,
      _ => {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        if let Some(parent) = key_path.parent() {
          tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&key_path, key).await.with_context(|| {
          format!("failed to write keyring to {}", key_path.display())
        })?;
        set_owner_only_permissions(&key_path).await?;
        key.to_vec()
      }
    };

    let key = Key::from_slice(&key_bytes);
    Ok(Self { cipher: ChaCha20Poly1305::new(key) })
  }

  pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    // Encryption with a freshly-random nonce cannot fail.
    let ciphertext = self.cipher.encrypt(nonce, plaintext).expect("encrypt");
    [nonce_bytes.as_slice(), ciphertext.as_slice()].concat()
  }

  pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
      return Err(anyhow!("encrypted cluster state is truncated"));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    self
      .cipher
      .decrypt(nonce, ciphertext)
      .map_err(|_| anyhow!("failed to decrypt cluster state (wrong or missing keyring?)"))
  }
}

#[cfg(unix)]
async fn set_owner_only_permissions(path: &std::path::Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  let permissions = std::fs::Permissions::from_mode(0o600);
  tokio::fs::set_permissions(path, permissions)
    .await
    .with_context(|| format!("failed to chmod {}", path.display()))
}

#[cfg(not(unix))]
async fn set_owner_only_permissions(_path: &std::path::Path) -> Result<()> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[tokio::test]
  async fn encrypt_then_decrypt_roundtrips() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let cipher = ClusterStateCipher::load_or_create(&paths).await.unwrap();

    let plaintext = b"{\"manager_token\":\"swmtkn-1-...\"}";
    let ciphertext = cipher.encrypt(plaintext);
    assert_ne!(ciphertext, plaintext);

    let decrypted = cipher.decrypt(&ciphertext).unwrap();
    assert_eq!(decrypted, plaintext);
  }

  #[tokio::test]
  async fn reloading_cipher_reuses_persisted_key() {
    let dir = tempdir().unwrap();
    let paths = StatePaths::new(dir.path());

    let cipher_a = ClusterStateCipher::load_or_create(&paths).await.unwrap();
    let ciphertext = cipher_a.encrypt(b"hello");

    let cipher_b = ClusterStateCipher::load_or_create(&paths).await.unwrap();
    assert_eq!(cipher_b.decrypt(&ciphertext).unwrap(), b"hello");
  }
}
