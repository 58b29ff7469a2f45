//! Client-side TLS connect-and-inspect for the HTTPS probe (§4.13d): dial
//! the domain on 443, complete a real `rustls` handshake against the
//! native trust store, and pull issuer CN / notAfter out of the leaf
//! certificate the peer presented.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCertInfo {
  pub issuer_cn: String,
  pub not_after: String,
}

pub async fn fetch_cert_info(domain: &str) -> anyhow::Result<TlsCertInfo> {
  let connector = connector()?;
  let server_name = ServerName::try_from(domain.to_string())
    .map_err(|_| anyhow!("'{domain}' is not a valid DNS name for TLS verification"))?;

  let tcp = timeout(CONNECT_TIMEOUT, TcpStream::connect((domain, 443)))
    .await
    .context("timed out connecting")?
    .with_context(|| format!("failed to open a TCP connection to '{domain}:443'"))?;

  let stream = timeout(CONNECT_TIMEOUT, connector.connect(server_name, tcp))
    .await
    .context("timed out during TLS handshake")?
    .with_context(|| format!("TLS handshake with '{domain}' failed"))?;

  let (_, conn) = stream.get_ref();
  let certs = conn
    .peer_certificates()
    .filter(|certs| !certs.is_empty())
    .context("server presented no certificates")?;
  let leaf = &certs[0];

  let (_, parsed) = X509Certificate::from_der(leaf.as_ref()).context("failed to parse leaf certificate")?;

  let issuer_cn = parsed
    .issuer()
    .iter_common_name()
    .next()
    .and_then(|cn| cn.as_str().ok())
    .unwrap_or("unknown")
    .to_string();
  let not_after = parsed.validity().not_after.to_string();

  Ok(TlsCertInfo { issuer_cn, not_after })
}

fn connector() -> anyhow::Result<TlsConnector> {
  let mut root_store = rustls::RootCertStore::empty();
  let native = rustls_native_certs::load_native_certs();
  for cert in native.certs {
    root_store.add(cert).ok();
  }
  if root_store.is_empty() {
    anyhow::bail!("no native root certificates could be loaded");
  }

  let config = rustls::ClientConfig::builder()
    .with_root_certificates(root_store)
    .with_no_client_auth();
  Ok(TlsConnector::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn invalid_domain_is_rejected_before_connecting() {
    let err = ServerName::try_from("not a domain!!".to_string());
    assert!(err.is_err());
  }

  #[test]
  fn connector_builds_with_native_roots() {
    assert!(connector().is_ok());
  }
}
