//! TLS setup for the feed connection.
//!
//! By default the WebSocket connector trusts the bundled web PKI roots.
//! When a CA file is configured, [`build_tls_config`] builds a
//! [`rustls::ClientConfig`] whose root store contains only that CA.

use std::path::Path;
use std::sync::Arc;

use rustls::ClientConfig;
use tracing::debug;

use crate::{Result, StreamError};

/// Installs the `ring` crypto provider as the process default.
///
/// Safe to call more than once; later calls are no-ops.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("Crypto provider already installed");
    }
}

/// Builds a [`ClientConfig`] whose root store contains only the CA
/// certificates found in the PEM file at `ca_path`.
///
/// # Errors
///
/// Returns [`StreamError::Io`] if the file cannot be read, or
/// [`StreamError::Tls`] if it holds no parsable certificate.
pub fn build_tls_config(ca_path: &Path) -> Result<Arc<ClientConfig>> {
    install_crypto_provider();
    let pem = std::fs::read(ca_path)?;
    build_tls_config_from_pem(&pem)
}

/// Same as [`build_tls_config`] for PEM bytes already in memory.
///
/// # Errors
///
/// Returns [`StreamError::Tls`] if the PEM cannot be parsed or contains no
/// certificate.
pub fn build_tls_config_from_pem(pem: &[u8]) -> Result<Arc<ClientConfig>> {
    let mut root_store = rustls::RootCertStore::empty();

    let certs: Vec<_> = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StreamError::Tls(format!("failed to parse CA PEM: {e}")))?;

    let (added, _ignored) = root_store.add_parsable_certificates(certs);
    if added == 0 {
        return Err(StreamError::Tls("no usable CA certificate in PEM".to_string()));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pem_is_rejected() {
        install_crypto_provider();
        assert!(matches!(
            build_tls_config_from_pem(b""),
            Err(StreamError::Tls(_))
        ));
    }

    #[test]
    fn install_is_idempotent() {
        install_crypto_provider();
        install_crypto_provider();
    }
}
