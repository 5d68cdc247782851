//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("cant read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid PEM in {path}: {source}")]
    Pem {
        path: String,
        source: std::io::Error,
    },

    #[error("cant build TLS config: {0}")]
    Config(std::io::Error),
}

fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Load TLS configuration from certificate and key files.
///
/// Both files are read and checked before the listener binds, so a broken
/// pair fails startup instead of the first handshake.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let cert = read(cert_path)?;
    let key = read(key_path)?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(cert.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: cert_path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(cert_path.display().to_string()));
    }

    let private_key = rustls_pemfile::private_key(&mut BufReader::new(key.as_slice()))
        .map_err(|source| TlsError::Pem {
            path: key_path.display().to_string(),
            source,
        })?;
    if private_key.is_none() {
        return Err(TlsError::NoPrivateKey(key_path.display().to_string()));
    }

    tracing::debug!(certificates = certs.len(), cert = %cert_path.display(), "loaded TLS material");
    RustlsConfig::from_pem(cert, key).await.map_err(TlsError::Config)
}
