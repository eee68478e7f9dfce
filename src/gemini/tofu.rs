//! Trust-on-first-use certificate handling
//!
//! The first certificate a host presents is pinned; later connections to
//! the same host must present the identical certificate or the handshake
//! is rejected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

/// Process-wide store of pinned server certificates, keyed by hostname.
/// Shared by every visitor and the seeder's robots client.
#[derive(Debug, Clone, Default)]
pub struct CertStore {
    inner: Arc<Mutex<HashMap<String, CertificateDer<'static>>>>,
}

impl CertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a certificate has been pinned for this host
    pub fn contains(&self, host: &str) -> bool {
        self.lock().contains_key(host)
    }

    /// Pins the certificate on first sight; afterwards requires the
    /// presented certificate to match the pinned one byte for byte.
    pub fn observe(
        &self,
        host: &str,
        cert: &CertificateDer<'_>,
    ) -> Result<(), rustls::Error> {
        let mut map = self.lock();
        match map.get(host) {
            Some(pinned) if pinned.as_ref() == cert.as_ref() => Ok(()),
            Some(_) => Err(rustls::Error::General(format!(
                "certificate for {} changed since first use",
                host
            ))),
            None => {
                map.insert(host.to_string(), cert.clone().into_owned());
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CertificateDer<'static>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Certificate verifier pinning the first certificate seen per host.
///
/// Constructed per connection with the hostname already resolved, so the
/// pinning key never depends on what the server presents.
#[derive(Debug)]
pub struct TofuVerifier {
    host: String,
    store: CertStore,
}

impl TofuVerifier {
    pub fn new(host: &str, store: CertStore) -> Self {
        Self {
            host: host.to_string(),
            store,
        }
    }
}

impl ServerCertVerifier for TofuVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        self.store.observe(&self.host, end_entity)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
