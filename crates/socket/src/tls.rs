// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use aerospike_types::config::TlsConfig;
use aerospike_types::ClientError;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::ClientConfig;
use rustls::DigitallySignedStruct;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::ServerName;
use rustls_pki_types::UnixTime;
use sha2::Digest;
use sha2::Sha256;

/// Builds a fresh `rustls::ClientConfig` from a `TlsConfig`. Called once per
/// connection attempt rather than cached; nodes rarely churn TLS material
/// often enough for that to matter, and it keeps this module state-free.
pub fn build_client_config(config: &TlsConfig) -> error_stack::Result<Arc<ClientConfig>, ClientError> {
    let mut roots = RootCertStore::empty();
    if let Some(ca_file) = &config.ca_file {
        for cert in load_certs(ca_file)? {
            roots
                .add(cert)
                .map_err(|e| parameter_err(format!("invalid CA certificate in {ca_file:?}: {e}")))?;
        }
    } else {
        roots.extend(webpki_roots_certs());
    }

    let builder = if config.cert_blacklist.is_empty() {
        ClientConfig::builder().with_root_certificates(roots)
    } else {
        let inner = WebPkiServerVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| parameter_err(format!("failed to build certificate verifier: {e}")))?;
        let verifier = Arc::new(BlacklistVerifier {
            inner,
            blacklist: config.cert_blacklist.clone(),
        });
        ClientConfig::builder().dangerous().with_custom_certificate_verifier(verifier)
    };

    let config = match (&config.cert_file, &config.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let certs = load_certs(cert_file)?;
            let key = load_key(key_file)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| parameter_err(format!("invalid client certificate/key pair: {e}")))?
        }
        _ => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

fn load_certs(path: &str) -> error_stack::Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path).map_err(|e| parameter_err(format!("failed to open {path:?}: {e}")))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parameter_err(format!("failed to parse certificates in {path:?}: {e}")))
}

fn load_key(path: &str) -> error_stack::Result<PrivateKeyDer<'static>, ClientError> {
    let file = File::open(path).map_err(|e| parameter_err(format!("failed to open {path:?}: {e}")))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| parameter_err(format!("failed to parse private key in {path:?}: {e}")))?
        .ok_or_else(|| error_stack::Report::new(parameter_err(format!("no private key found in {path:?}"))))
}

fn webpki_roots_certs() -> impl Iterator<Item = rustls::pki_types::TrustAnchor<'static>> {
    webpki_roots::TLS_SERVER_ROOTS.iter().cloned()
}

fn parameter_err(message: String) -> ClientError {
    ClientError::parameter(message)
}

/// Wraps the standard webpki chain/hostname check with a SHA-256 fingerprint
/// blacklist, so a cert can be rejected even when it chains to a trusted root
/// (a compromised or rotated-out node certificate, typically).
struct BlacklistVerifier {
    inner: Arc<WebPkiServerVerifier>,
    blacklist: Vec<String>,
}

impl fmt::Debug for BlacklistVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlacklistVerifier").field("blacklist_len", &self.blacklist.len()).finish()
    }
}

impl ServerCertVerifier for BlacklistVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let fingerprint = hex_fingerprint(&Sha256::digest(end_entity.as_ref()));
        if self.blacklist.iter().any(|blocked| blocked.eq_ignore_ascii_case(&fingerprint)) {
            return Err(rustls::Error::General(format!("certificate {fingerprint} is blacklisted")));
        }
        self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn hex_fingerprint(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
