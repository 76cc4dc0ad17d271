//! Certificate Introspector (component B, §4.2).
//!
//! The TLS session itself is out of scope; we only need its peer
//! certificate chain, which callers provide through [`PeerCertificateSource`].
//! DER parsing and DN attribute extraction use `x509-parser`, the
//! standard ecosystem crate for inspecting certificates without pulling
//! in a second TLS stack.

use x509_parser::oid_registry::Oid;
use x509_parser::prelude::*;

use crate::error::CertError;
use crate::session::WorkerSession;

/// Abstraction over "give me the peer's DER-encoded certificate chain",
/// the one fact this component needs from the (out-of-scope) TLS session.
pub trait PeerCertificateSource {
    /// Returns the peer's certificate chain, leaf first, or `None` if the
    /// client presented no certificate.
    fn peer_certificate_chain(&self) -> Option<&[Vec<u8>]>;
}

/// §4.2: populate `cert_username`/`cert_groups` from the peer leaf
/// certificate's DN, idempotently.
pub fn get_cert_info(
    session: &mut WorkerSession,
    source: &dyn PeerCertificateSource,
) -> Result<(), CertError> {
    if session.cert_info_populated() {
        return Ok(());
    }

    let chain = source
        .peer_certificate_chain()
        .filter(|c| !c.is_empty())
        .ok_or(CertError::NoCertificate)?;

    let leaf_der = &chain[0];
    let (_, leaf) =
        X509Certificate::from_der(leaf_der).map_err(|_| CertError::CouldNotReadCertificate)?;

    session.cert_username = Some(extract_username(&leaf, session_user_oid(session).as_ref()));
    session.cert_groups = extract_groups(&leaf, session_group_oid(session).as_ref());
    session.cert_auth_ok = true;

    Ok(())
}

fn session_user_oid(session: &WorkerSession) -> Option<String> {
    session.config.cert_user_oid.clone()
}

fn session_group_oid(session: &WorkerSession) -> Option<String> {
    session.config.cert_group_oid.clone()
}

fn extract_username(cert: &X509Certificate<'_>, user_oid: Option<&String>) -> String {
    match user_oid.and_then(|s| parse_oid(s)) {
        Some(oid) => first_attribute_value(cert, &oid).unwrap_or_default(),
        None => cert.subject().to_string(),
    }
}

fn extract_groups(cert: &X509Certificate<'_>, group_oid: Option<&String>) -> Vec<String> {
    let Some(oid) = group_oid.and_then(|s| parse_oid(s)) else {
        return Vec::new();
    };

    cert.subject()
        .iter_by_oid(&oid)
        .filter_map(|attr| attr.as_str().ok().map(|s| s.to_string()))
        .collect()
}

fn first_attribute_value(cert: &X509Certificate<'_>, oid: &Oid<'_>) -> Option<String> {
    cert.subject()
        .iter_by_oid(oid)
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(|s| s.to_string())
}

fn parse_oid(dotted: &str) -> Option<Oid<'static>> {
    // Accept either a short well-known alias ("CN"), since gateway configs
    // are typically written by hand, or a dotted-decimal OID ("2.5.4.3").
    match dotted {
        "CN" => return Some(x509_parser::oid_registry::OID_X509_COMMON_NAME.clone()),
        "O" => return Some(x509_parser::oid_registry::OID_X509_ORGANIZATION_NAME.clone()),
        "OU" => return Some(x509_parser::oid_registry::OID_X509_ORGANIZATIONAL_UNIT.clone()),
        "emailAddress" => {
            return Some(x509_parser::oid_registry::OID_PKCS9_EMAIL_ADDRESS.clone());
        }
        _ => {}
    }

    dotted.parse::<Oid<'static>>().ok()
}
