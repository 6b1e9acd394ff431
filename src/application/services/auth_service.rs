//! Signed-cookie owner identification.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::domain::entities::OwnerId;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the signed owner id.
pub const OWNER_COOKIE: &str = "shorturl_token";

/// Owner attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOwner {
    pub owner_id: OwnerId,
    /// Cookie value to hand back when the owner was issued just now.
    pub issued_token: Option<String>,
}

/// Resolves the owner of a request, issuing a new identity when needed.
///
/// Handlers only see the resulting [`OwnerId`]; the token format stays
/// behind this trait.
pub trait OwnerResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> ResolvedOwner;
}

/// Owner resolution through an HMAC-SHA256 signed cookie.
///
/// The token is `base64url(uuid) "." base64url(hmac(uuid))`. A missing,
/// malformed or badly signed token yields a fresh v4 owner id together with
/// a new token.
#[derive(Clone)]
pub struct AuthService {
    mac: HmacSha256,
}

impl AuthService {
    /// # Errors
    ///
    /// Returns an error if the key is rejected by the MAC.
    pub fn new(signature_key: &str) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(signature_key.as_bytes())?,
        })
    }

    fn signature(&self, owner_id: &OwnerId) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(owner_id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Builds the cookie value for `owner_id`.
    pub fn issue_token(&self, owner_id: &OwnerId) -> String {
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(owner_id.as_bytes()),
            URL_SAFE_NO_PAD.encode(self.signature(owner_id))
        )
    }

    /// Returns the owner id inside `token` if its signature checks out.
    pub fn verify_token(&self, token: &str) -> Option<OwnerId> {
        let (owner_part, signature_part) = token.split_once('.')?;

        let owner_bytes = URL_SAFE_NO_PAD.decode(owner_part).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature_part).ok()?;
        let owner_id = Uuid::from_slice(&owner_bytes).ok()?;

        let mut mac = self.mac.clone();
        mac.update(owner_id.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(owner_id)
    }
}

impl OwnerResolver for AuthService {
    fn resolve(&self, headers: &HeaderMap) -> ResolvedOwner {
        if let Some(owner_id) = owner_token(headers).and_then(|token| self.verify_token(&token)) {
            return ResolvedOwner {
                owner_id,
                issued_token: None,
            };
        }

        let owner_id = Uuid::new_v4();
        debug!("Issuing new owner id {}", owner_id);

        ResolvedOwner {
            owner_id,
            issued_token: Some(self.issue_token(&owner_id)),
        }
    }
}

fn owner_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|cookie_header| cookie_header.to_str().ok())
        .flat_map(|cookie_str| cookie_str.split(';'))
        .find_map(|cookie| {
            let mut parts = cookie.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(OWNER_COOKIE), Some(value)) => Some(value.to_string()),
                _ => None,
            }
        })
}
