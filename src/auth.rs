//! Credential checks and the signed session cookie.
//!
//! Two accounts are compiled in for demo access and never persisted; every
//! other account lives in the user tree. Stored passwords are plaintext on
//! purpose: this mirrors the tool being replaced and hardening is out of
//! scope. The session is a JWT carried in an HttpOnly cookie.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::models::{Role, SessionClaims};
use crate::storage::{Storage, StoreResult};

const DEFAULT_SECRET: &[u8] = b"change-this-in-production";
const SESSION_TTL_SECS: usize = 8 * 3600;

pub const SESSION_COOKIE: &str = "session";

/// Fixed demo accounts, checked before the user collection.
const BUILT_IN: [(&str, &str, Role); 2] = [
    ("admin", "admin123", Role::Admin),
    ("user", "user123", Role::User),
];

fn secret() -> Vec<u8> {
    std::env::var("SECRET_KEY")
        .map(String::into_bytes)
        .unwrap_or_else(|_| DEFAULT_SECRET.to_vec())
}

/// Check a credential pair: built-in table first (exact match on both
/// fields), then the user collection. Built-in accounts carry empty grants,
/// i.e. unrestricted access within their role.
pub fn authenticate(
    storage: &Storage,
    username: &str,
    password: &str,
) -> StoreResult<Option<SessionClaims>> {
    for (name, pass, role) in BUILT_IN {
        if username == name && password == pass {
            return Ok(Some(new_claims(username, role, Default::default(), vec![])));
        }
    }

    match storage.find_user_by_username(username)? {
        Some(user) if user.password == password => Ok(Some(new_claims(
            &user.username,
            user.role,
            user.location_permissions,
            user.column_permissions,
        ))),
        _ => Ok(None),
    }
}

fn new_claims(
    username: &str,
    role: Role,
    location_permissions: crate::models::LocationPermissions,
    column_permissions: Vec<String>,
) -> SessionClaims {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0);
    SessionClaims {
        sub: username.to_string(),
        role,
        location_permissions,
        column_permissions,
        exp: now + SESSION_TTL_SECS,
    }
}

pub fn create_session_token(
    claims: &SessionClaims,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(&secret()),
    )
}

pub fn validate_session_token(token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(&secret()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Set-Cookie value establishing a session.
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// Set-Cookie value destroying the session.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Pull the session token out of a Cookie header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}
