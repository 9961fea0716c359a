use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::{
    HttpRequest,
    cookie::{Cookie, SameSite, time::Duration},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::{auth::auth::Identity, config::Config, models::SessionClaims};

pub const SESSION_COOKIE: &str = "autospa_session";

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

/// Signs a session for `identity`, valid for `ttl` seconds.
pub fn issue_session(identity: &Identity, secret: &str, ttl: usize) -> Result<String, Error> {
    let issued_at = now();
    let claims = SessionClaims {
        user_id: identity.user_id,
        sub: identity.username.clone(),
        role: identity.role,
        iat: issued_at,
        exp: issued_at + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verifies signature and expiry, returning the identity it carries.
pub fn verify_session(token: &str, secret: &str) -> Result<Identity, Error> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(Identity {
        user_id: data.claims.user_id,
        username: data.claims.sub,
        role: data.claims.role,
    })
}

/// Reads and verifies the session cookie. Absent, tampered and expired
/// sessions all resolve to `None`.
pub fn identity_from_request(req: &HttpRequest, config: &Config) -> Option<Identity> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    match verify_session(cookie.value(), &config.session_secret) {
        Ok(identity) => Some(identity),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session cookie");
            None
        }
    }
}

pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(config.session_ttl as i64))
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}
