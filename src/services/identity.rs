use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDateTime;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// External authentication service. The core never sees stored credentials;
/// it only asks whether an email/password pair is valid.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_credentials(&self, email: &str, password: &str) -> anyhow::Result<bool>;
}

/// Talks to a hosted auth endpoint (password grant). Any 2xx means the
/// credentials were accepted; 400/401/403 means they were not.
pub struct HttpIdentityProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_credentials(&self, email: &str, password: &str) -> anyhow::Result<bool> {
        let url = format!("{}/token?grant_type=password", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("failed to reach identity service")?;

        match response.status() {
            s if s.is_success() => Ok(true),
            s if s == 400 || s == 401 || s == 403 => Ok(false),
            _ => {
                response
                    .error_for_status()
                    .context("identity service returned error")?;
                Ok(false)
            }
        }
    }
}

// ── Session tokens ──
//
// Once the identity service accepts the credentials, the core issues its own
// signed token carrying the barber id and an expiry. Validation checks the
// signature and the clock, nothing else; there is no server-side session
// table to clean up.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub barber_id: String,
    pub expires_at: NaiveDateTime,
}

pub fn issue_token(barber_id: &str, now: NaiveDateTime, ttl_hours: i64, secret: &str) -> String {
    let expires_at = now + chrono::Duration::hours(ttl_hours);
    let payload = format!("{barber_id}|{}", expires_at.and_utc().timestamp());
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!("{}.{}", engine.encode(&payload), sign(&payload, secret))
}

pub fn validate_token(token: &str, secret: &str, now: NaiveDateTime) -> Option<Session> {
    let (payload_b64, signature) = token.split_once('.')?;

    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let payload_bytes = engine.decode(payload_b64).ok()?;
    let payload = String::from_utf8(payload_bytes).ok()?;

    if sign(&payload, secret) != signature {
        return None;
    }

    let (barber_id, expiry_str) = payload.rsplit_once('|')?;
    let expires_at = chrono::DateTime::from_timestamp(expiry_str.parse().ok()?, 0)?.naive_utc();

    if expires_at <= now {
        return None;
    }

    Some(Session {
        barber_id: barber_id.to_string(),
        expires_at,
    })
}

fn sign(payload: &str, secret: &str) -> String {
    let mut mac = match Hmac::<Sha1>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(payload.as_bytes());
    let result = mac.finalize().into_bytes();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(result)
}
