use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use crate::tprintln;

use super::role::{AccountStatus, Role};
use super::AuthError;
use crate::storage::UserRecord;

pub type SessionToken = String;

/// Issuer claim stamped on every token and required on verification.
pub const TOKEN_ISSUER: &str = "matchdesk";

/// Authenticated identity plus role claim. Immutable once issued; a status
/// refresh produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subject: String,
    pub role: Role,
    pub status: AccountStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

    pub fn with_status(&self, status: AccountStatus) -> Session {
        Session { status, ..self.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
    role: Role,
    status: AccountStatus,
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    pub ttl: Duration,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer").field("ttl_secs", &self.ttl.num_seconds()).finish_non_exhaustive()
    }
}

impl SessionIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issue a session for `rec` as of `now`. The role is copied verbatim
    /// from the record.
    pub fn issue(&self, rec: &UserRecord, now: DateTime<Utc>) -> Result<(Session, SessionToken), AuthError> {
        let session = Session {
            subject: rec.username.clone(),
            role: rec.role,
            status: rec.status,
            issued_at: second_precision(now),
            expires_at: second_precision(now + self.ttl),
        };
        let token = self.sign(&session)?;
        tprintln!("session.issue user={} role={} ttl_secs={}", session.subject, session.role, self.ttl.num_seconds());
        Ok((session, token))
    }

    fn sign(&self, session: &Session) -> Result<SessionToken, AuthError> {
        let claims = Claims {
            sub: session.subject.clone(),
            iss: TOKEN_ISSUER.to_string(),
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
            role: session.role,
            status: session.status,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Check signature, issuer and expiry, then rebuild the session from the
    /// claims.
    pub fn decode(&self, token: &str) -> Result<Session, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::SessionExpired,
            _ => AuthError::MalformedSession,
        })?;
        let c = data.claims;
        if c.sub.is_empty() { return Err(AuthError::MalformedSession); }
        let issued_at = Utc.timestamp_opt(c.iat, 0).single().ok_or(AuthError::MalformedSession)?;
        let expires_at = Utc.timestamp_opt(c.exp, 0).single().ok_or(AuthError::MalformedSession)?;
        let session = Session { subject: c.sub, role: c.role, status: c.status, issued_at, expires_at };
        // jsonwebtoken accepts exp == now; a session is already dead at its expiry instant.
        if session.is_expired_at(Utc::now()) { return Err(AuthError::SessionExpired); }
        Ok(session)
    }

    /// Malformed, tampered and expired tokens all collapse to `None`.
    pub fn verify(&self, token: &str) -> Option<Session> { self.decode(token).ok() }
}

fn second_precision(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(t.timestamp(), 0).single().unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer { SessionIssuer::new(b"0123456789abcdef0123456789abcdef", Duration::hours(1)) }

    fn record(role: Role) -> UserRecord { UserRecord::new("ana", "phc".into(), role, None) }

    #[test]
    fn issue_then_verify_round_trips_claims() {
        let iss = issuer();
        let (s, tok) = iss.issue(&record(Role::Ktv), Utc::now()).unwrap();
        let back = iss.verify(&tok).expect("valid token");
        assert_eq!(back, s);
        assert_eq!(back.role, Role::Ktv);
        assert_eq!(back.subject, "ana");
    }

    #[test]
    fn expired_token_is_rejected() {
        let iss = issuer();
        let (_, tok) = iss.issue(&record(Role::Admin), Utc::now() - Duration::hours(2)).unwrap();
        assert!(matches!(iss.decode(&tok), Err(AuthError::SessionExpired)));
        assert!(iss.verify(&tok).is_none());
    }

    #[test]
    fn wrong_key_and_tampering_are_rejected() {
        let iss = issuer();
        let (_, tok) = iss.issue(&record(Role::Ktv), Utc::now()).unwrap();
        let other = SessionIssuer::new(b"another-secret-another-secret-xx", Duration::hours(1));
        assert!(other.verify(&tok).is_none());

        // Splice an admin payload onto the ktv token's signature.
        let (_, admin_tok) = iss.issue(&record(Role::Admin), Utc::now()).unwrap();
        let ktv: Vec<&str> = tok.split('.').collect();
        let admin: Vec<&str> = admin_tok.split('.').collect();
        let forged = format!("{}.{}.{}", ktv[0], admin[1], ktv[2]);
        assert!(matches!(iss.decode(&forged), Err(AuthError::MalformedSession)));
    }

    #[test]
    fn garbage_never_panics() {
        let iss = issuer();
        for t in ["", ".", "a.b.c", "not a token", "eyJhbGciOiJub25lIn0.e30."] {
            assert!(iss.verify(t).is_none(), "token {:?} must not verify", t);
        }
    }

    #[test]
    fn unknown_role_claim_still_decodes_as_unknown() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let iss = SessionIssuer::new(secret, Duration::hours(1));
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "sub": "ana", "iss": TOKEN_ISSUER, "iat": now, "exp": now + 600,
            "role": "superuser", "status": "active"
        });
        let tok = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap();
        let s = iss.verify(&tok).expect("signature is valid");
        assert_eq!(s.role, Role::Unknown);
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let iss = SessionIssuer::new(secret, Duration::hours(1));
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "sub": "ana", "iss": "someone-else", "iat": now, "exp": now + 600,
            "role": "admin", "status": "active"
        });
        let tok = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap();
        assert!(iss.verify(&tok).is_none());
    }
}
