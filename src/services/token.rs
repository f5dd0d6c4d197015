//! Credential codec
//!
//! A stored credential is `BASE64(JSON session)` followed by `.` and a
//! base64url HMAC-SHA256 tag computed over the first segment. Decoding checks
//! the tag before looking at the payload; expiry is left to the caller.

use crate::models::Session;
use data_encoding::{BASE64, BASE64URL_NOPAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Error types for credential decoding
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Structure, base64 or JSON is wrong
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// Tag does not match the payload
    #[error("Credential signature mismatch")]
    BadSignature,

    #[error("Failed to encode credential: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Signs and verifies stored credentials
#[derive(Clone)]
pub struct SessionCodec {
    key: Vec<u8>,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Codec keyed from the configured secret, or a random per-process key.
    ///
    /// With a random key, credentials do not survive a restart.
    pub fn from_config(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) if !secret.is_empty() => Self::new(secret),
            _ => {
                tracing::warn!(
                    "No session secret configured, using a random key; logins will not survive a restart"
                );
                let mut key = Vec::with_capacity(32);
                key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                key.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
                Self { key }
            }
        }
    }

    pub fn encode(&self, session: &Session) -> Result<String, TokenError> {
        let payload = BASE64.encode(&serde_json::to_vec(session)?);
        let tag = BASE64URL_NOPAD.encode(&self.sign(payload.as_bytes()));
        Ok(format!("{}.{}", payload, tag))
    }

    pub fn decode(&self, credential: &str) -> Result<Session, TokenError> {
        let (payload, tag) = credential
            .split_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature".to_string()))?;

        let tag = BASE64URL_NOPAD
            .decode(tag.as_bytes())
            .map_err(|e| TokenError::Malformed(format!("signature: {}", e)))?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).map_err(|_| TokenError::BadSignature)?;

        let json = BASE64
            .decode(payload.as_bytes())
            .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;

        serde_json::from_slice(&json).map_err(|e| TokenError::Malformed(format!("json: {}", e)))
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        match HmacSha256::new_from_slice(&self.key) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use proptest::prelude::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn warnings_from(build: impl FnOnce() -> SessionCodec) -> String {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            build();
        });
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_missing_secret_warns_once() {
        let output = warnings_from(|| SessionCodec::from_config(None));
        assert_eq!(output.matches("No session secret configured").count(), 1);

        let output = warnings_from(|| SessionCodec::from_config(Some("s3cret")));
        assert!(output.is_empty());
    }

    fn session() -> Session {
        Session {
            username: "user".to_string(),
            role: UserRole::User,
            name: "Marine Researcher".to_string(),
            exp: 1_900_000_000,
        }
    }

    #[test]
    fn test_encode_decode() {
        let codec = SessionCodec::new("secret");
        let token = codec.encode(&session()).unwrap();

        assert_eq!(codec.decode(&token).unwrap(), session());
    }

    #[test]
    fn test_payload_is_plain_base64_json() {
        let codec = SessionCodec::new("secret");
        let token = codec.encode(&session()).unwrap();
        let (payload, _) = token.split_once('.').unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(payload.as_bytes()).unwrap()).unwrap();
        assert_eq!(json["username"], "user");
        assert_eq!(json["exp"], 1_900_000_000i64);
    }

    #[test]
    fn test_other_key_rejected() {
        let token = SessionCodec::new("a").encode(&session()).unwrap();
        assert!(matches!(
            SessionCodec::new("b").decode(&token),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = SessionCodec::new("secret");
        let token = codec.encode(&session()).unwrap();
        let (_, tag) = token.split_once('.').unwrap();

        let mut forged = session();
        forged.role = UserRole::Admin;
        let forged_payload = BASE64.encode(&serde_json::to_vec(&forged).unwrap());

        assert!(codec.decode(&format!("{}.{}", forged_payload, tag)).is_err());
    }

    #[test]
    fn test_malformed_inputs() {
        let codec = SessionCodec::new("secret");
        assert!(matches!(codec.decode("no-dot"), Err(TokenError::Malformed(_))));
        assert!(matches!(codec.decode("abc.!!!"), Err(TokenError::Malformed(_))));
        assert!(codec.decode("").is_err());
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed() {
        let codec = SessionCodec::new("secret");
        let payload = "not base64 at all";
        let tag = BASE64URL_NOPAD.encode(&codec.sign(payload.as_bytes()));

        assert!(matches!(
            codec.decode(&format!("{}.{}", payload, tag)),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_random_keys_differ() {
        let a = SessionCodec::from_config(None);
        let b = SessionCodec::from_config(Some(""));
        let token = a.encode(&session()).unwrap();
        assert!(b.decode(&token).is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(input in ".*") {
            let codec = SessionCodec::new("secret");
            let _ = codec.decode(&input);
        }

        #[test]
        fn prop_any_session_survives(
            username in "[a-z]{1,12}",
            name in "[A-Za-z ]{0,30}",
            exp in any::<i64>(),
            admin in any::<bool>(),
        ) {
            let codec = SessionCodec::new("secret");
            let s = Session {
                username,
                role: if admin { UserRole::Admin } else { UserRole::User },
                name,
                exp,
            };
            let token = codec.encode(&s).unwrap();
            prop_assert_eq!(codec.decode(&token).unwrap(), s);
        }
    }
}
