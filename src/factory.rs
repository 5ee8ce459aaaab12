//! Token production and consumption.
//!
//! A [`JwsFactory`] binds one algorithm to one key; a [`JwtFactory`] carries
//! claim defaults and drives the compact-form signing and decoding pipelines
//! through it.

use crate::base64url;
use crate::claims::{validate_string_or_uri, Claims};
use crate::error::{Error, ErrorKind, Result};
use crate::json::{Json, Limits, Object};
use crate::jwa::{self, Signer, Verifier};
use crate::jwk::Jwk;
use chrono::Utc;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// An algorithm/key binding able to verify, and to sign when the key has a
/// secret part.
pub struct JwsFactory {
    algorithm: String,
    key_id: Option<String>,
    signer: Option<Box<dyn Signer>>,
    verifier: Box<dyn Verifier>,
}

impl JwsFactory {
    /// Bind `algorithm` to `key`.
    ///
    /// The algorithm must be whitelisted and registered; the key must fit it.
    pub fn new(algorithm: &str, key: &Jwk) -> Result<Self> {
        let key_id = key.key_id().map(str::to_string);
        let verifier = jwa::make_verifier(algorithm, key_id.as_deref(), key)?;
        let signer = if key.key_type() == "oct" || key.is_private() {
            Some(jwa::make_signer(algorithm, key_id.as_deref(), key)?)
        } else {
            None
        };
        Ok(Self { algorithm: algorithm.to_string(), key_id, signer, verifier })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    pub(crate) fn sign(&self, input: &[u8]) -> Result<Vec<u8>> {
        match &self.signer {
            Some(signer) => signer.sign(input),
            None => Err(Error::key_import("bound key cannot produce signatures")),
        }
    }

    pub(crate) fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        self.verifier.verify(input, signature)
    }
}

/// Builds claim sets and signs them into compact JWS form; decodes and
/// validates the inverse.
pub struct JwtFactory {
    issuer: Option<String>,
    subject: Option<String>,
    audience: Vec<String>,
    duration: Option<u64>,
    not_before: Option<u64>,
    default_skew: i64,
    jws: Option<JwsFactory>,
    locked: bool,
}

impl Default for JwtFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtFactory {
    pub fn new() -> Self {
        Self {
            issuer: None,
            subject: None,
            audience: Vec::new(),
            duration: None,
            not_before: None,
            default_skew: 0,
            jws: None,
            locked: false,
        }
    }

    /// Default issuer stamped into claims made by this factory.
    pub fn set_issuer(&mut self, issuer: &str) -> Result<()> {
        self.check_unlocked()?;
        validate_string_or_uri(issuer)?;
        self.issuer = Some(issuer.to_string());
        Ok(())
    }

    /// Default subject.
    pub fn set_subject(&mut self, subject: &str) -> Result<()> {
        self.check_unlocked()?;
        validate_string_or_uri(subject)?;
        self.subject = Some(subject.to_string());
        Ok(())
    }

    /// Append a default audience entry.
    pub fn add_audience(&mut self, audience: &str) -> Result<()> {
        self.check_unlocked()?;
        validate_string_or_uri(audience)?;
        self.audience.push(audience.to_string());
        Ok(())
    }

    /// Default seconds-to-expiry.
    pub fn set_duration(&mut self, seconds: u64) -> Result<()> {
        self.check_unlocked()?;
        self.duration = Some(seconds);
        Ok(())
    }

    /// Default not-before offset in seconds.
    pub fn set_not_before(&mut self, seconds: u64) -> Result<()> {
        self.check_unlocked()?;
        self.not_before = Some(seconds);
        Ok(())
    }

    /// Skew applied by [`JwtFactory::decode_now`].
    pub fn set_default_skew(&mut self, seconds: i64) -> Result<()> {
        self.check_unlocked()?;
        self.default_skew = seconds;
        Ok(())
    }

    /// Bind the signing/verification algorithm and key.
    pub fn set_jws(&mut self, jws: JwsFactory) -> Result<()> {
        self.check_unlocked()?;
        self.jws = Some(jws);
        Ok(())
    }

    pub fn jws(&self) -> Option<&JwsFactory> {
        self.jws.as_ref()
    }

    pub fn default_skew(&self) -> i64 {
        self.default_skew
    }

    /// Freeze the factory. Idempotent; a locked factory can be shared
    /// freely across threads.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Produce a fresh claims set carrying this factory's defaults.
    pub fn make(&self) -> Result<Claims> {
        let mut claims = Claims::new();
        if let Some(issuer) = &self.issuer {
            claims.set_issuer(issuer)?;
        }
        if let Some(subject) = &self.subject {
            claims.set_subject(subject)?;
        }
        if !self.audience.is_empty() {
            for audience in &self.audience {
                claims.add_audience(audience)?;
            }
            // the default audience list is not extendable by the caller
            claims.props.get_mut("aud")?.as_array_mut()?.lock();
        }
        if let Some(duration) = self.duration {
            claims.set_duration(duration)?;
        }
        if let Some(not_before) = self.not_before {
            claims.set_not_before(not_before)?;
        }
        Ok(claims)
    }

    /// Sign `claims` into compact JWS form, stamping the issue instant from
    /// the wall clock.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        self.sign_at(claims, now())
    }

    /// Sign `claims` with an explicit issue instant.
    ///
    /// The caller's claims are cloned; the clone is stamped with final
    /// `iat`, `jti` and, when offsets are present, `exp` and `nbf`, then
    /// sealed and serialized.
    pub fn sign_at(&self, claims: &Claims, issued_at: i64) -> Result<String> {
        let jws = self
            .jws
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::AlgorithmUnavailable("no JWS binding".into())))?;

        let mut payload = claims.props.clone();
        payload.set_final("iat", Json::Integer(issued_at))?;
        payload.set_final("jti", Json::String(new_jti()))?;
        if let Some(duration) = claims.duration {
            payload.set_final("exp", Json::Integer(issued_at + duration as i64))?;
        }
        if let Some(offset) = claims.not_before {
            payload.set_final("nbf", Json::Integer(issued_at + offset as i64))?;
        }
        payload.lock_deep();
        let payload_json = payload.to_json();

        let mut header = Object::new();
        header.set("typ", Json::String("JWT".into()))?;
        header.set("alg", Json::String(jws.algorithm().into()))?;
        if let Some(kid) = jws.key_id() {
            header.set("kid", Json::String(kid.into()))?;
        }
        let header_json = header.to_json();

        let signing_input =
            format!("{}.{}", base64url::encode(header_json), base64url::encode(payload_json));
        let signature = jws.sign(signing_input.as_bytes())?;
        Ok(format!("{signing_input}.{}", base64url::encode(signature)))
    }

    /// Decode a compact JWS, verify its signature, and validate the claims
    /// at `current_time` with the given skew.
    ///
    /// The signature is checked before the payload is ever parsed, and the
    /// header's `alg` must match the bound algorithm exactly.
    pub fn decode(&self, token: &str, current_time: i64, skew: i64) -> Result<Claims> {
        let jws = self
            .jws
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::AlgorithmUnavailable("no JWS binding".into())))?;

        let mut parts = token.split('.');
        let (header_b64, payload_b64, signature_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => (header, payload, signature),
            _ => return Err(Error::malformed_token("expected three dot-separated parts")),
        };

        let header_bytes = base64url::decode(header_b64)
            .map_err(|e| Error::malformed_token(format!("invalid base64url in header: {e}")))?;
        let header_limits = Limits { recursion_depth: 1, ..Limits::default() };
        let header = Object::parse_slice(&header_limits, &header_bytes)?;

        let algorithm = match header.try_get("alg") {
            Some(value) => value.as_string()?,
            None => return Err(Error::malformed_token("header is missing 'alg'")),
        };
        if let Some(typ) = header.try_get("typ") {
            if typ.as_string()? != "JWT" {
                return Err(Error::malformed_token("unsupported token type"));
            }
        }
        if algorithm != jws.algorithm() {
            return Err(Error::new(ErrorKind::AlgorithmUnavailable(algorithm.into())));
        }

        let signature = base64url::decode(signature_b64)
            .map_err(|e| Error::malformed_token(format!("invalid base64url in signature: {e}")))?;
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        if !jws.verify(signing_input.as_bytes(), &signature) {
            return Err(Error::new(ErrorKind::SignatureInvalid));
        }

        let payload_bytes = base64url::decode(payload_b64)
            .map_err(|e| Error::malformed_token(format!("invalid base64url in payload: {e}")))?;
        let payload = Object::parse_slice(&Limits::default(), &payload_bytes)?;

        let mut claims = Claims::from_object(payload);
        claims.validate(current_time, skew)?;
        Ok(claims)
    }

    /// Decode against the wall clock with this factory's default skew.
    pub fn decode_now(&self, token: &str) -> Result<Claims> {
        self.decode(token, now(), self.default_skew)
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked {
            return Err(Error::new(ErrorKind::Locked));
        }
        Ok(())
    }
}

static JTI_COUNTER: AtomicU64 = AtomicU64::new(0);
static JTI_PREFIX: Lazy<String> = Lazy::new(|| hex::encode(rand::random::<[u8; 8]>()));

/// A process-unique token id: random per-process prefix plus an atomic
/// counter.
fn new_jti() -> String {
    let count = JTI_COUNTER.fetch_add(1, Ordering::AcqRel);
    format!("{}-{count}", JTI_PREFIX.as_str())
}

fn now() -> i64 {
    Utc::now().timestamp()
}
