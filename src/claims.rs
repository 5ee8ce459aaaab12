//! The RFC 7519 claims record.

use crate::error::{Error, ErrorKind, Result};
use crate::json::{Array, Json, Object};
use url::Url;

/// The registered claim names. These are managed by the library and refused
/// by [`Claims::add_claim`].
pub const REGISTERED_CLAIMS: [&str; 7] = ["iss", "sub", "aud", "exp", "nbf", "iat", "jti"];

/// A set of claims destined for (or recovered from) a token payload.
///
/// Registered claims are stored as write-once members of the backing object;
/// `duration` and `not_before` ride alongside as offsets from the issue
/// instant and are stamped into `exp`/`nbf` at signing time.
#[derive(Debug)]
pub struct Claims {
    pub(crate) props: Object,
    pub(crate) duration: Option<u64>,
    pub(crate) not_before: Option<u64>,
}

impl Claims {
    pub(crate) fn new() -> Self {
        Self { props: Object::new(), duration: None, not_before: None }
    }

    /// Wrap a decoded payload object, locking it.
    pub(crate) fn from_object(mut props: Object) -> Self {
        props.lock_deep();
        Self { props, duration: None, not_before: None }
    }

    /// Set `iss`. The value must be a StringOrURI and becomes final.
    pub fn set_issuer(&mut self, issuer: &str) -> Result<()> {
        validate_string_or_uri(issuer)?;
        self.props.set_final("iss", Json::String(issuer.into()))
    }

    /// Set `sub`. The value must be a StringOrURI and becomes final.
    pub fn set_subject(&mut self, subject: &str) -> Result<()> {
        validate_string_or_uri(subject)?;
        self.props.set_final("sub", Json::String(subject.into()))
    }

    /// Append to the `aud` array, creating it on first use.
    pub fn add_audience(&mut self, audience: &str) -> Result<()> {
        validate_string_or_uri(audience)?;
        if !self.props.exists("aud") {
            self.props.set_final("aud", Json::Array(Array::new()))?;
        }
        self.props.get_mut("aud")?.as_array_mut()?.append(Json::String(audience.into()))
    }

    /// Seconds past the issue instant until the token expires.
    pub fn set_duration(&mut self, seconds: u64) -> Result<()> {
        self.check_unlocked()?;
        self.duration = Some(seconds);
        Ok(())
    }

    /// Seconds past the issue instant until the token becomes valid.
    pub fn set_not_before(&mut self, seconds: u64) -> Result<()> {
        self.check_unlocked()?;
        self.not_before = Some(seconds);
        Ok(())
    }

    /// Insert a private claim, optionally write-once.
    ///
    /// Registered names are always refused: they belong to the library.
    pub fn add_claim(&mut self, name: &str, value: Json, is_final: bool) -> Result<()> {
        if REGISTERED_CLAIMS.contains(&name) {
            return Err(Error::new(ErrorKind::FinalMember(name.into())));
        }
        if is_final {
            self.props.set_final(name, value)
        } else {
            self.props.set(name, value)
        }
    }

    pub fn get_claim(&self, name: &str) -> Result<&Json> {
        self.props.get(name)
    }

    pub fn has_claim(&self, name: &str) -> bool {
        self.props.exists(name)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.props.try_get("iss").and_then(|v| v.as_string().ok())
    }

    pub fn subject(&self) -> Option<&str> {
        self.props.try_get("sub").and_then(|v| v.as_string().ok())
    }

    /// The `aud` claim: an array when built here, possibly a bare string in
    /// decoded tokens.
    pub fn audience(&self) -> Option<&Json> {
        self.props.try_get("aud")
    }

    pub fn expiration(&self) -> Option<i64> {
        self.props.try_get("exp").and_then(|v| v.to_integer().ok())
    }

    pub fn not_before(&self) -> Option<i64> {
        self.props.try_get("nbf").and_then(|v| v.to_integer().ok())
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.props.try_get("iat").and_then(|v| v.to_integer().ok())
    }

    pub fn token_id(&self) -> Option<&str> {
        self.props.try_get("jti").and_then(|v| v.as_string().ok())
    }

    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    pub fn not_before_offset(&self) -> Option<u64> {
        self.not_before
    }

    /// Validate temporal claims against a wall clock and permitted skew,
    /// then re-check the registered string claims and seal every registered
    /// member against later replacement.
    pub fn validate(&mut self, current_time: i64, skew: i64) -> Result<()> {
        // saturating arithmetic: a hostile timestamp must not wrap
        if let Some(expires) = self.optional_int("exp")? {
            if current_time >= expires.saturating_add(skew) {
                return Err(Error::new(ErrorKind::Expired));
            }
        }
        if let Some(not_before) = self.optional_int("nbf")? {
            if current_time.saturating_add(skew) < not_before {
                return Err(Error::new(ErrorKind::NotYetValid));
            }
        }
        if let Some(issued_at) = self.optional_int("iat")? {
            if issued_at > current_time.saturating_add(skew) {
                return Err(Error::new(ErrorKind::IssuedInFuture));
            }
        }

        for name in ["iss", "sub", "jti"] {
            if let Some(value) = self.props.try_get(name) {
                validate_string_or_uri(value.as_string()?)?;
            }
        }
        match self.props.try_get("aud") {
            None => {}
            Some(Json::String(value)) => validate_string_or_uri(value)?,
            Some(value) => {
                for entry in value.as_array()?.iter() {
                    validate_string_or_uri(entry.as_string()?)?;
                }
            }
        }

        for name in REGISTERED_CLAIMS {
            self.props.seal_member(name);
        }
        Ok(())
    }

    /// Lock this claims set, and everything inside it, against mutation.
    pub fn lock(&mut self) {
        self.props.lock_deep();
    }

    pub fn is_locked(&self) -> bool {
        self.props.is_locked()
    }

    /// Overwrite all string-backed claim storage in place.
    pub fn invalidate(&mut self) {
        self.props.invalidate();
    }

    /// Serialize the claims object to compact JSON.
    pub fn to_json(&self) -> String {
        self.props.to_json()
    }

    fn optional_int(&self, name: &str) -> Result<Option<i64>> {
        match self.props.try_get(name) {
            None => Ok(None),
            Some(value) => Ok(Some(value.to_integer()?)),
        }
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.props.is_locked() {
            return Err(Error::new(ErrorKind::Locked));
        }
        Ok(())
    }
}

impl Drop for Claims {
    fn drop(&mut self) {
        self.props.invalidate();
    }
}

/// A StringOrURI must be non-empty, and a well-formed URI whenever it
/// contains a `:`.
pub(crate) fn validate_string_or_uri(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::new(ErrorKind::InvalidStringOrUri(value.into())));
    }
    if value.contains(':') && Url::parse(value).is_err() {
        return Err(Error::new(ErrorKind::InvalidStringOrUri(value.into())));
    }
    Ok(())
}
