//! Production and consumption of JSON Web Tokens (RFC 7519) in compact JWS
//! form, built on a strict, size-bounded JSON model with write-once members,
//! a whitelisted algorithm registry, and JWK-based key management.
//!
//! ```
//! use tokenseal::{Jwk, JwsFactory, JwtFactory};
//!
//! # fn main() -> tokenseal::Result<()> {
//! let key = Jwk::symmetric(b"top secret", Some("demo"))?;
//! let mut factory = JwtFactory::new();
//! factory.set_issuer("https://issuer.example.com")?;
//! factory.set_duration(3600)?;
//! factory.set_jws(JwsFactory::new("HS256", &key)?)?;
//!
//! let mut claims = factory.make()?;
//! claims.set_subject("bob")?;
//! let token = factory.sign(&claims)?;
//!
//! let decoded = factory.decode_now(&token)?;
//! assert_eq!(decoded.subject(), Some("bob"));
//! # Ok(())
//! # }
//! ```

pub mod base64url;
pub mod claims;
pub mod error;
pub mod factory;
pub mod json;
pub mod jwa;
pub mod jwk;

pub use claims::Claims;
pub use error::{Error, ErrorKind, Result};
pub use factory::{JwsFactory, JwtFactory};
pub use json::{Array, Json, Limits, Object};
pub use jwk::{Jwk, JwkSet};
