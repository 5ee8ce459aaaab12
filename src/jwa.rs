//! The JWA algorithm registry.
//!
//! A process-wide table maps algorithm names to factories that bind a signer
//! or verifier to a key. Only the twelve registered JWS signature algorithms
//! are admitted; registering anything else (including `none`) is a silent
//! no-op, so a hostile header can never talk the library into an unkeyed
//! algorithm.

use crate::error::{Error, ErrorKind, Result};
use crate::jwk::Jwk;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

mod ecdsa;
mod hmac;
mod rsa;

use self::ecdsa::EcdsaFactory;
use self::hmac::HmacFactory;
use self::rsa::RsaFactory;

/// The fixed algorithm whitelist.
pub const ACCEPTED_ALGORITHMS: [&str; 12] = [
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "ES256", "ES384", "ES512", "PS256",
    "PS384", "PS512",
];

/// Whether `alg` is one of the accepted algorithm names.
pub fn is_accepted(alg: &str) -> bool {
    ACCEPTED_ALGORITHMS.contains(&alg)
}

/// A signature producer bound to a key.
pub trait Signer: Send + Sync {
    fn algorithm(&self) -> &str;

    fn key_id(&self) -> Option<&str>;

    /// Sign `header_b64 || '.' || payload_b64`.
    fn sign(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// A signature checker bound to a key.
pub trait Verifier: Send + Sync {
    fn algorithm(&self) -> &str;

    fn key_id(&self) -> Option<&str>;

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool;
}

/// Creates [`Signer`]s bound to a key.
pub trait SignerFactory: Send + Sync {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Signer>>;
}

/// Creates [`Verifier`]s bound to a key.
pub trait VerifierFactory: Send + Sync {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Verifier>>;
}

struct Registry {
    signers: HashMap<String, Arc<dyn SignerFactory>>,
    verifiers: HashMap<String, Arc<dyn VerifierFactory>>,
}

impl Registry {
    fn empty() -> Self {
        Self { signers: HashMap::new(), verifiers: HashMap::new() }
    }

    fn with_defaults() -> Self {
        let mut registry = Self::empty();
        let hmac = Arc::new(HmacFactory);
        for alg in ["HS256", "HS384", "HS512"] {
            registry.register_signer(alg, hmac.clone());
            registry.register_verifier(alg, hmac.clone());
        }
        let rsa = Arc::new(RsaFactory);
        for alg in ["RS256", "RS384", "RS512", "PS256", "PS384", "PS512"] {
            registry.register_signer(alg, rsa.clone());
            registry.register_verifier(alg, rsa.clone());
        }
        let ecdsa = Arc::new(EcdsaFactory);
        for alg in ["ES256", "ES384", "ES512"] {
            registry.register_signer(alg, ecdsa.clone());
            registry.register_verifier(alg, ecdsa.clone());
        }
        registry
    }

    fn register_signer(&mut self, alg: &str, factory: Arc<dyn SignerFactory>) {
        if is_accepted(alg) {
            self.signers.insert(alg.to_string(), factory);
        }
    }

    fn register_verifier(&mut self, alg: &str, factory: Arc<dyn VerifierFactory>) {
        if is_accepted(alg) {
            self.verifiers.insert(alg.to_string(), factory);
        }
    }
}

// The built-in factories are installed through the same whitelist-checked
// path inside the initializer, so the policy is in force before the first
// registration can land.
static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::with_defaults()));

/// Register a signer factory for a whitelisted algorithm name.
///
/// Names outside the whitelist are ignored; an existing registration for the
/// same name is replaced.
pub fn register_signer(alg: &str, factory: Arc<dyn SignerFactory>) {
    REGISTRY.write().expect("algorithm registry poisoned").register_signer(alg, factory);
}

/// Register a verifier factory for a whitelisted algorithm name.
pub fn register_verifier(alg: &str, factory: Arc<dyn VerifierFactory>) {
    REGISTRY.write().expect("algorithm registry poisoned").register_verifier(alg, factory);
}

/// Bind a fresh signer for `alg` to `key`.
pub fn make_signer(alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Signer>> {
    let factory = {
        let registry = REGISTRY.read().expect("algorithm registry poisoned");
        registry
            .signers
            .get(alg)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::AlgorithmUnavailable(alg.into())))?
    };
    factory.make(alg, key_id, key)
}

/// Bind a fresh verifier for `alg` to `key`.
pub fn make_verifier(alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Verifier>> {
    let factory = {
        let registry = REGISTRY.read().expect("algorithm registry poisoned");
        registry
            .verifiers
            .get(alg)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::AlgorithmUnavailable(alg.into())))?
    };
    factory.make(alg, key_id, key)
}
