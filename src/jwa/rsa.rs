//! RS256 / RS384 / RS512 (PKCS#1 v1.5) and PS256 / PS384 / PS512 (PSS).

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::error::{Error, ErrorKind, Result};
use crate::jwk::Jwk;
use rsa::sha2::{Sha256, Sha384, Sha512};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Signer as _, Verifier as _};
use rsa::{pkcs1v15, pss, BigUint, RsaPrivateKey, RsaPublicKey};

pub(super) struct RsaFactory;

impl SignerFactory for RsaFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Signer>> {
        let key_id = key_id.or(key.key_id()).map(str::to_string);
        Ok(Box::new(RsaSigner { algorithm: alg.to_string(), key_id, key: private_key(key)? }))
    }
}

impl VerifierFactory for RsaFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Verifier>> {
        let key_id = key_id.or(key.key_id()).map(str::to_string);
        Ok(Box::new(RsaVerifier { algorithm: alg.to_string(), key_id, key: public_key(key)? }))
    }
}

fn parameter(key: &Jwk, name: &str) -> Result<BigUint> {
    Ok(BigUint::from_bytes_be(&key.parameter_bytes(name)?))
}

fn check_kty(key: &Jwk) -> Result<()> {
    if key.key_type() != "RSA" {
        return Err(Error::key_import(format!("expected an 'RSA' key, found '{}'", key.key_type())));
    }
    Ok(())
}

fn public_key(key: &Jwk) -> Result<RsaPublicKey> {
    check_kty(key)?;
    RsaPublicKey::new(parameter(key, "n")?, parameter(key, "e")?)
        .map_err(|e| Error::key_import(format!("RSA public key rejected: {e}")))
}

fn private_key(key: &Jwk) -> Result<RsaPrivateKey> {
    check_kty(key)?;
    let n = parameter(key, "n")?;
    let e = parameter(key, "e")?;
    let d = parameter(key, "d")?;
    let primes = vec![parameter(key, "p")?, parameter(key, "q")?];
    RsaPrivateKey::from_components(n, e, d, primes)
        .map_err(|e| Error::key_import(format!("RSA private key rejected: {e}")))
}

/// The private key zeroizes its own storage on drop.
struct RsaSigner {
    algorithm: String,
    key_id: Option<String>,
    key: RsaPrivateKey,
}

impl Signer for RsaSigner {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>> {
        let signature = match self.algorithm.as_str() {
            "RS256" => pkcs1v15::SigningKey::<Sha256>::new(self.key.clone())
                .try_sign(input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            "RS384" => pkcs1v15::SigningKey::<Sha384>::new(self.key.clone())
                .try_sign(input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            "RS512" => pkcs1v15::SigningKey::<Sha512>::new(self.key.clone())
                .try_sign(input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            "PS256" => pss::BlindedSigningKey::<Sha256>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::thread_rng(), input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            "PS384" => pss::BlindedSigningKey::<Sha384>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::thread_rng(), input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            "PS512" => pss::BlindedSigningKey::<Sha512>::new(self.key.clone())
                .try_sign_with_rng(&mut rand::thread_rng(), input)
                .map(|s| s.to_bytes())
                .map_err(|e| Error::key_import(format!("RSA signing failed: {e}")))?,
            other => return Err(Error::new(ErrorKind::AlgorithmUnavailable(other.into()))),
        };
        Ok(signature.as_ref().to_vec())
    }
}

struct RsaVerifier {
    algorithm: String,
    key_id: Option<String>,
    key: RsaPublicKey,
}

impl Verifier for RsaVerifier {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        match self.algorithm.as_str() {
            "RS256" => {
                let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                pkcs1v15::VerifyingKey::<Sha256>::new(self.key.clone())
                    .verify(input, &signature)
                    .is_ok()
            }
            "RS384" => {
                let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                pkcs1v15::VerifyingKey::<Sha384>::new(self.key.clone())
                    .verify(input, &signature)
                    .is_ok()
            }
            "RS512" => {
                let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
                    return false;
                };
                pkcs1v15::VerifyingKey::<Sha512>::new(self.key.clone())
                    .verify(input, &signature)
                    .is_ok()
            }
            "PS256" => {
                let Ok(signature) = pss::Signature::try_from(signature) else {
                    return false;
                };
                pss::VerifyingKey::<Sha256>::new(self.key.clone()).verify(input, &signature).is_ok()
            }
            "PS384" => {
                let Ok(signature) = pss::Signature::try_from(signature) else {
                    return false;
                };
                pss::VerifyingKey::<Sha384>::new(self.key.clone()).verify(input, &signature).is_ok()
            }
            "PS512" => {
                let Ok(signature) = pss::Signature::try_from(signature) else {
                    return false;
                };
                pss::VerifyingKey::<Sha512>::new(self.key.clone()).verify(input, &signature).is_ok()
            }
            _ => false,
        }
    }
}
