//! ES256 / ES384 / ES512 over the NIST curves.
//!
//! Signatures are the fixed-width `r || s` concatenation, not DER.

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::error::{Error, Result};
use crate::jwk::Jwk;
use signature::{Signer as _, Verifier as _};
use zeroize::Zeroizing;

pub(super) struct EcdsaFactory;

impl SignerFactory for EcdsaFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Signer>> {
        let key_id = key_id.or(key.key_id()).map(str::to_string);
        let curve = expected_curve(alg, key)?;
        let scalar = Zeroizing::new(key.parameter_bytes("d")?);
        let signing = match curve {
            "P-256" => SigningKey::P256(
                p256::ecdsa::SigningKey::from_slice(&scalar)
                    .map_err(|e| Error::key_import(format!("EC private key rejected: {e}")))?,
            ),
            "P-384" => SigningKey::P384(
                p384::ecdsa::SigningKey::from_slice(&scalar)
                    .map_err(|e| Error::key_import(format!("EC private key rejected: {e}")))?,
            ),
            _ => SigningKey::P521(
                p521::ecdsa::SigningKey::from_slice(&scalar)
                    .map_err(|e| Error::key_import(format!("EC private key rejected: {e}")))?,
            ),
        };
        Ok(Box::new(EcdsaSigner { algorithm: alg.to_string(), key_id, key: signing }))
    }
}

impl VerifierFactory for EcdsaFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Verifier>> {
        let key_id = key_id.or(key.key_id()).map(str::to_string);
        let curve = expected_curve(alg, key)?;
        let x = key.parameter_bytes("x")?;
        let y = key.parameter_bytes("y")?;
        let field_size = match curve {
            "P-256" => 32,
            "P-384" => 48,
            _ => 66,
        };
        if x.len() != field_size || y.len() != field_size {
            return Err(Error::key_import(format!(
                "EC public key rejected: coordinates must be {field_size} bytes for {curve}"
            )));
        }
        let verifying = match curve {
            "P-256" => {
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(&x),
                    p256::FieldBytes::from_slice(&y),
                    false,
                );
                VerifyingKey::P256(
                    p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                        .map_err(|e| Error::key_import(format!("EC public key rejected: {e}")))?,
                )
            }
            "P-384" => {
                let point = p384::EncodedPoint::from_affine_coordinates(
                    p384::FieldBytes::from_slice(&x),
                    p384::FieldBytes::from_slice(&y),
                    false,
                );
                VerifyingKey::P384(
                    p384::ecdsa::VerifyingKey::from_encoded_point(&point)
                        .map_err(|e| Error::key_import(format!("EC public key rejected: {e}")))?,
                )
            }
            _ => {
                let point = p521::EncodedPoint::from_affine_coordinates(
                    p521::FieldBytes::from_slice(&x),
                    p521::FieldBytes::from_slice(&y),
                    false,
                );
                VerifyingKey::P521(
                    p521::ecdsa::VerifyingKey::from_encoded_point(&point)
                        .map_err(|e| Error::key_import(format!("EC public key rejected: {e}")))?,
                )
            }
        };
        Ok(Box::new(EcdsaVerifier { algorithm: alg.to_string(), key_id, key: verifying }))
    }
}

/// The curve an algorithm name demands; the key's `crv` must agree.
fn expected_curve(alg: &str, key: &Jwk) -> Result<&'static str> {
    if key.key_type() != "EC" {
        return Err(Error::key_import(format!("expected an 'EC' key, found '{}'", key.key_type())));
    }
    let curve = match alg {
        "ES256" => "P-256",
        "ES384" => "P-384",
        _ => "P-521",
    };
    let crv = key.parameter("crv")?;
    if crv != curve {
        return Err(Error::key_import(format!("{alg} requires curve {curve}, key is on {crv}")));
    }
    Ok(curve)
}

enum SigningKey {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

enum VerifyingKey {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

struct EcdsaSigner {
    algorithm: String,
    key_id: Option<String>,
    key: SigningKey,
}

impl Signer for EcdsaSigner {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>> {
        match &self.key {
            SigningKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .try_sign(input)
                    .map_err(|e| Error::key_import(format!("ECDSA signing failed: {e}")))?;
                Ok(signature.to_bytes().to_vec())
            }
            SigningKey::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .try_sign(input)
                    .map_err(|e| Error::key_import(format!("ECDSA signing failed: {e}")))?;
                Ok(signature.to_bytes().to_vec())
            }
            SigningKey::P521(key) => {
                let signature: p521::ecdsa::Signature = key
                    .try_sign(input)
                    .map_err(|e| Error::key_import(format!("ECDSA signing failed: {e}")))?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

struct EcdsaVerifier {
    algorithm: String,
    key_id: Option<String>,
    key: VerifyingKey,
}

impl Verifier for EcdsaVerifier {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        match &self.key {
            VerifyingKey::P256(key) => {
                let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(input, &signature).is_ok()
            }
            VerifyingKey::P384(key) => {
                let Ok(signature) = p384::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(input, &signature).is_ok()
            }
            VerifyingKey::P521(key) => {
                let Ok(signature) = p521::ecdsa::Signature::from_slice(signature) else {
                    return false;
                };
                key.verify(input, &signature).is_ok()
            }
        }
    }
}
