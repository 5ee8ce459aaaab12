//! HS256 / HS384 / HS512.

use super::{Signer, SignerFactory, Verifier, VerifierFactory};
use crate::error::{Error, ErrorKind, Result};
use crate::jwk::Jwk;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

pub(super) struct HmacFactory;

impl SignerFactory for HmacFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Signer>> {
        Ok(Box::new(HmacKey::new(alg, key_id, key)?))
    }
}

impl VerifierFactory for HmacFactory {
    fn make(&self, alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Box<dyn Verifier>> {
        Ok(Box::new(HmacKey::new(alg, key_id, key)?))
    }
}

/// One HMAC key serves both directions; the raw secret is wiped on drop.
struct HmacKey {
    algorithm: String,
    key_id: Option<String>,
    secret: Zeroizing<Vec<u8>>,
}

impl HmacKey {
    fn new(alg: &str, key_id: Option<&str>, key: &Jwk) -> Result<Self> {
        if key.key_type() != "oct" {
            return Err(Error::key_import(format!(
                "{alg} requires an 'oct' key, found '{}'",
                key.key_type()
            )));
        }
        let secret = Zeroizing::new(key.parameter_bytes("k")?);
        let key_id = key_id.or(key.key_id()).map(str::to_string);
        Ok(Self { algorithm: alg.to_string(), key_id, secret })
    }

    fn mac(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm.as_str() {
            "HS256" => {
                let mut mac = HmacSha256::new_from_slice(&self.secret)
                    .map_err(|e| Error::key_import(format!("HMAC key rejected: {e}")))?;
                mac.update(input);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            "HS384" => {
                let mut mac = HmacSha384::new_from_slice(&self.secret)
                    .map_err(|e| Error::key_import(format!("HMAC key rejected: {e}")))?;
                mac.update(input);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            "HS512" => {
                let mut mac = HmacSha512::new_from_slice(&self.secret)
                    .map_err(|e| Error::key_import(format!("HMAC key rejected: {e}")))?;
                mac.update(input);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            other => Err(Error::new(ErrorKind::AlgorithmUnavailable(other.into()))),
        }
    }

    /// Constant-time comparison through the MAC's own output check.
    fn check(&self, input: &[u8], signature: &[u8]) -> bool {
        match self.algorithm.as_str() {
            "HS256" => {
                let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
                    return false;
                };
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            }
            "HS384" => {
                let Ok(mut mac) = HmacSha384::new_from_slice(&self.secret) else {
                    return false;
                };
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            }
            "HS512" => {
                let Ok(mut mac) = HmacSha512::new_from_slice(&self.secret) else {
                    return false;
                };
                mac.update(input);
                mac.verify_slice(signature).is_ok()
            }
            _ => false,
        }
    }
}

impl Signer for HmacKey {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.mac(input)
    }
}

impl Verifier for HmacKey {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn verify(&self, input: &[u8], signature: &[u8]) -> bool {
        self.check(input, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base64url;
    use crate::jwa;
    use rstest::rstest;

    // RFC 7515 appendix A.1: the HS256 example key and signing input.
    const A1_KEY: &str = r#"{"kty":"oct","k":"AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow"}"#;
    const A1_INPUT: &str = "eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9.eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFtcGxlLmNvbS9pc19yb290Ijp0cnVlfQ";
    const A1_SIGNATURE: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    #[test]
    fn matches_published_hs256_vector() {
        let key = Jwk::parse(A1_KEY).expect("key parse failed");
        let signer = jwa::make_signer("HS256", None, &key).expect("make_signer failed");
        let signature = signer.sign(A1_INPUT.as_bytes()).expect("sign failed");
        assert_eq!(base64url::encode(&signature), A1_SIGNATURE);

        let verifier = jwa::make_verifier("HS256", None, &key).expect("make_verifier failed");
        assert!(verifier.verify(A1_INPUT.as_bytes(), &signature));
        assert!(!verifier.verify(A1_INPUT.as_bytes(), &signature[..31]));
        assert!(!verifier.verify(b"something else", &signature));
    }

    #[rstest]
    #[case("HS256", 32)]
    #[case("HS384", 48)]
    #[case("HS512", 64)]
    fn round_trip_per_algorithm(#[case] alg: &str, #[case] mac_len: usize) {
        let key = Jwk::symmetric(b"secret", Some("mac-key")).unwrap();
        let signer = jwa::make_signer(alg, None, &key).expect("make_signer failed");
        assert_eq!(signer.algorithm(), alg);
        assert_eq!(signer.key_id(), Some("mac-key"));

        let signature = signer.sign(b"head.payload").expect("sign failed");
        assert_eq!(signature.len(), mac_len);

        let verifier = jwa::make_verifier(alg, None, &key).expect("make_verifier failed");
        assert!(verifier.verify(b"head.payload", &signature));
        assert!(!verifier.verify(b"head.tampered", &signature));
    }

    #[test]
    fn refuses_non_oct_keys() {
        let key = Jwk::parse(
            r#"{"kty":"EC","crv":"P-256",
                "x":"f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
                "y":"x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0"}"#,
        )
        .unwrap();
        let err = match jwa::make_signer("HS256", None, &key) {
            Err(e) => e,
            Ok(_) => panic!("signer was created"),
        };
        assert!(matches!(err.kind(), ErrorKind::KeyImportFailed(_)));
    }
}
