//! Verification of ID tokens issued by the third-party identity provider.

use anyhow::Context;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::claims::IdentityClaims;
use crate::config::{IdentityAlgorithm, IdentityConfig};

pub struct IdentityVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl IdentityVerifier {
    pub fn from_config(cfg: &IdentityConfig) -> anyhow::Result<Self> {
        let (decoding, algorithm) = match cfg.algorithm {
            IdentityAlgorithm::RS256 => (
                DecodingKey::from_rsa_pem(cfg.key.as_bytes()).context("parse identity RSA key")?,
                Algorithm::RS256,
            ),
            IdentityAlgorithm::HS256 => (DecodingKey::from_secret(cfg.key.as_bytes()), Algorithm::HS256),
        };

        let mut validation = Validation::new(algorithm);
        validation.set_audience(std::slice::from_ref(&cfg.audience));
        validation.set_issuer(std::slice::from_ref(&cfg.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Ok(Self {
            decoding,
            validation,
        })
    }

    pub fn verify(&self, id_token: &str) -> anyhow::Result<IdentityClaims> {
        let data = decode::<IdentityClaims>(id_token, &self.decoding, &self.validation)
            .context("verify identity token")?;
        debug!(subject = %data.claims.sub, "identity token verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::AppConfig;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use time::OffsetDateTime;

    /// Mint an ID token the way the provider would, for the test config.
    pub(crate) fn provider_token(cfg: &IdentityConfig, sub: &str, exp_offset_secs: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = json!({
            "sub": sub,
            "iss": cfg.issuer,
            "aud": cfg.audience,
            "iat": now,
            "exp": now + exp_offset_secs,
            "email": "jane.doe@example.com",
            "nickname": "jane",
            "picture": "https://cdn.example.com/jane.png",
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(cfg.key.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_provider_token() {
        let cfg = &AppConfig::for_tests().identity;
        let verifier = IdentityVerifier::from_config(cfg).unwrap();
        let claims = verifier.verify(&provider_token(cfg, "auth0|abc", 300)).unwrap();
        assert_eq!(claims.sub, "auth0|abc");
        assert_eq!(claims.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(claims.display_name(), Some("jane"));
    }

    #[test]
    fn rejects_expired_token() {
        let cfg = &AppConfig::for_tests().identity;
        let verifier = IdentityVerifier::from_config(cfg).unwrap();
        assert!(verifier.verify(&provider_token(cfg, "auth0|abc", -3600)).is_err());
    }

    #[test]
    fn rejects_foreign_audience() {
        let cfg = AppConfig::for_tests().identity;
        let mut other = cfg.clone();
        other.audience = "someone-else".into();
        let verifier = IdentityVerifier::from_config(&cfg).unwrap();
        assert!(verifier.verify(&provider_token(&other, "auth0|abc", 300)).is_err());
    }

    #[test]
    fn rs256_requires_pem_key() {
        let cfg = IdentityConfig {
            issuer: "https://id.test/".into(),
            audience: "client".into(),
            algorithm: IdentityAlgorithm::RS256,
            key: "not a pem".into(),
        };
        assert!(IdentityVerifier::from_config(&cfg).is_err());
    }
}
