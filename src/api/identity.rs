use axum::{
    extract::{FromRef, FromRequestParts},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::error::{Error, ForbiddenReason};

use super::user::{Role, UserCollection};

/// Offline verifier for identity-provider bearer tokens. The provider signs
/// RS256 tokens against a published key; we pin that key and the issuer.
#[derive(Clone)]
pub struct IdentityState {
    decoding_key: jsonwebtoken::DecodingKey,
    validation: jsonwebtoken::Validation,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct IdClaims {
    email: String,
}

impl IdentityState {
    pub fn new(public_key_pem: &[u8], issuer: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding_key = jsonwebtoken::DecodingKey::from_rsa_pem(public_key_pem)?;

        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.set_issuer(&[issuer]);

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    pub fn new_from_env() -> Self {
        let public_key = std::env::var("IDP_PUBLIC_KEY")
            .expect("Cannot retreive IDP_PUBLIC_KEY from environment variable.");
        let public_key = general_purpose::STANDARD.decode(public_key).unwrap();

        let issuer = std::env::var("IDP_ISSUER")
            .expect("Cannot retreive IDP_ISSUER from environment variable.");

        Self::new(&public_key, &issuer).unwrap()
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, Error> {
        let token = jsonwebtoken::decode::<IdClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| Error::Forbidden(ForbiddenReason::InvalidToken))
            .tap_err(|_| tracing::debug!("token failed verification"))?;

        Ok(VerifiedIdentity {
            email: token.claims.email,
        })
    }
}

/// The authenticated caller. Extracting this is the "must be authenticated"
/// guard: a missing credential rejects with 401, an invalid one with 403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for VerifiedIdentity
where
    IdentityState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthenticated)
            .tap_err(|_| tracing::debug!("missing bearer credential"))?;

        let identity = IdentityState::from_ref(state);

        identity.verify(token.token())
    }
}

/// The authenticated caller with an admin role. Extraction authenticates
/// first and then resolves the role, so admin gating cannot be expressed
/// without a verified identity.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub VerifiedIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    IdentityState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extract_with_state::<VerifiedIdentity, _>(state).await?;

        let users = UserCollection::from_ref(state);

        match role_of(&identity.email, &users).await? {
            Role::Admin => Ok(Self(identity)),
            Role::User => Err(Error::Forbidden(ForbiddenReason::NotAdmin))
                .tap_err(|_| tracing::debug!("non-admin tried accessing admin resource")),
        }
    }
}

/// Role of the user stored under `email`. Absent documents and documents
/// without a role field resolve to the least privileged role.
pub async fn role_of(email: &str, users: &UserCollection) -> Result<Role, Error> {
    let user = users
        .find_one(
            bson::doc! {
                "email": email
            },
            None,
        )
        .await?;

    Ok(user.and_then(|user| user.role).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::extract::{FromRef, FromRequestParts};

    use crate::{
        api::tests::{issue_token, test_identity_state, TEST_IDP_ISSUER},
        error::{Error, ForbiddenReason},
    };

    use super::{IdentityState, VerifiedIdentity};

    #[derive(Clone)]
    struct TestState {
        identity: IdentityState,
    }

    impl FromRef<TestState> for IdentityState {
        fn from_ref(state: &TestState) -> Self {
            state.identity.clone()
        }
    }

    fn test_state() -> TestState {
        TestState {
            identity: test_identity_state(),
        }
    }

    fn current_timestamp() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn test_verify() {
        let state = test_identity_state();

        let token = issue_token("a@x.com", current_timestamp() + 600, TEST_IDP_ISSUER);
        let identity = state.verify(&token).unwrap();

        assert_eq!(identity.email, "a@x.com");
    }

    #[test]
    fn test_verify_expired() {
        let state = test_identity_state();

        let token = issue_token("a@x.com", current_timestamp() - 3600, TEST_IDP_ISSUER);
        let error = state.verify(&token).unwrap_err();

        assert_matches!(error, Error::Forbidden(ForbiddenReason::InvalidToken));
    }

    #[test]
    fn test_verify_wrong_issuer() {
        let state = test_identity_state();

        let token = issue_token("a@x.com", current_timestamp() + 600, "https://evil.test");
        let error = state.verify(&token).unwrap_err();

        assert_matches!(error, Error::Forbidden(ForbiddenReason::InvalidToken));
    }

    #[test]
    fn test_verify_garbage() {
        let state = test_identity_state();

        let error = state.verify("not-a-token").unwrap_err();

        assert_matches!(error, Error::Forbidden(ForbiddenReason::InvalidToken));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let error = VerifiedIdentity::from_request_parts(&mut parts, &test_state())
            .await
            .unwrap_err();

        assert_matches!(error, Error::Unauthenticated);
    }

    #[tokio::test]
    async fn test_invalid_token_is_forbidden() {
        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", "Bearer garbage")
            .body(())
            .unwrap()
            .into_parts();

        let error = VerifiedIdentity::from_request_parts(&mut parts, &test_state())
            .await
            .unwrap_err();

        assert_matches!(error, Error::Forbidden(ForbiddenReason::InvalidToken));
    }

    #[tokio::test]
    async fn test_valid_token_extracts_identity() {
        let token = issue_token("rider@x.com", current_timestamp() + 600, TEST_IDP_ISSUER);

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();

        let identity = VerifiedIdentity::from_request_parts(&mut parts, &test_state())
            .await
            .unwrap();

        assert_eq!(identity.email, "rider@x.com");
    }
}
