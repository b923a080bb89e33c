use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unauthorized access")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(ForbiddenReason),

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("No resource found")]
    NoResource,

    #[error("{0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("{0}")]
    BSONSerError(#[from] bson::ser::Error),

    #[error("{0}")]
    PaymentGateway(#[from] reqwest::Error),

    #[error("payment gateway returned {0}")]
    PaymentGatewayStatus(StatusCode),

    #[error("{1}")]
    CustomStr(StatusCode, &'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ForbiddenReason {
    #[error("forbidden access")]
    InvalidToken,

    #[error("forbidden access from verify admin")]
    NotAdmin,

    #[error("forbidden access")]
    EmailMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<serde_json::Value>,
    r#type: String,
    message: String,
}

impl From<Error> for ErrorJson {
    fn from(err: Error) -> Self {
        let message = err.to_string();

        let r#type = err.to_string_variant();

        let errors = match err {
            Error::ValidationError(err) => serde_json::to_value(err).ok(),
            Error::Unauthenticated
            | Error::Forbidden(..)
            | Error::InvalidInput(..)
            | Error::NoResource
            | Error::DatabaseError(..)
            | Error::BSONSerError(..)
            | Error::PaymentGateway(..)
            | Error::PaymentGatewayStatus(..)
            | Error::CustomStr(..) => None,
        };

        Self {
            errors,
            message,
            r#type,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);
        let status = match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(..) => StatusCode::FORBIDDEN,
            Self::InvalidInput(..) | Self::ValidationError(..) => StatusCode::BAD_REQUEST,
            Self::NoResource => StatusCode::NOT_FOUND,
            Self::DatabaseError(..) | Self::BSONSerError(..) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentGateway(..) | Self::PaymentGatewayStatus(..) => StatusCode::BAD_GATEWAY,
            Self::CustomStr(code, ..) => code,
        };

        let error = ErrorJson::from(self);

        (status, Json(error)).into_response()
    }
}

impl Error {
    pub fn to_string_variant(&self) -> String {
        macro_rules! match_var {
            ($id:ident !) => {
                Self::$id
            };
            ($id:ident (..)) => {
                Self::$id(..)
            };
        }

        macro_rules! variant {
            ($($name:ident $tt:tt),+) => {
                match self {
                    $(
                        match_var!($name $tt) => {
                            stringify!($name)
                       }
                    )+
                }
            };
        }

        variant! {
            Unauthenticated!,
            Forbidden(..),
            InvalidInput(..),
            ValidationError(..),
            NoResource!,
            DatabaseError(..),
            BSONSerError(..),
            PaymentGateway(..),
            PaymentGatewayStatus(..),
            CustomStr(..)
        }
        .to_string()
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::NoResource
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::{Error, ForbiddenReason};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                Error::Forbidden(ForbiddenReason::InvalidToken),
                StatusCode::FORBIDDEN,
            ),
            (
                Error::Forbidden(ForbiddenReason::NotAdmin),
                StatusCode::FORBIDDEN,
            ),
            (Error::InvalidInput("invalid role"), StatusCode::BAD_REQUEST),
            (Error::NoResource, StatusCode::NOT_FOUND),
            (
                Error::CustomStr(StatusCode::NOT_IMPLEMENTED, "Failed to create parcel"),
                StatusCode::NOT_IMPLEMENTED,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_variant_name() {
        assert_eq!(Error::Unauthenticated.to_string_variant(), "Unauthenticated");
        assert_eq!(
            Error::Forbidden(ForbiddenReason::NotAdmin).to_string_variant(),
            "Forbidden"
        );
    }
}
