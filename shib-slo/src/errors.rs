use std::{error::Error as StdError, fmt};

use backtrace::Backtrace;
use http::StatusCode;
use thiserror::Error;

pub trait ErrorCode: StdError + 'static {
    fn code(&self) -> (StatusCode, &'static str);
}

#[derive(Error, Debug)]
pub enum Code {
    #[error(transparent)]
    Any(#[from] anyhow::Error),
    #[error("Not found. {0}")]
    NotFound(String),
    #[error("Authentication failed. {0}")]
    Authentication(String),
    #[error("Invalid configuration. {0}")]
    Configuration(String),
    #[error("Required attribute {0} not provided in SAML response")]
    MissingAttribute(String),
    #[error("Could not persist identity. {0}")]
    Persistence(String),
    #[error("Please recheck the request.see: {0}")]
    Validates(#[source] validator::ValidationErrors),
    #[error("Please recheck the request.see: {0}")]
    BadRequest(String),
}

impl ErrorCode for Code {
    fn code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Any(_) => (StatusCode::INTERNAL_SERVER_ERROR, "1020001"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "1020002"),
            Self::Authentication(_) => (StatusCode::UNAUTHORIZED, "1020003"),
            Self::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "1020004")
            }
            Self::MissingAttribute(_) => (StatusCode::UNAUTHORIZED, "1020005"),
            Self::Persistence(_) => (StatusCode::CONFLICT, "1020006"),
            Self::Validates(_) => (StatusCode::UNPROCESSABLE_ENTITY, "1020007"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "1020008"),
        }
    }
}

pub struct WithBacktrace {
    source: Code,
    backtrace: Backtrace,
}

impl WithBacktrace {
    pub fn kind(&self) -> &Code {
        &self.source
    }
}

impl fmt::Debug for WithBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithBacktrace")
            .field("source", &self.source)
            .field("backtrace", &self.backtrace)
            .finish()
    }
}

impl fmt::Display for WithBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl StdError for WithBacktrace {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

impl From<Code> for WithBacktrace {
    fn from(code: Code) -> Self {
        WithBacktrace {
            source: code,
            backtrace: Backtrace::new(),
        }
    }
}

impl From<WithBacktrace> for Code {
    fn from(value: WithBacktrace) -> Self {
        value.source
    }
}

impl PartialEq for WithBacktrace {
    fn eq(&self, other: &Self) -> bool {
        let (_, src_code) = self.source.code();
        let (_, dst_code) = other.source.code();
        src_code == dst_code
    }
}

#[inline]
pub fn any<E: StdError>(err: E) -> WithBacktrace {
    WithBacktrace {
        source: Code::Any(anyhow::anyhow!("{}", err.to_string())),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn not_found<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::NotFound(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn authentication<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::Authentication(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn configuration<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::Configuration(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn missing_attribute<S: ToString + ?Sized>(attribute: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::MissingAttribute(attribute.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn persistence<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::Persistence(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[inline]
pub fn bad_request<S: ToString + ?Sized>(err: &S) -> WithBacktrace {
    WithBacktrace {
        source: Code::BadRequest(err.to_string()),
        backtrace: Backtrace::new(),
    }
}

#[cfg(feature = "axum-resp")]
mod axum {
    use axum::response::IntoResponse;
    use serde_json::json;

    use super::ErrorCode;

    impl IntoResponse for super::WithBacktrace {
        fn into_response(self) -> axum::response::Response {
            tracing::error!("{:?}", self);

            let (status_code, code) = self.source.code();

            let payload = json!({
                "code": code,
                "message": self.to_string(),
            });

            (status_code, axum::Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_names_the_attribute() {
        let err = missing_attribute("urn:oid:0.9.2342.19200300.100.1.1");
        assert!(matches!(err.kind(), Code::MissingAttribute(v) if v == "urn:oid:0.9.2342.19200300.100.1.1"));
        assert_eq!(
            err.to_string(),
            "Required attribute urn:oid:0.9.2342.19200300.100.1.1 not provided in SAML response"
        );
    }

    #[test]
    fn errors_compare_by_code() {
        assert_eq!(persistence("a"), persistence("b"));
        assert_ne!(persistence("a"), configuration("a"));
        let (status, _) = Code::from(authentication("x")).code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
