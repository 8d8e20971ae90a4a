// crates/capi-harness-core/src/status.rs
// ============================================================================
// Module: Status Taxonomy
// Description: Closed mapping from HTTP failure codes to error kinds.
// Purpose: Let tests assert on rejection kinds instead of raw codes.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A request that reached the target and was rejected is reported with a
//! status code. [`convert_status_code`] turns that code into an
//! [`ApplicationError`] so test code can expect `Forbidden` rather than
//! `403`. Codes outside the closed set keep their literal value.

use thiserror::Error;

/// Application-level rejection reported by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ApplicationError {
    /// 400.
    #[error("bad request")]
    BadRequest,
    /// 401.
    #[error("unauthenticated")]
    Unauthenticated,
    /// 403.
    #[error("forbidden")]
    Forbidden,
    /// 404.
    #[error("not found")]
    NotFound,
    /// 422.
    #[error("unprocessable entity")]
    UnprocessableEntity,
    /// 500.
    #[error("internal server error")]
    InternalServer,
    /// 502.
    #[error("bad gateway")]
    BadGateway,
    /// Any status outside the closed mapping.
    #[error("unexpected status code: {code}")]
    UnexpectedStatusCode {
        /// Literal status code returned by the target.
        code: u16,
    },
}

impl ApplicationError {
    /// Returns the status code this error was derived from.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::UnprocessableEntity => 422,
            Self::InternalServer => 500,
            Self::BadGateway => 502,
            Self::UnexpectedStatusCode {
                code,
            } => code,
        }
    }
}

/// Maps a status code to its application error kind.
///
/// Total over `u16`; success codes are not special-cased and map to
/// [`ApplicationError::UnexpectedStatusCode`] like any other unlisted code.
#[must_use]
pub const fn convert_status_code(code: u16) -> ApplicationError {
    match code {
        400 => ApplicationError::BadRequest,
        401 => ApplicationError::Unauthenticated,
        403 => ApplicationError::Forbidden,
        404 => ApplicationError::NotFound,
        422 => ApplicationError::UnprocessableEntity,
        500 => ApplicationError::InternalServer,
        502 => ApplicationError::BadGateway,
        code => ApplicationError::UnexpectedStatusCode {
            code,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_mapping() {
        assert_eq!(convert_status_code(400), ApplicationError::BadRequest);
        assert_eq!(convert_status_code(401), ApplicationError::Unauthenticated);
        assert_eq!(convert_status_code(403), ApplicationError::Forbidden);
        assert_eq!(convert_status_code(404), ApplicationError::NotFound);
        assert_eq!(convert_status_code(422), ApplicationError::UnprocessableEntity);
        assert_eq!(convert_status_code(500), ApplicationError::InternalServer);
        assert_eq!(convert_status_code(502), ApplicationError::BadGateway);
    }

    #[test]
    fn unlisted_codes_keep_literal_value() {
        assert_eq!(
            convert_status_code(418),
            ApplicationError::UnexpectedStatusCode {
                code: 418
            }
        );
        assert_eq!(convert_status_code(418).to_string(), "unexpected status code: 418");
        assert_eq!(convert_status_code(503).status_code(), 503);
    }

    #[test]
    fn status_code_round_trips_for_every_code() {
        for code in 0..=u16::MAX {
            assert_eq!(convert_status_code(code).status_code(), code);
        }
    }
}
