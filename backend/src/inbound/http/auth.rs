//! Caller identity extraction.
//!
//! The platform gateway authenticates users and forwards the verified
//! identity in the `X-User-Id` header. This adapter trusts that header and
//! only validates its shape; requests without it are rejected as
//! unauthorised.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload};

use crate::domain::{Error, UserId};

/// Header carrying the gateway-verified user identity.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated caller, extracted from [`USER_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl AuthenticatedUser {
    /// The caller's identity.
    #[must_use]
    pub fn into_user_id(self) -> UserId {
        self.0
    }
}

fn extract_user(req: &HttpRequest) -> Result<AuthenticatedUser, Error> {
    let header = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| Error::unauthorized("missing X-User-Id header"))?;
    let raw = header
        .to_str()
        .map_err(|_| Error::unauthorized("X-User-Id header must be valid UTF-8"))?;
    let user_id = UserId::new(raw)
        .map_err(|_| Error::unauthorized("X-User-Id header must be a valid UUID"))?;
    Ok(AuthenticatedUser(user_id))
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_user(req))
    }
}
