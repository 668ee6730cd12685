//! Builds the caller's [`Session`] from request headers.

use crate::error::ApiError;
use crate::AppState;
use api_shared::auth::{
    validate_api_key, AuthError, ACTOR_ID_HEADER, ACTOR_NAME_HEADER, ACTOR_ROLE_HEADER,
    API_KEY_HEADER, MEMBERSHIP_ID_HEADER,
};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use telecare_core::{ActorId, ActorRole, MembershipId, NonEmptyText, Session};

/// The authenticated caller of a request.
pub struct Caller(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        validate_api_key(header(parts, API_KEY_HEADER), state.api_key())?;

        let actor_id: ActorId = parse_header(parts, ACTOR_ID_HEADER)?;
        let role: ActorRole = parse_header(parts, ACTOR_ROLE_HEADER)?;
        let display_name = NonEmptyText::new(required(parts, ACTOR_NAME_HEADER)?).map_err(|e| {
            AuthError::InvalidHeader {
                header: ACTOR_NAME_HEADER,
                reason: e.to_string(),
            }
        })?;
        let membership_id = match header(parts, MEMBERSHIP_ID_HEADER) {
            Some(_) => Some(parse_header::<MembershipId>(parts, MEMBERSHIP_ID_HEADER)?),
            None if role == ActorRole::Patient => {
                return Err(AuthError::MissingHeader(MEMBERSHIP_ID_HEADER).into())
            }
            None => None,
        };

        Ok(Caller(Session::new(actor_id, display_name, role, membership_id)))
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn required<'a>(parts: &'a Parts, name: &'static str) -> Result<&'a str, AuthError> {
    header(parts, name).ok_or(AuthError::MissingHeader(name))
}

fn parse_header<T>(parts: &Parts, name: &'static str) -> Result<T, AuthError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    required(parts, name)?
        .parse()
        .map_err(|e: T::Err| AuthError::InvalidHeader {
            header: name,
            reason: e.to_string(),
        })
}
