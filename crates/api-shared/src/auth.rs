//! Caller authentication.
//!
//! Identity itself is established upstream. The API surfaces receive the authenticated caller
//! in the headers named below and, when an API key is configured, require it in `x-api-key`.

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const MEMBERSHIP_ID_HEADER: &str = "x-membership-id";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing header '{0}'")]
    MissingHeader(&'static str),
    #[error("invalid header '{header}': {reason}")]
    InvalidHeader {
        header: &'static str,
        reason: String,
    },
}

/// Validates the provided API key against the configured one.
///
/// With no key configured every request passes.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(AuthError::MissingApiKey),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidApiKey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_configured_key_allows_everything() {
        assert_eq!(validate_api_key(None, None), Ok(()));
        assert_eq!(validate_api_key(Some("anything"), None), Ok(()));
    }

    #[test]
    fn configured_key_must_match() {
        assert_eq!(validate_api_key(Some("s3cret"), Some("s3cret")), Ok(()));
        assert_eq!(
            validate_api_key(Some("guess"), Some("s3cret")),
            Err(AuthError::InvalidApiKey)
        );
        assert_eq!(
            validate_api_key(None, Some("s3cret")),
            Err(AuthError::MissingApiKey)
        );
    }
}
