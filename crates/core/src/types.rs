//! Shared value types: validated text, typed identifiers and the caller's session.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use telecare_uuid::ShardableUuid;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string guaranteed to contain at least one non-whitespace character.
///
/// The input is trimmed during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Like [`NonEmptyText::new`] but reports the offending field as a validation error.
    pub fn required(field: &str, input: impl AsRef<str>) -> CoreResult<Self> {
        Self::new(input).map_err(|_| CoreError::Validation(format!("{field} is required")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! canonical_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ShardableUuid);

        impl $name {
            pub fn new() -> Self {
                Self(ShardableUuid::new())
            }

            /// Parses a canonical (32 lowercase hex) identifier.
            pub fn parse(input: &str) -> CoreResult<Self> {
                Ok(Self(ShardableUuid::parse(input)?))
            }

            pub fn as_shardable(&self) -> &ShardableUuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<ShardableUuid> for $name {
            fn from(id: ShardableUuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

canonical_id!(
    /// Identifies one consultation episode.
    ConsultationId
);
canonical_id!(
    /// Identifies the person a consultation is about (the subject).
    PersonId
);
canonical_id!(
    /// Identifies a family/household membership grouping people.
    MembershipId
);
canonical_id!(
    /// Identifies an authenticated actor (patient, clinician or administrator).
    ActorId
);

/// Clinicians are actors; the alias documents intent at call sites.
pub type ClinicianId = ActorId;

/// Role of an actor as reported by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Patient,
    Clinician,
    Admin,
}

impl ActorRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Clinician => "clinician",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "clinician" => Ok(Self::Clinician),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller of a core operation.
///
/// Every operation takes a `Session` explicitly; there is no ambient "current user".
#[derive(Clone, Debug)]
pub struct Session {
    actor_id: ActorId,
    display_name: NonEmptyText,
    role: ActorRole,
    membership_id: Option<MembershipId>,
}

impl Session {
    pub fn new(
        actor_id: ActorId,
        display_name: NonEmptyText,
        role: ActorRole,
        membership_id: Option<MembershipId>,
    ) -> Self {
        Self {
            actor_id,
            display_name,
            role,
            membership_id,
        }
    }

    pub fn clinician(actor_id: ActorId, display_name: NonEmptyText) -> Self {
        Self::new(actor_id, display_name, ActorRole::Clinician, None)
    }

    pub fn patient(
        actor_id: ActorId,
        display_name: NonEmptyText,
        membership_id: MembershipId,
    ) -> Self {
        Self::new(actor_id, display_name, ActorRole::Patient, Some(membership_id))
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn display_name(&self) -> &NonEmptyText {
        &self.display_name
    }

    pub fn role(&self) -> ActorRole {
        self.role
    }

    pub fn membership_id(&self) -> Option<MembershipId> {
        self.membership_id
    }

    pub fn is_clinician(&self) -> bool {
        self.role == ActorRole::Clinician
    }

    /// Fails with [`CoreError::Authorization`] unless the caller is a clinician.
    pub fn require_clinician(&self, operation: &str) -> CoreResult<()> {
        if self.is_clinician() {
            return Ok(());
        }
        Err(CoreError::Authorization(format!(
            "{operation} requires a clinician; caller is {}",
            self.role
        )))
    }

    /// Fails with [`CoreError::Authorization`] for patients.
    pub fn require_staff(&self, operation: &str) -> CoreResult<()> {
        match self.role {
            ActorRole::Clinician | ActorRole::Admin => Ok(()),
            ActorRole::Patient => Err(CoreError::Authorization(format!(
                "{operation} requires a clinician or administrator"
            ))),
        }
    }

    /// Patients may only act on their own membership; staff may act on any.
    pub fn require_membership_access(&self, membership_id: MembershipId) -> CoreResult<()> {
        match self.role {
            ActorRole::Clinician | ActorRole::Admin => Ok(()),
            ActorRole::Patient if self.membership_id == Some(membership_id) => Ok(()),
            ActorRole::Patient => Err(CoreError::Authorization(
                "patients may only access their own membership".into(),
            )),
        }
    }
}
