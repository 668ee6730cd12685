//! Person and role directory.
//!
//! Demographics, family grouping and role assignment belong to external collaborators. The core
//! only needs two lookups from them: a person's membership and date of birth (for triage), and
//! an actor's *current* role (for audit reads). [`Directory`] is that seam; [`StaticDirectory`]
//! is an in-process implementation that the binaries load from `directory.yaml`.

use crate::error::{CoreError, CoreResult};
use crate::types::{ActorId, ActorRole, MembershipId, PersonId};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

/// What the core knows about a person.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    pub membership_id: MembershipId,
    pub display_name: String,
    pub date_of_birth: NaiveDate,
}

impl PersonRecord {
    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_in_years(self.date_of_birth, today)
    }
}

/// Whole years between `date_of_birth` and `today` (0 if `today` precedes the birth date).
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    if today < date_of_birth {
        return 0;
    }
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn person(&self, id: PersonId) -> CoreResult<Option<PersonRecord>>;

    /// The actor's role as assigned *now*, not at any earlier point in time.
    async fn current_role(&self, actor_id: ActorId) -> CoreResult<Option<ActorRole>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    people: Vec<PersonRecord>,
    #[serde(default)]
    roles: HashMap<ActorId, ActorRole>,
}

/// In-memory directory, optionally seeded from a YAML snapshot.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    people: RwLock<HashMap<PersonId, PersonRecord>>,
    roles: RwLock<HashMap<ActorId, ActorRole>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `people` and `roles` from a YAML file. A missing file yields an empty directory.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::warn!("directory file not found, starting empty: {}", path.display());
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path).map_err(CoreError::FileRead)?;
        let file: DirectoryFile =
            serde_yaml::from_str(&text).map_err(CoreError::YamlDeserialization)?;

        let directory = Self::new();
        for person in file.people {
            directory.add_person(person);
        }
        for (actor_id, role) in file.roles {
            directory.set_role(actor_id, role);
        }
        Ok(directory)
    }

    pub fn add_person(&self, person: PersonRecord) {
        let mut people = match self.people.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        people.insert(person.id, person);
    }

    pub fn set_role(&self, actor_id: ActorId, role: ActorRole) {
        let mut roles = match self.roles.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        roles.insert(actor_id, role);
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn person(&self, id: PersonId) -> CoreResult<Option<PersonRecord>> {
        let people = match self.people.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(people.get(&id).cloned())
    }

    async fn current_role(&self, actor_id: ActorId) -> CoreResult<Option<ActorRole>> {
        let roles = match self.roles.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(roles.get(&actor_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_whole_years_only() {
        let dob = date(2008, 10, 20);
        assert_eq!(age_in_years(dob, date(2026, 10, 19)), 17);
        assert_eq!(age_in_years(dob, date(2026, 10, 20)), 18);
        assert_eq!(age_in_years(dob, date(2000, 1, 1)), 0);
    }

    #[tokio::test]
    async fn load_reads_people_and_roles_from_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("directory.yaml");

        let person = PersonRecord {
            id: PersonId::new(),
            membership_id: MembershipId::new(),
            display_name: "Sam Rivera".into(),
            date_of_birth: date(1990, 4, 2),
        };
        let clinician = ActorId::new();
        let mut file = DirectoryFile::default();
        file.people.push(person.clone());
        file.roles.insert(clinician, ActorRole::Clinician);
        std::fs::write(&path, serde_yaml::to_string(&file).unwrap()).unwrap();

        let directory = StaticDirectory::load(&path).unwrap();
        assert_eq!(directory.person(person.id).await.unwrap(), Some(person));
        assert_eq!(
            directory.current_role(clinician).await.unwrap(),
            Some(ActorRole::Clinician)
        );
        assert_eq!(directory.current_role(ActorId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_missing_file_gives_empty_directory() {
        let temp = TempDir::new().unwrap();
        let directory = StaticDirectory::load(&temp.path().join("absent.yaml")).unwrap();
        assert_eq!(directory.person(PersonId::new()).await.unwrap(), None);
    }
}
