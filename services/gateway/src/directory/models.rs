//! Rows from the shared user directory.
//!
//! The directory encodes the subject-role relationship with a discriminator
//! column plus a role-table pointer. In process that pair is a tagged union,
//! resolved once at the adapter boundary so nothing downstream carries the
//! discriminator separately from the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MetaType {
    Teacher,
    Student,
    Parent,
    Admin,
}

impl MetaType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "Teacher",
            Self::Student => "Student",
            Self::Parent => "Parent",
            Self::Admin => "Admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Teacher" => Some(Self::Teacher),
            "Student" => Some(Self::Student),
            "Parent" => Some(Self::Parent),
            "Admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `users` row: the authenticated principal.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub password_digest: String,
    pub boddle_uid: Option<String>,
    pub meta_type: MetaType,
    pub meta_id: i64,
    pub last_logged_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Teacher {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub google_uid: Option<String>,
    pub clever_uid: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub google_uid: Option<String>,
    pub clever_uid: Option<String>,
    pub classlink_uid: Option<String>,
    pub icloud_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parent {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub classlink_uid: Option<String>,
    pub icloud_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Discriminator-selected role extension for a subject.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RoleRecord {
    Teacher(Teacher),
    Student(Student),
    Parent(Parent),
    Admin(Admin),
}

impl RoleRecord {
    #[must_use]
    pub fn meta_type(&self) -> MetaType {
        match self {
            Self::Teacher(_) => MetaType::Teacher,
            Self::Student(_) => MetaType::Student,
            Self::Parent(_) => MetaType::Parent,
            Self::Admin(_) => MetaType::Admin,
        }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        match self {
            Self::Teacher(record) => record.id,
            Self::Student(record) => record.id,
            Self::Parent(record) => record.id,
            Self::Admin(record) => record.id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> i64 {
        match self {
            Self::Teacher(record) => record.user_id,
            Self::Student(record) => record.user_id,
            Self::Parent(record) => record.user_id,
            Self::Admin(record) => record.user_id,
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        let (first, last) = match self {
            Self::Teacher(record) => (&record.first_name, &record.last_name),
            Self::Student(record) => (&record.first_name, &record.last_name),
            Self::Parent(record) => (&record.first_name, &record.last_name),
            Self::Admin(record) => (&record.first_name, &record.last_name),
        };
        format!("{first} {last}")
    }
}

/// The `login_tokens` row backing magic-link authentication.
#[derive(Debug, Clone)]
pub struct LoginToken {
    pub id: i64,
    pub user_id: i64,
    pub secret: String,
    pub permanent: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_type_round_trips_through_strings() {
        for meta in [
            MetaType::Teacher,
            MetaType::Student,
            MetaType::Parent,
            MetaType::Admin,
        ] {
            assert_eq!(MetaType::parse(meta.as_str()), Some(meta));
        }
        assert_eq!(MetaType::parse("Robot"), None);
    }

    #[test]
    fn user_serialization_hides_the_digest() {
        let user = User {
            id: 1,
            email: "t@example.com".to_string(),
            password_digest: "$2a$10$secret".to_string(),
            boddle_uid: None,
            meta_type: MetaType::Teacher,
            meta_id: 2,
            last_logged_on: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).expect("serialize user");
        assert!(!json.contains("password_digest"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn role_record_full_name() {
        let role = RoleRecord::Teacher(Teacher {
            id: 7,
            user_id: 1,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            google_uid: None,
            clever_uid: None,
            verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        assert_eq!(role.full_name(), "Ada Lovelace");
        assert_eq!(role.meta_type(), MetaType::Teacher);
        assert_eq!(role.id(), 7);
    }
}
