//! Queries against the shared user directory.
//!
//! The directory is owned by a peer system. The gateway reads subjects and
//! role records, and writes only `last_logged_on`, the federated identity
//! columns, attempt-log rows, and magic-link deletions.

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::models::{Admin, LoginToken, MetaType, Parent, RoleRecord, Student, Teacher, User};
use crate::oauth::Provider;

const USER_COLUMNS: &str = "id, email, password_digest, boddle_uid, meta_type, meta_id, \
     last_logged_on, created_at, updated_at";
const TEACHER_COLUMNS: &str =
    "id, user_id, first_name, last_name, google_uid, clever_uid, verified, created_at, updated_at";
const STUDENT_COLUMNS: &str = "id, user_id, username, first_name, last_name, google_uid, \
     clever_uid, classlink_uid, icloud_uid, created_at, updated_at";
const PARENT_COLUMNS: &str =
    "id, user_id, first_name, last_name, classlink_uid, icloud_uid, created_at, updated_at";
const ADMIN_COLUMNS: &str = "id, user_id, first_name, last_name, created_at, updated_at";

fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let meta_type: String = row.get("meta_type");
    let meta_type = match MetaType::parse(&meta_type) {
        Some(meta_type) => meta_type,
        None => bail!("unknown meta_type in users row: {meta_type}"),
    };
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_digest: row.get("password_digest"),
        boddle_uid: row.get("boddle_uid"),
        meta_type,
        meta_id: row.get("meta_id"),
        last_logged_on: row.get("last_logged_on"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn teacher_from_row(row: &PgRow) -> Teacher {
    Teacher {
        id: row.get("id"),
        user_id: row.get("user_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        google_uid: row.get("google_uid"),
        clever_uid: row.get("clever_uid"),
        verified: row.get("verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        google_uid: row.get("google_uid"),
        clever_uid: row.get("clever_uid"),
        classlink_uid: row.get("classlink_uid"),
        icloud_uid: row.get("icloud_uid"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn parent_from_row(row: &PgRow) -> Parent {
    Parent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        classlink_uid: row.get("classlink_uid"),
        icloud_uid: row.get("icloud_uid"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn admin_from_row(row: &PgRow) -> Admin {
    Admin {
        id: row.get("id"),
        user_id: row.get("user_id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Look up a subject by already-normalized email.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", &query))
        .await
        .context("failed to find user by email")?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_user_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", &query))
        .await
        .context("failed to find user by id")?;
    row.as_ref().map(user_from_row).transpose()
}

/// Resolve the discriminator + role-pointer pair to the role record.
pub async fn find_role(pool: &PgPool, meta_type: MetaType, meta_id: i64) -> Result<Option<RoleRecord>> {
    let (query, table) = match meta_type {
        MetaType::Teacher => (
            format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = $1"),
            MetaType::Teacher,
        ),
        MetaType::Student => (
            format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"),
            MetaType::Student,
        ),
        MetaType::Parent => (
            format!("SELECT {PARENT_COLUMNS} FROM parents WHERE id = $1"),
            MetaType::Parent,
        ),
        MetaType::Admin => (
            format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = $1"),
            MetaType::Admin,
        ),
    };
    let row = sqlx::query(&query)
        .bind(meta_id)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", &query))
        .await
        .context("failed to find role record")?;

    Ok(row.map(|row| match table {
        MetaType::Teacher => RoleRecord::Teacher(teacher_from_row(&row)),
        MetaType::Student => RoleRecord::Student(student_from_row(&row)),
        MetaType::Parent => RoleRecord::Parent(parent_from_row(&row)),
        MetaType::Admin => RoleRecord::Admin(admin_from_row(&row)),
    }))
}

/// The role tables carrying a given provider's identity column, in lookup
/// order.
fn provider_tables(provider: Provider) -> &'static [MetaType] {
    match provider {
        Provider::Google | Provider::Clever => &[MetaType::Teacher, MetaType::Student],
        Provider::ClassLink | Provider::Icloud => &[MetaType::Student, MetaType::Parent],
    }
}

fn provider_lookup_query(provider: Provider, table: MetaType) -> Option<String> {
    let column = provider.identity_column();
    match table {
        MetaType::Teacher if provider.links(MetaType::Teacher) => Some(format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers WHERE {column} = $1"
        )),
        MetaType::Student if provider.links(MetaType::Student) => Some(format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE {column} = $1"
        )),
        MetaType::Parent if provider.links(MetaType::Parent) => Some(format!(
            "SELECT {PARENT_COLUMNS} FROM parents WHERE {column} = $1"
        )),
        _ => None,
    }
}

/// Find the role record holding `subject` in the provider's identity column.
pub async fn find_role_by_provider(
    pool: &PgPool,
    provider: Provider,
    subject: &str,
) -> Result<Option<RoleRecord>> {
    for table in provider_tables(provider) {
        let Some(query) = provider_lookup_query(provider, *table) else {
            continue;
        };
        let row = sqlx::query(&query)
            .bind(subject)
            .fetch_optional(pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to find role by provider subject")?;
        if let Some(row) = row {
            return Ok(Some(match table {
                MetaType::Teacher => RoleRecord::Teacher(teacher_from_row(&row)),
                MetaType::Student => RoleRecord::Student(student_from_row(&row)),
                MetaType::Parent => RoleRecord::Parent(parent_from_row(&row)),
                MetaType::Admin => unreachable!("admins carry no provider column"),
            }));
        }
    }
    Ok(None)
}

/// Outcome of writing a provider identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    /// The directory's uniqueness constraint rejected the write: the
    /// provider subject is already linked elsewhere.
    Conflict,
}

fn link_query(provider: Provider, table: MetaType) -> Option<String> {
    if !provider.links(table) {
        return None;
    }
    let column = provider.identity_column();
    let table_name = match table {
        MetaType::Teacher => "teachers",
        MetaType::Student => "students",
        MetaType::Parent => "parents",
        MetaType::Admin => return None,
    };
    Some(format!(
        "UPDATE {table_name} SET {column} = $1, updated_at = NOW() WHERE id = $2"
    ))
}

/// Write the provider subject onto an existing role record (account link).
pub async fn link_provider_subject(
    pool: &PgPool,
    provider: Provider,
    role: &RoleRecord,
    subject: &str,
) -> Result<LinkOutcome> {
    let Some(query) = link_query(provider, role.meta_type()) else {
        bail!(
            "provider {provider} cannot link a {} record",
            role.meta_type()
        );
    };
    let result = sqlx::query(&query)
        .bind(subject)
        .bind(role.id())
        .execute(pool)
        .instrument(query_span("UPDATE", &query))
        .await;
    match result {
        Ok(_) => Ok(LinkOutcome::Linked),
        Err(err) if is_unique_violation(&err) => Ok(LinkOutcome::Conflict),
        Err(err) => Err(err).context("failed to link provider subject"),
    }
}

/// Advisory timestamp of the most recent successful authentication.
pub async fn update_last_logged_on(pool: &PgPool, user_id: i64) -> Result<()> {
    let query = "UPDATE users SET last_logged_on = NOW() WHERE id = $1";
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(query_span("UPDATE", query))
        .await
        .context("failed to update last_logged_on")?;
    Ok(())
}

/// Append-only audit row. Never read on the hot path.
pub async fn record_login_attempt(
    pool: &PgPool,
    email: &str,
    ip_address: &str,
    success: bool,
) -> Result<()> {
    let query = "INSERT INTO login_attempts (email, ip_address, success, attempted_at) \
         VALUES ($1, $2, $3, NOW())";
    sqlx::query(query)
        .bind(email)
        .bind(ip_address)
        .bind(success)
        .execute(pool)
        .instrument(query_span("INSERT", query))
        .await
        .context("failed to record login attempt")?;
    Ok(())
}

pub async fn find_login_token(pool: &PgPool, secret: &str) -> Result<Option<LoginToken>> {
    let query = "SELECT id, user_id, secret, permanent, created_at FROM login_tokens \
         WHERE secret = $1";
    let row = sqlx::query(query)
        .bind(secret)
        .fetch_optional(pool)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to find login token")?;
    Ok(row.map(|row| LoginToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        secret: row.get("secret"),
        permanent: row.get("permanent"),
        created_at: row.get("created_at"),
    }))
}

pub async fn delete_login_token(pool: &PgPool, id: i64) -> Result<()> {
    let query = "DELETE FROM login_tokens WHERE id = $1";
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(query_span("DELETE", query))
        .await
        .context("failed to delete login token")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_lookup_order_matches_policy() {
        assert_eq!(
            provider_tables(Provider::Google).to_vec(),
            vec![MetaType::Teacher, MetaType::Student]
        );
        assert_eq!(
            provider_tables(Provider::Icloud).to_vec(),
            vec![MetaType::Student, MetaType::Parent]
        );
    }

    #[test]
    fn lookup_queries_target_the_provider_column() {
        let query = provider_lookup_query(Provider::Google, MetaType::Teacher)
            .expect("google links teachers");
        assert!(query.contains("FROM teachers"));
        assert!(query.contains("google_uid = $1"));

        let query = provider_lookup_query(Provider::ClassLink, MetaType::Parent)
            .expect("classlink links parents");
        assert!(query.contains("FROM parents"));
        assert!(query.contains("classlink_uid = $1"));

        assert!(provider_lookup_query(Provider::Icloud, MetaType::Teacher).is_none());
    }

    #[test]
    fn link_queries_respect_role_restrictions() {
        assert!(link_query(Provider::Google, MetaType::Teacher).is_some());
        assert!(link_query(Provider::Google, MetaType::Parent).is_none());
        assert!(link_query(Provider::Clever, MetaType::Admin).is_none());

        let query =
            link_query(Provider::Icloud, MetaType::Student).expect("icloud links students");
        assert!(query.starts_with("UPDATE students SET icloud_uid = $1"));
    }
}
