//! Account linking policy.
//!
//! A provider identity maps onto an existing subject by provider column
//! first, then by email. The gateway never creates subjects; an identity
//! that matches nothing is refused.

use anyhow::{Context, anyhow};
use sqlx::PgPool;
use tracing::info;

use super::engine::OAuthError;
use super::provider::{Profile, Provider};
use crate::auth::password::normalize_email;
use crate::directory::{LinkOutcome, RoleRecord, User, repo};

/// Resolve a normalized provider profile to a subject and its role record,
/// linking the provider column when the subject is found by email.
///
/// # Errors
///
/// `NoAccount` when neither the provider column nor the email resolves,
/// `RoleMismatch` when the email resolves to a role the provider may not
/// link, `Conflict` when the directory's uniqueness constraint rejects the
/// link.
pub async fn resolve(
    pool: &PgPool,
    provider: Provider,
    profile: &Profile,
) -> Result<(User, RoleRecord), OAuthError> {
    // 1. Provider column match: the identity is already linked.
    if let Some(role) = repo::find_role_by_provider(pool, provider, &profile.provider_subject)
        .await
        .map_err(OAuthError::Internal)?
    {
        let user = repo::find_user_by_id(pool, role.user_id())
            .await
            .map_err(OAuthError::Internal)?
            .ok_or_else(|| {
                OAuthError::Internal(anyhow!(
                    "role record {} has no backing subject",
                    role.id()
                ))
            })?;
        return Ok((user, role));
    }

    // 2. Email match: link the provider identity to the existing subject.
    let email = normalize_email(&profile.email);
    if email.is_empty() {
        return Err(OAuthError::NoAccount);
    }
    let Some(user) = repo::find_user_by_email(pool, &email)
        .await
        .map_err(OAuthError::Internal)?
    else {
        // 3. Nothing matched. The gateway does not create accounts.
        return Err(OAuthError::NoAccount);
    };

    if !provider.links(user.meta_type) {
        return Err(OAuthError::RoleMismatch {
            provider,
            meta_type: user.meta_type,
        });
    }

    let mut role = repo::find_role(pool, user.meta_type, user.meta_id)
        .await
        .map_err(OAuthError::Internal)?
        .ok_or_else(|| {
            OAuthError::Internal(anyhow!(
                "subject {} has no {} record {}",
                user.id,
                user.meta_type,
                user.meta_id
            ))
        })?;

    match repo::link_provider_subject(pool, provider, &role, &profile.provider_subject)
        .await
        .context("account link failed")
        .map_err(OAuthError::Internal)?
    {
        LinkOutcome::Linked => {
            apply_link(&mut role, provider, &profile.provider_subject);
            info!(
                provider = %provider,
                user_id = user.id,
                "linked provider identity to existing account"
            );
            Ok((user, role))
        }
        LinkOutcome::Conflict => Err(OAuthError::Conflict),
    }
}

/// Mirror a successful column write onto the in-memory record.
fn apply_link(role: &mut RoleRecord, provider: Provider, subject: &str) {
    let subject = Some(subject.to_string());
    match (role, provider) {
        (RoleRecord::Teacher(teacher), Provider::Google) => teacher.google_uid = subject,
        (RoleRecord::Teacher(teacher), Provider::Clever) => teacher.clever_uid = subject,
        (RoleRecord::Student(student), Provider::Google) => student.google_uid = subject,
        (RoleRecord::Student(student), Provider::Clever) => student.clever_uid = subject,
        (RoleRecord::Student(student), Provider::ClassLink) => student.classlink_uid = subject,
        (RoleRecord::Student(student), Provider::Icloud) => student.icloud_uid = subject,
        (RoleRecord::Parent(parent), Provider::ClassLink) => parent.classlink_uid = subject,
        (RoleRecord::Parent(parent), Provider::Icloud) => parent.icloud_uid = subject,
        _ => {}
    }
}
