//! User business logic - sign-in provisioning, roles, and student administration.
//!
//! Users are never created directly; they appear on their first successful sign-in
//! from the allowed email domain. The role is derived from the email address.

use crate::{
    config::AuthConfig,
    entities::{ArchivedOrder, User, WeeklyOrder, archived_order, user, weekly_order},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

/// Grade label given to teachers on creation.
pub const TEACHER_GRADE: &str = "teacher";

/// Role claim carried by users and session tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Stored name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored role name; unknown names fall back to `Student`,
    /// the least privileged role.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "teacher" => Self::Teacher,
            _ => Self::Student,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `email` belongs to the configured sign-in domain.
#[must_use]
pub fn is_allowed_email(email: &str, auth: &AuthConfig) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty() && domain.eq_ignore_ascii_case(&auth.allowed_email_domain)
}

/// Derives the role for a new user from their email address.
///
/// Configured admin emails become admins, addresses starting with one of the
/// student prefixes become students, and everyone else is a teacher.
#[must_use]
pub fn role_for_email(email: &str, auth: &AuthConfig) -> Role {
    if auth.is_admin_email(email) {
        return Role::Admin;
    }

    let lowered = email.to_ascii_lowercase();
    if auth
        .student_email_prefixes
        .iter()
        .any(|prefix| lowered.starts_with(&prefix.to_ascii_lowercase()))
    {
        Role::Student
    } else {
        Role::Teacher
    }
}

/// Finds a user by their unique ID.
pub async fn get_user_by_id<C>(db: &C, user_id: i64) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by ID or fails with `NotFound`.
pub async fn require_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}

/// Finds a user by email.
pub async fn get_user_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the existing user for `email`, creating one on first sign-in.
///
/// The caller is responsible for checking the email domain first.
#[instrument(skip(db, auth))]
pub async fn find_or_create_user(
    db: &DatabaseConnection,
    email: &str,
    full_name: &str,
    auth: &AuthConfig,
) -> Result<user::Model> {
    if let Some(existing) = get_user_by_email(db, email).await? {
        return Ok(existing);
    }

    let role = role_for_email(email, auth);
    let grade = (role == Role::Teacher).then(|| TEACHER_GRADE.to_string());

    let new_user = user::ActiveModel {
        email: Set(email.to_string()),
        full_name: Set(full_name.trim().to_string()),
        role: Set(role.as_str().to_string()),
        grade: Set(grade),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = new_user.insert(db).await?;
    info!(user_id = created.id, role = %role, "Created user on first sign-in");
    Ok(created)
}

/// Promotes every existing user whose email is in `emails` to admin.
///
/// Returns the number of users updated.
pub async fn seed_admins(db: &DatabaseConnection, emails: &[String]) -> Result<u64> {
    if emails.is_empty() {
        return Ok(0);
    }

    let result = User::update_many()
        .col_expr(user::Column::Role, Expr::value(Role::Admin.as_str()))
        .filter(user::Column::Email.is_in(emails.iter().cloned()))
        .filter(user::Column::Role.ne(Role::Admin.as_str()))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Sets the caller's own grade label.
pub async fn set_grade(db: &DatabaseConnection, user_id: i64, grade: &str) -> Result<user::Model> {
    let grade = grade.trim();
    if grade.is_empty() {
        return Err(Error::validation("Grade cannot be empty"));
    }

    let existing = require_user(db, user_id).await?;
    let mut active: user::ActiveModel = existing.into();
    active.grade = Set(Some(grade.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// Lists all students ordered by name.
pub async fn list_students(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    User::find()
        .filter(user::Column::Role.eq(Role::Student.as_str()))
        .order_by_asc(user::Column::FullName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Hard-deletes a student together with their live orders and archive.
///
/// Unpaid records are display-only and are kept.
#[instrument(skip(db))]
pub async fn delete_student(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    let txn = db.begin().await?;

    let student = User::find_by_id(user_id)
        .filter(user::Column::Role.eq(Role::Student.as_str()))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("Student", user_id))?;

    WeeklyOrder::delete_many()
        .filter(weekly_order::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    ArchivedOrder::delete_many()
        .filter(archived_order::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    User::delete_by_id(user_id).exec(&txn).await?;

    txn.commit().await?;

    info!(user_id, "Deleted student");
    Ok(student)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn auth() -> AuthConfig {
        AuthConfig {
            admin_emails: vec!["kitchen@eduiteh.eu".to_string()],
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_role_for_email() {
        let auth = auth();
        assert_eq!(role_for_email("et.ivan@eduiteh.eu", &auth), Role::Student);
        assert_eq!(role_for_email("OT.maria@eduiteh.eu", &auth), Role::Student);
        assert_eq!(role_for_email("g.petrova@eduiteh.eu", &auth), Role::Teacher);
        assert_eq!(role_for_email("Kitchen@eduiteh.eu", &auth), Role::Admin);
    }

    #[test]
    fn test_is_allowed_email() {
        let auth = auth();
        assert!(is_allowed_email("et.ivan@eduiteh.eu", &auth));
        assert!(is_allowed_email("et.ivan@EDUITEH.EU", &auth));
        assert!(!is_allowed_email("et.ivan@gmail.com", &auth));
        assert!(!is_allowed_email("@eduiteh.eu", &auth));
        assert!(!is_allowed_email("no-at-sign", &auth));
    }

    #[tokio::test]
    async fn test_find_or_create_user_is_stable() -> Result<()> {
        let db = setup_test_db().await?;
        let auth = auth();

        let first = find_or_create_user(&db, "g.petrova@eduiteh.eu", " Галя Петрова ", &auth).await?;
        assert_eq!(first.role, "teacher");
        assert_eq!(first.grade.as_deref(), Some(TEACHER_GRADE));
        assert_eq!(first.full_name, "Галя Петрова");

        let second = find_or_create_user(&db, "g.petrova@eduiteh.eu", "Other", &auth).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(second.full_name, "Галя Петрова");

        let student = find_or_create_user(&db, "et.ivan@eduiteh.eu", "Иван", &auth).await?;
        assert_eq!(student.role, "student");
        assert!(student.grade.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_admins_promotes_existing_users() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "cook@eduiteh.eu", "Cook", Role::Teacher).await?;

        let updated = seed_admins(&db, &["cook@eduiteh.eu".to_string()]).await?;
        assert_eq!(updated, 1);
        let reloaded = require_user(&db, user.id).await?;
        assert_eq!(reloaded.role, "admin");

        // Already admin: nothing to do
        assert_eq!(seed_admins(&db, &["cook@eduiteh.eu".to_string()]).await?, 0);
        assert_eq!(seed_admins(&db, &[]).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_grade() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "et.a@eduiteh.eu", "A", Role::Student).await?;

        let updated = set_grade(&db, user.id, " 10а ").await?;
        assert_eq!(updated.grade.as_deref(), Some("10а"));

        assert!(matches!(
            set_grade(&db, user.id, "  ").await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            set_grade(&db, 999, "9б").await,
            Err(Error::NotFound { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_and_delete_students() -> Result<()> {
        let db = setup_test_db().await?;
        let b = create_test_user(&db, "et.b@eduiteh.eu", "Борис", Role::Student).await?;
        let a = create_test_user(&db, "et.a@eduiteh.eu", "Ана", Role::Student).await?;
        let teacher = create_test_user(&db, "t@eduiteh.eu", "Учител", Role::Teacher).await?;

        let students = list_students(&db).await?;
        assert_eq!(students.len(), 2);
        assert_eq!(students[0].id, a.id);
        assert_eq!(students[1].id, b.id);

        // Teachers cannot be removed through the student path
        assert!(matches!(
            delete_student(&db, teacher.id).await,
            Err(Error::NotFound { .. })
        ));

        delete_student(&db, a.id).await?;
        assert!(get_user_by_id(&db, a.id).await?.is_none());
        assert_eq!(list_students(&db).await?.len(), 1);
        Ok(())
    }
}
