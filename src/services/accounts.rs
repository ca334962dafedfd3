use secrecy::ExposeSecret;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{is_unique_violation, AppError};
use crate::models::business::CreateBusinessData;
use crate::models::user::CreateUserData;
use crate::models::{Admin, Business, User};
use crate::services::password::Passwords;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessRegistration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentRegistration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub university_id: Option<Uuid>,
    pub campus_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
}

pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AppError::validation("A valid email address is required"))
    }
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".to_string())
}

fn email_taken(err: sqlx::Error) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict("An account with this email already exists".to_string())
    } else {
        err.into()
    }
}

#[tracing::instrument(skip(pool, passwords, registration), fields(email = %registration.email))]
pub async fn register_business(
    pool: &PgPool,
    passwords: &Passwords,
    registration: BusinessRegistration,
) -> Result<Business, AppError> {
    let data = CreateBusinessData {
        email: normalize_email(&registration.email)?,
        name: required(&registration.name, "Business name")?,
        password_hash: passwords.hash(&registration.password).await?,
        description: registration.description,
        address: registration.address,
    };

    let business = Business::create(pool, data).await.map_err(email_taken)?;
    tracing::info!(business_id = %business.id, "Business registered, awaiting review");
    Ok(business)
}

#[tracing::instrument(skip(pool, passwords, registration), fields(email = %registration.email))]
pub async fn register_student(
    pool: &PgPool,
    passwords: &Passwords,
    registration: StudentRegistration,
) -> Result<User, AppError> {
    let data = CreateUserData {
        email: normalize_email(&registration.email)?,
        full_name: required(&registration.full_name, "Full name")?,
        password_hash: passwords.hash(&registration.password).await?,
        university_id: registration.university_id,
        campus_id: registration.campus_id,
        city_id: registration.city_id,
    };

    let user = User::create(pool, data).await.map_err(email_taken)?;
    tracing::info!(user_id = %user.id, "Student registered");
    Ok(user)
}

pub async fn authenticate_admin(
    pool: &PgPool,
    passwords: &Passwords,
    credentials: &Credentials,
) -> Result<Admin, AppError> {
    let email = normalize_email(&credentials.email).map_err(|_| invalid_credentials())?;
    let admin = Admin::find_by_email(pool, &email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !passwords.verify(&credentials.password, &admin.password_hash).await {
        return Err(invalid_credentials());
    }

    tracing::info!(admin_id = %admin.id, "Admin signed in");
    Ok(admin)
}

pub async fn authenticate_business(
    pool: &PgPool,
    passwords: &Passwords,
    credentials: &Credentials,
) -> Result<Business, AppError> {
    let email = normalize_email(&credentials.email).map_err(|_| invalid_credentials())?;
    let business = Business::find_by_email(pool, &email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !passwords.verify(&credentials.password, &business.password_hash).await {
        return Err(invalid_credentials());
    }

    if !business.status.can_sign_in() {
        tracing::warn!(business_id = %business.id, status = ?business.status, "Blocked business sign-in");
        return Err(AppError::Forbidden("This business account is not allowed to sign in".to_string()));
    }

    tracing::info!(business_id = %business.id, "Business signed in");
    Ok(business)
}

pub async fn authenticate_student(
    pool: &PgPool,
    passwords: &Passwords,
    credentials: &Credentials,
) -> Result<User, AppError> {
    let email = normalize_email(&credentials.email).map_err(|_| invalid_credentials())?;
    let user = User::find_by_email(pool, &email)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !passwords.verify(&credentials.password, &user.password_hash).await {
        return Err(invalid_credentials());
    }

    if user.is_banned {
        tracing::warn!(user_id = %user.id, "Banned student sign-in refused");
        return Err(AppError::Forbidden("Account is banned".to_string()));
    }

    Ok(user)
}

/// Creates the configured first admin if no admin with that email exists.
pub async fn bootstrap_admin(
    pool: &PgPool,
    passwords: &Passwords,
    config: &Config,
) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        tracing::debug!("No bootstrap admin configured");
        return Ok(());
    };

    let email = normalize_email(email)?;
    let hash = passwords.hash(password.expose_secret()).await?;

    if Admin::create_if_missing(pool, &email, &hash, "Administrator").await? {
        tracing::info!(email = %email, "Bootstrap admin created");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Student@Uni.EDU ").unwrap(), "student@uni.edu");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@uni.edu").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a@.edu").is_err());
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required("  Taco Shack ", "Name").unwrap(), "Taco Shack");
        assert!(matches!(required("   ", "Name"), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_registration_validates_before_touching_database() {
        let passwords = Passwords::new(1024, 1).unwrap();
        let result = register_student(
            &crate::db::unreachable_pool(),
            &passwords,
            StudentRegistration {
                email: "student@uni.edu".to_string(),
                password: "short".to_string(),
                full_name: "Student".to_string(),
                university_id: None,
                campus_id: None,
                city_id: None,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_duplicate_student_email_conflicts(pool: PgPool) {
        let passwords = Passwords::new(1024, 1).unwrap();
        let registration = StudentRegistration {
            email: "dup@uni.edu".to_string(),
            password: "long enough".to_string(),
            full_name: "Dup".to_string(),
            university_id: None,
            campus_id: None,
            city_id: None,
        };

        register_student(&pool, &passwords, registration.clone()).await.unwrap();
        let again = register_student(&pool, &passwords, registration).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_pending_business_can_sign_in_but_banned_cannot(pool: PgPool) {
        let passwords = Passwords::new(1024, 1).unwrap();
        let business = register_business(
            &pool,
            &passwords,
            BusinessRegistration {
                email: "shop@example.com".to_string(),
                password: "long enough".to_string(),
                name: "Shop".to_string(),
                description: None,
                address: None,
            },
        )
        .await
        .unwrap();

        let credentials = Credentials {
            email: "SHOP@example.com".to_string(),
            password: "long enough".to_string(),
        };
        authenticate_business(&pool, &passwords, &credentials).await.unwrap();

        crate::services::moderation::moderate_business(
            &pool,
            business.id,
            crate::services::moderation::ModerationAction::Ban,
            None,
        )
        .await
        .unwrap();

        let refused = authenticate_business(&pool, &passwords, &credentials).await;
        assert!(matches!(refused, Err(AppError::Forbidden(_))));
    }
}
