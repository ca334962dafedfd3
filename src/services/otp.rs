use chrono::{Duration, Utc};
use rand::Rng;
use ring::digest;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{User, VerificationCode};
use crate::services::mailer::{EmailMessage, Mailer};

pub const CODE_TTL_MINUTES: i64 = 10;

/// Outcome of an OTP request, as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpRequest {
    Sent,
    Bypassed,
}

/// Six decimal digits, zero padded.
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Codes are stored as SHA-256 over the address and the code.
pub fn hash_code(email: &str, code: &str) -> String {
    let input = format!("{}:{}", email, code.trim());
    hex::encode(digest::digest(&digest::SHA256, input.as_bytes()))
}

/// Issues a fresh code for a student account, replacing any earlier one.
#[tracing::instrument(skip(pool, mailer, config))]
pub async fn request_code(
    pool: &PgPool,
    mailer: &dyn Mailer,
    config: &Config,
    email: &str,
) -> Result<OtpRequest, AppError> {
    if config.is_otp_bypass(email) {
        tracing::warn!(email = %email, "OTP bypass account, no code sent");
        return Ok(OtpRequest::Bypassed);
    }

    User::find_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::not_found("Account"))?;

    let code = generate_code(&mut rand::thread_rng());
    let expires_at = Utc::now() + Duration::minutes(CODE_TTL_MINUTES);
    VerificationCode::replace(pool, email, &hash_code(email, &code), expires_at).await?;

    mailer
        .send(EmailMessage {
            to: email.to_string(),
            subject: "Your CampusDeals verification code".to_string(),
            body: format!(
                "Your verification code is {}. It expires in {} minutes.",
                code, CODE_TTL_MINUTES
            ),
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to send verification email: {}", e)))?;

    tracing::info!(email = %email, "Verification code sent");
    Ok(OtpRequest::Sent)
}

/// Checks a submitted code. On success the code is consumed and the account
/// marked verified.
#[tracing::instrument(skip(pool, config, code))]
pub async fn verify_code(
    pool: &PgPool,
    config: &Config,
    email: &str,
    code: &str,
) -> Result<(), AppError> {
    if config.is_otp_bypass(email) {
        tracing::warn!(email = %email, "OTP bypass account verified without a code");
        User::mark_verified(pool, email).await?;
        return Ok(());
    }

    // Matching and consuming happen in one statement so a code verifies once.
    let stored = VerificationCode::consume(pool, email, &hash_code(email, code))
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid verification code".to_string()))?;

    if stored.is_expired_at(Utc::now()) {
        return Err(AppError::Expired("Verification code has expired".to_string()));
    }

    if !User::mark_verified(pool, email).await? {
        return Err(AppError::not_found("Account"));
    }

    tracing::info!(email = %email, "Email verified");
    Ok(())
}
