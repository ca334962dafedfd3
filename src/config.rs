use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Security
    pub secure_cookies: bool,
    pub password_memory_kib: u32,
    pub password_iterations: u32,

    // Outgoing mail (OTP delivery)
    pub smtp: Option<SmtpConfig>,

    // Billing provider
    pub stripe_secret_key: Option<Secret<String>>,
    pub stripe_api_base: String,

    // OTP demo accounts; only honoured when test mode is switched on
    pub otp_test_mode: bool,
    pub otp_bypass_emails: Vec<String>,

    // First admin account, created at startup if missing
    pub admin_email: Option<String>,
    pub admin_password: Option<Secret<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let smtp = match config.get::<String>("smtp_host") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: config.get("smtp_port").unwrap_or(587),
                username: config.get("smtp_username")?,
                password: Secret::new(config.get("smtp_password")?),
                from: config.get("mail_from")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url: config.get("base_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            secure_cookies: config.get("secure_cookies").unwrap_or(true),
            password_memory_kib: config.get("password_memory_kib").unwrap_or(19_456),
            password_iterations: config.get("password_iterations").unwrap_or(2),

            smtp,

            stripe_secret_key: config
                .get::<String>("stripe_secret_key")
                .ok()
                .map(Secret::new),
            stripe_api_base: config
                .get("stripe_api_base")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),

            otp_test_mode: config.get("otp_test_mode").unwrap_or(false),
            otp_bypass_emails: config
                .get::<String>("otp_bypass_emails")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),

            admin_email: config.get("admin_email").ok(),
            admin_password: config
                .get::<String>("admin_password")
                .ok()
                .map(Secret::new),
        })
    }

    /// Returns true when `email` is an OTP demo account and test mode is on.
    pub fn is_otp_bypass(&self, email: &str) -> bool {
        self.otp_test_mode
            && self
                .otp_bypass_emails
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(email.trim()))
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://campusdeals@127.0.0.1:1/campusdeals".to_string(),
        base_url: "http://localhost:3000".to_string(),
        host: "127.0.0.1".to_string(),
        port: 3000,
        secure_cookies: false,
        password_memory_kib: 1024,
        password_iterations: 1,
        smtp: None,
        stripe_secret_key: None,
        stripe_api_base: "https://api.stripe.com".to_string(),
        otp_test_mode: false,
        otp_bypass_emails: Vec::new(),
        admin_email: None,
        admin_password: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_list() {
        let emails = parse_email_list(" Demo@Example.com, ,review@example.com ");
        assert_eq!(emails, vec!["demo@example.com", "review@example.com"]);
    }

    #[test]
    fn test_otp_bypass_requires_test_mode() {
        let mut config = test_config();
        config.otp_bypass_emails = vec!["demo@example.com".to_string()];

        assert!(!config.is_otp_bypass("demo@example.com"));

        config.otp_test_mode = true;
        assert!(config.is_otp_bypass("DEMO@example.com "));
        assert!(!config.is_otp_bypass("someone@example.com"));
    }
}
