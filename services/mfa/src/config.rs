/// MFA service configuration loaded from environment variables.
#[derive(Debug)]
pub struct MfaConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL.
    pub redis_url: String,
    /// TCP port to listen on (default 3114). Env var: `MFA_PORT`.
    pub mfa_port: u16,
}

impl MfaConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            redis_url: std::env::var("REDIS_URL").expect("REDIS_URL"),
            mfa_port: std::env::var("MFA_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3114),
        }
    }
}
