use std::env;

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub smtp: SmtpConfig,
    pub cron: CronConfig,
    pub app_url: String,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from: String,
}

#[derive(Clone)]
pub struct CronConfig {
    /// Shared secret for scheduler requests. Absence makes every cron
    /// endpoint refuse with a configuration error (fail closed).
    pub secret: Option<String>,
    /// Warning emails go out when the deadline is at most this many days away.
    pub warning_window_days: i64,
    /// Warning emails are sent in groups of this size.
    pub warning_batch_size: usize,
    /// Pause between groups, to stay under provider rate limits.
    pub warning_batch_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        };
        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            user: env::var("SMTP_USER").ok(),
            pass: env::var("SMTP_PASS").ok(),
            from: env::var("SMTP_FROM")
                .unwrap_or_else(|_| "noreply@churchserver.app".to_string()),
        };
        let cron = CronConfig {
            secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            warning_window_days: env::var("WARNING_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            warning_batch_size: env::var("WARNING_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            warning_batch_delay_ms: env::var("WARNING_BATCH_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        };

        AppConfig {
            server,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://church:@localhost:5432/churchserver".to_string()),
            smtp,
            cron,
            app_url: env::var("APP_URL")
                .unwrap_or_else(|_| "https://app.churchserver.app".to_string()),
        }
    }
}
