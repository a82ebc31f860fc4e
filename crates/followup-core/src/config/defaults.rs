//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "followup".to_string()
}

pub fn default_data_dir() -> String {
    "~/.followup".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_db_path() -> String {
    "~/.followup/data/followup.db".to_string()
}

pub fn default_email_base_url() -> String {
    "https://api.resend.com".to_string()
}

pub fn default_email_from() -> String {
    "Job Tracker <notifications@yourdomain.com>".to_string()
}

pub fn default_email_timeout() -> u64 {
    30
}

pub fn default_poll_interval() -> u64 {
    300
}

pub fn default_delivery_timeout() -> u64 {
    60
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}

pub fn default_notification_title() -> String {
    "Job Application Reminder".to_string()
}
