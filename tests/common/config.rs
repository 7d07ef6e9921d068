//! Live-test configuration loaded from `.env`

use ar_courier::config::{StorageConfig, TransferConfig};

/// Load the FTP drop settings for live tests
///
/// Required environment variables:
/// - `FTP_SERVER_HOST` - Server hostname
/// - `FTP_SERVER_USER` - Login
/// - `FTP_SERVER_PASS` - Password
///
/// Optional environment variables:
/// - `FTP_SERVER_PORT` - Control port (default: 21)
/// - `FTP_SERVER_DIR` - Remote directory prefix (default: "")
pub fn load_storage_config() -> Option<StorageConfig> {
    dotenvy::dotenv().ok();

    Some(StorageConfig {
        host: std::env::var("FTP_SERVER_HOST").ok()?,
        port: std::env::var("FTP_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(21),
        username: std::env::var("FTP_SERVER_USER").ok()?,
        password: std::env::var("FTP_SERVER_PASS").ok()?,
        directory: std::env::var("FTP_SERVER_DIR").unwrap_or_default(),
    })
}

/// Transfer settings for live tests: defaults with a short settle delay
pub fn live_transfer_config() -> TransferConfig {
    TransferConfig {
        settle_delay: std::time::Duration::from_millis(10),
        ..TransferConfig::default()
    }
}

/// Check if live FTP credentials are available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("FTP_SERVER_HOST").is_ok()
        && std::env::var("FTP_SERVER_USER").is_ok()
        && std::env::var("FTP_SERVER_PASS").is_ok()
}

/// Skip test if credentials are not available
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: FTP credentials not found in .env");
            return;
        }
    };
}
