pub mod retry;
pub mod webdriver;

use async_trait::async_trait;

use crate::error::DriverError;

pub use retry::RetryPolicy;
pub use webdriver::{WebDriverLauncher, WebDriverSession};

/// Starts browser sessions. Each session is a scoped resource the caller must close.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self, headless: bool) -> Result<Box<dyn BrowserSession>, DriverError>;
}

/// One live browser window pointed at the captcha form.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// Reload the current page; the site renders a fresh captcha on every load.
    async fn refresh(&self) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}
