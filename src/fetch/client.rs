use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends one HTTP request. Implemented by the real client and by wrappers.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
