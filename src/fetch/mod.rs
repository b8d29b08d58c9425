//! HTTP access to the hourly weather archive.

mod basic;
mod client;
pub mod open_meteo;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use open_meteo::{HourlyRequest, OpenMeteoClient, WeatherApi, parse_hourly};

use anyhow::Result;
use bytes::Bytes;
use reqwest::StatusCode;

/// Issues a GET and returns the status together with the full body.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<(StatusCode, Bytes)> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    Ok((status, resp.bytes().await?))
}
