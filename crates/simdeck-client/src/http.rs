//! reqwest-backed [`ControlApi`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::api::ControlApi;
use crate::error::{Error, Result};
use crate::wire::{Ack, MetricsReport, NetworkSpec, SimulationConfig, StatusSnapshot, StopAck};

/// HTTP client for an engine reachable at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpControlClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpControlClient {
    /// Create a client. `timeout` bounds every request end to end.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidAddress(base_url));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    /// The engine address requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        trace!(path, "GET");
        let response = self.http.get(self.url(path)).send().await?;
        decode(response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        trace!(path, "POST");
        let response = self.http.post(self.url(path)).send().await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        trace!(path, "POST");
        let response = self.http.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        debug!(status = status.as_u16(), "engine rejected request");
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ControlApi for HttpControlClient {
    async fn start(&self, config: &SimulationConfig) -> Result<Ack> {
        self.post_json("start_simulation", &config.start_request()).await
    }

    async fn pause(&self) -> Result<Ack> {
        self.post_empty("pause_simulation").await
    }

    async fn resume(&self) -> Result<Ack> {
        self.post_empty("resume_simulation").await
    }

    async fn stop(&self) -> Result<StopAck> {
        let mut ack: StopAck = self.post_empty("stop_simulation").await?;
        ack.metrics = ack.metrics.map(MetricsReport::validate).transpose()?;
        Ok(ack)
    }

    async fn reset(&self) -> Result<Ack> {
        self.post_empty("reset_simulation").await
    }

    async fn configure_network(&self, network: &NetworkSpec) -> Result<Ack> {
        self.post_json("configure_network", network).await
    }

    async fn get_status(&self) -> Result<StatusSnapshot> {
        self.get_json::<StatusSnapshot>("get_status").await?.validate()
    }

    async fn get_metrics(&self) -> Result<MetricsReport> {
        self.get_json::<MetricsReport>("get_metrics").await?.validate()
    }

    async fn get_topology(&self) -> Result<NetworkSpec> {
        self.get_json("get_topology").await
    }
}
