use async_trait::async_trait;
#[cfg(feature = "push")]
use log::info;
#[cfg(feature = "push")]
use std::time::Duration;

use crate::metrics::MetricRegistry;
use crate::utils::error::CollectorError;

/// Receives the registry at the end of every cycle that reached the device.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn publish(&self, metrics: &MetricRegistry) -> Result<(), CollectorError>;
    fn publisher_type(&self) -> &str;
    fn destination(&self) -> &str;
}

pub fn job_name(device_id: &str) -> String {
    format!("modbus_collector_{}", device_id)
}

/// `http://` is assumed when the gateway URL has no scheme. The job name is
/// percent-encoded as a single path segment.
#[cfg(feature = "push")]
pub fn push_url(gateway: &str, job: &str) -> Result<reqwest::Url, CollectorError> {
    let base = gateway.trim();
    let base = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{}", base)
    };

    let mut url = reqwest::Url::parse(&base).map_err(|e| {
        CollectorError::ConfigError(format!("Invalid push gateway URL '{}': {}", gateway, e))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            CollectorError::ConfigError(format!("Push gateway URL '{}' cannot take a path", gateway))
        })?
        .pop_if_empty()
        .extend(["metrics", "job", job]);
    Ok(url)
}

/// Replaces the job's metric group on a Prometheus push gateway (HTTP PUT).
#[cfg(feature = "push")]
pub struct PushGatewaySender {
    client: reqwest::Client,
    url: reqwest::Url,
}

#[cfg(feature = "push")]
impl PushGatewaySender {
    pub fn new(gateway: &str, device_id: &str, timeout: Duration) -> Result<Self, CollectorError> {
        let url = push_url(gateway, &job_name(device_id))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[cfg(feature = "push")]
#[async_trait]
impl MetricsPublisher for PushGatewaySender {
    async fn publish(&self, metrics: &MetricRegistry) -> Result<(), CollectorError> {
        let body = metrics.encode_text()?;
        let response = self
            .client
            .put(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, prometheus::TEXT_FORMAT)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::PublishError(format!(
                "Push gateway {} answered HTTP {}",
                self.url, status
            )));
        }

        info!("📤 Pushed metrics to {}", self.url);
        Ok(())
    }

    fn publisher_type(&self) -> &str {
        "pushgateway"
    }

    fn destination(&self) -> &str {
        self.url.as_str()
    }
}
