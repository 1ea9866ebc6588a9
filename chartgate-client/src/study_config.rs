//! The CVD study descriptor: fetched once per pool over HTTP, cached
//! indefinitely until pool restart (§6, §9's open question resolved as
//! "no re-fetch after reconnect — pool-lifetime cache").

use std::time::Duration;

use arc_swap::ArcSwapOption;
use chartgate_types::GatewayError;
use serde::Deserialize;

/// The vendor's CVD study template, as returned by the study-config
/// endpoint: a template id plus whatever parameter schema the vendor
/// currently exposes for it. The schema itself is opaque to this core — it
/// is threaded through to `create_study` calls verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct CvdStudyDescriptor {
    pub template_id: String,
    #[serde(default)]
    pub parameter_schema: serde_json::Value,
}

/// Holds the once-per-pool CVD study descriptor. A failed fetch (after one
/// retry on a 4xx response) disables CVD for the pool's lifetime rather
/// than being retried on every subsequent CVD-enabled request.
pub struct StudyConfig {
    descriptor: ArcSwapOption<CvdStudyDescriptor>,
    disabled: std::sync::atomic::AtomicBool,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            descriptor: ArcSwapOption::empty(),
            disabled: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl StudyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a `StudyConfig` with an already-resolved descriptor, bypassing
    /// `ensure_loaded`'s HTTP fetch entirely. Used by tests that need a CVD
    /// study available without a vendor endpoint to call.
    pub fn with_descriptor(descriptor: CvdStudyDescriptor) -> Self {
        Self {
            descriptor: ArcSwapOption::from_pointee(descriptor),
            disabled: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Fetches and caches the descriptor if it hasn't been resolved (or
    /// permanently disabled) yet. Safe to call from every pool startup path;
    /// only the first caller pays the network cost.
    pub async fn ensure_loaded(
        &self,
        http: &reqwest::Client,
        study_config_url: &str,
        timeout: Duration,
    ) -> Result<(), GatewayError> {
        if self.disabled.load(std::sync::atomic::Ordering::Acquire) {
            return Err(GatewayError::StudyConfigUnavailable);
        }
        if self.descriptor.load().is_some() {
            return Ok(());
        }

        match Self::fetch(http, study_config_url, timeout).await {
            Ok(descriptor) => {
                self.descriptor.store(Some(std::sync::Arc::new(descriptor)));
                Ok(())
            }
            Err(first_err) => match Self::fetch(http, study_config_url, timeout).await {
                Ok(descriptor) => {
                    self.descriptor.store(Some(std::sync::Arc::new(descriptor)));
                    Ok(())
                }
                Err(_) => {
                    self.disabled.store(true, std::sync::atomic::Ordering::Release);
                    Err(first_err)
                }
            },
        }
    }

    pub fn descriptor(&self) -> Option<std::sync::Arc<CvdStudyDescriptor>> {
        self.descriptor.load_full()
    }

    async fn fetch(
        http: &reqwest::Client,
        url: &str,
        timeout: Duration,
    ) -> Result<CvdStudyDescriptor, GatewayError> {
        let response = http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| GatewayError::StudyError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::StudyError(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<CvdStudyDescriptor>()
            .await
            .map_err(|e| GatewayError::StudyError(e.to_string()))
    }
}
