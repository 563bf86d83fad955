use std::time::Duration;

use crate::{
    data_collector::NoopDataCollector, transport::HttpTransport, DataCollector, OfrepProvider,
    Result,
};

/// Configuration for [`OfrepProvider`].
pub struct ProviderConfig {
    pub(crate) endpoint: String,
    pub(crate) api_key: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) polling_interval: Duration,
    pub(crate) polling_jitter: Duration,
    pub(crate) timeout: Duration,
    pub(crate) data_collector: Box<dyn DataCollector + Send + Sync>,
    pub(crate) transport: Option<Box<dyn HttpTransport + Send + Sync>>,
}

impl ProviderConfig {
    /// Default interval between two bulk evaluations.
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5 * 60);
    /// Default jitter applied to the polling interval (none).
    pub const DEFAULT_POLLING_JITTER: Duration = Duration::ZERO;
    /// Default timeout of a bulk evaluation request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a default configuration for the server at `endpoint`.
    ///
    /// The bulk evaluation path (`/ofrep/v1/evaluate/flags`) is appended to the endpoint.
    ///
    /// ```
    /// # use ofrep::ProviderConfig;
    /// ProviderConfig::from_endpoint("http://localhost:1031");
    /// ```
    pub fn from_endpoint(endpoint: impl Into<String>) -> Self {
        ProviderConfig {
            endpoint: endpoint.into(),
            api_key: None,
            headers: Vec::new(),
            polling_interval: ProviderConfig::DEFAULT_POLLING_INTERVAL,
            polling_jitter: ProviderConfig::DEFAULT_POLLING_JITTER,
            timeout: ProviderConfig::DEFAULT_TIMEOUT,
            data_collector: Box::new(NoopDataCollector),
            transport: None,
        }
    }

    /// Authenticate requests with `Authorization: Bearer <api_key>`.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Add a static header sent with every request.
    ///
    /// ```
    /// # use ofrep::ProviderConfig;
    /// let config = ProviderConfig::from_endpoint("http://localhost:1031")
    ///     .header("X-Client", "checkout-service");
    /// ```
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the interval between two bulk evaluations.
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Set the maximum random duration subtracted from each polling interval. This helps to
    /// avoid many instances synchronizing and producing spiky load on the server.
    pub fn polling_jitter(mut self, jitter: Duration) -> Self {
        self.polling_jitter = jitter;
        self
    }

    /// Set the timeout of bulk evaluation requests. Ignored when a custom transport is set.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a data collector receiving a usage event for every flag read.
    ///
    /// ```
    /// # use ofrep::{FeatureEvent, ProviderConfig};
    /// let config = ProviderConfig::from_endpoint("http://localhost:1031")
    ///     .data_collector(|event: FeatureEvent| {
    ///         println!("{:?}", event);
    ///     });
    /// ```
    pub fn data_collector(
        mut self,
        data_collector: impl DataCollector + Send + Sync + 'static,
    ) -> Self {
        self.data_collector = Box::new(data_collector);
        self
    }

    /// Replace the default `reqwest`-based HTTP transport.
    pub fn transport(mut self, transport: impl HttpTransport + Send + Sync + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Static headers sent with every request, including the authorization header.
    pub(crate) fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            headers.push(("Authorization".to_owned(), format!("Bearer {api_key}")));
        }
        headers
    }

    /// Create a new [`OfrepProvider`] using this configuration.
    pub fn to_provider(self) -> Result<OfrepProvider> {
        OfrepProvider::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderConfig;

    #[test]
    fn api_key_becomes_bearer_header() {
        let config = ProviderConfig::from_endpoint("http://localhost:1031")
            .header("X-Client", "test")
            .api_key("secret");

        assert_eq!(
            config.request_headers(),
            vec![
                ("X-Client".to_owned(), "test".to_owned()),
                ("Authorization".to_owned(), "Bearer secret".to_owned()),
            ]
        );
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let config = ProviderConfig::from_endpoint("http://localhost:1031").api_key("  ");

        assert!(config.request_headers().is_empty());
    }
}
