use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use admit_limit::Governor;
use admit_limit::Suppressor;
use admit_limit::Sweep;
use quanta::Clock;
use tokio::task::JoinHandle;

use crate::config::AdmissionConfig;
use crate::config::ConfigError;
use crate::layer::GovernorLayer;
use crate::reaper::spawn_reaper;
use crate::views::ViewRecorder;
use crate::views::ViewSink;

/// Admission state for a whole process, built once from configuration.
///
/// Holds one [`Governor`] per protected operation and one [`Suppressor`] shared by
/// every read path. Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct Admission {
    governors: HashMap<String, Arc<Governor>>,
    suppressor: Arc<Suppressor>,
    sweep_interval: Option<Duration>,
}

impl Admission {
    pub fn from_config(config: &AdmissionConfig) -> Self {
        Self::with_clock(config, Clock::new())
    }

    pub fn with_clock(config: &AdmissionConfig, clock: Clock) -> Self {
        let governors = config
            .limits
            .iter()
            .map(|(operation, tiers)| {
                let governor =
                    Governor::with_clock(tiers.iter().copied().map(Into::into), clock.clone());
                (operation.clone(), Arc::new(governor))
            })
            .collect();

        Self {
            governors,
            suppressor: Arc::new(Suppressor::with_clock(config.views.cool_down(), clock)),
            sweep_interval: config.views.sweep_interval(),
        }
    }

    pub fn governor(&self, operation: &str) -> Result<Arc<Governor>, ConfigError> {
        self.governors.get(operation).cloned().ok_or_else(|| {
            ConfigError::Invalid(format!("no limits configured for operation `{operation}`"))
        })
    }

    /// A layer guarding `operation`, keyed by the client's real IP.
    pub fn layer(&self, operation: &str) -> Result<GovernorLayer, ConfigError> {
        Ok(GovernorLayer::new(self.governor(operation)?).with_operation(operation))
    }

    pub fn suppressor(&self) -> Arc<Suppressor> {
        Arc::clone(&self.suppressor)
    }

    pub fn recorder<S: ViewSink>(&self, sink: Arc<S>) -> ViewRecorder<S> {
        ViewRecorder::new(self.suppressor(), sink)
    }

    /// Start the background sweep if `views.sweep_interval` is configured.
    pub fn spawn_reaper(&self) -> Option<JoinHandle<()>> {
        let every = self.sweep_interval?;
        let mut targets: Vec<Arc<dyn Sweep + Send + Sync>> = self
            .governors
            .values()
            .map(|governor| Arc::clone(governor) as Arc<dyn Sweep + Send + Sync>)
            .collect();
        targets.push(self.suppressor());
        Some(spawn_reaper(targets, every))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
limits:
  get_document:
    - { amount: 3, period: 1 }
    - { amount: 5, period: 60 }
  post_document:
    - { amount: 1, period: 2 }
  ping: []
views:
  cool_down: 60
"#;

    fn admission() -> (Admission, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let config = AdmissionConfig::from_yaml(CONFIG).unwrap();
        (Admission::with_clock(&config, clock), mock)
    }

    #[test]
    fn it_builds_one_governor_per_operation() {
        let (admission, _mock) = admission();

        let get = admission.governor("get_document").unwrap();
        assert_eq!(get.tiers().len(), 2);
        for _ in 0..3 {
            assert!(get.is_allowed("10.0.0.1"));
        }
        assert!(!get.is_allowed("10.0.0.1"));

        // Operations do not share quotas.
        let post = admission.governor("post_document").unwrap();
        assert!(post.is_allowed("10.0.0.1"));
        assert!(!post.is_allowed("10.0.0.1"));

        let ping = admission.governor("ping").unwrap();
        for _ in 0..100 {
            assert!(ping.is_allowed("10.0.0.1"));
        }
    }

    #[test]
    fn test_clones_share_state() {
        let (admission, _mock) = admission();
        let clone = admission.clone();

        assert!(admission.governor("post_document").unwrap().is_allowed("a"));
        assert!(!clone.governor("post_document").unwrap().is_allowed("a"));

        assert!(admission.suppressor().should_apply("doc", "a"));
        assert!(!clone.suppressor().should_apply("doc", "a"));
    }

    #[test]
    fn test_cool_down_from_config() {
        let (admission, mock) = admission();
        let views = admission.suppressor();

        assert!(views.should_apply("doc", "a"));
        mock.increment(Duration::from_secs(59));
        assert!(!views.should_apply("doc", "a"));
        mock.increment(Duration::from_secs(1));
        assert!(views.should_apply("doc", "a"));
    }

    #[test]
    fn test_unknown_operation() {
        let (admission, _mock) = admission();
        assert!(matches!(
            admission.governor("delete_document"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(admission.layer("delete_document").is_err());
    }

    #[tokio::test]
    async fn test_reaper_only_when_configured() {
        let (admission, _mock) = admission();
        assert!(admission.spawn_reaper().is_none());

        let mut config = AdmissionConfig::from_yaml(CONFIG).unwrap();
        config.views.sweep_interval = Some(300);
        let reaper = Admission::from_config(&config).spawn_reaper().unwrap();
        reaper.abort();
    }
}
