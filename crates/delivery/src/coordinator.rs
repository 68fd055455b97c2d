//! The delivery coordinator.
//!
//! Each authenticated event moves through parse → route → dispatch
//! synchronously on the request path; only the publish itself runs on a
//! spawned task. Spawned publishes are tracked so that shutdown can wait for
//! every one of them with [`DeliveryCoordinator::wait_for_drain`].
//!
//! There is no cap on in-flight publishes and no ordering across events.

use std::sync::Arc;

use routing::{
    topic_for, ConfigProvider, DeliveryError, EventBody, EventId, EventKind, InboundEvent,
    OutboundMessage, Publisher, TopicName,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, Instrument};

/// Routes authenticated hook events and publishes them asynchronously.
pub struct DeliveryCoordinator {
    publisher: Arc<dyn Publisher>,
    config: Arc<dyn ConfigProvider>,
    tracker: TaskTracker,
}

impl DeliveryCoordinator {
    pub fn new(publisher: Arc<dyn Publisher>, config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            publisher,
            config,
            tracker: TaskTracker::new(),
        }
    }

    /// Routes `event` and, if a topic matches, dispatches one publish.
    ///
    /// Returns the topic the publish was dispatched to. The publish outcome is
    /// only logged; it never reaches the caller. Must be called from within a
    /// tokio runtime.
    pub fn deliver(&self, event: InboundEvent) -> Result<TopicName, DeliveryError> {
        let body = EventBody::decode(&event.payload)?;

        let kind = body.kind();
        let coordinates = body.coordinates();
        let config = self.config.current()?;

        let (topic, event_kind) = topic_for(&config, &coordinates, &kind)
            .zip(EventKind::parse(&kind))
            .ok_or_else(|| DeliveryError::NoMatchingTopic {
                coordinates: coordinates.clone(),
                kind: kind.clone(),
            })?;

        let event_id = event.event_id.clone();

        debug!(
            hook = %event.hook,
            event_id = event_id.as_ref().map(EventId::as_str).unwrap_or_default(),
            owner = %coordinates.owner,
            repo = %coordinates.repo,
            event_kind = %event_kind,
            topic = %topic,
            "routed hook event"
        );

        let message = OutboundMessage::project(event_kind, &event.headers, event.payload);
        self.dispatch(topic.clone(), event_id, message);

        Ok(topic)
    }

    /// Like [`DeliveryCoordinator::deliver`], but logs the failure instead of
    /// returning it. Routing misses are informational; anything else is an
    /// error.
    pub fn handle(&self, event: InboundEvent) {
        match self.deliver(event) {
            Ok(_) => {}
            Err(e @ DeliveryError::NoMatchingTopic { .. }) => info!(error = %e, "event dropped"),
            Err(e) => error!(error = %e, "event dropped"),
        }
    }

    fn dispatch(&self, topic: TopicName, event_id: Option<EventId>, message: OutboundMessage) {
        let publisher = Arc::clone(&self.publisher);

        self.tracker.spawn(
            async move {
                let event_id = event_id.as_ref().map(EventId::as_str).unwrap_or_default();
                match publisher.publish(&topic, &message).await {
                    Ok(()) => info!(topic = %topic, event_id, "published hook event"),
                    Err(e) => error!(
                        topic = %topic,
                        event_id,
                        error = %e,
                        "failed to publish hook event"
                    ),
                }
            }
            .in_current_span(),
        );
    }

    /// Number of publishes dispatched but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every dispatched publish has completed, successfully or
    /// not. Publishes dispatched while waiting are waited for too.
    pub async fn wait_for_drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use routing::{
        BotConfig, ConfigError, Configuration, HookClass, InboundHeaders, PublishError,
        RepoFilter, SharedConfig,
    };
    use tokio::sync::Semaphore;

    // ─── Test doubles ───

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(TopicName, OutboundMessage)>>,
    }

    impl RecordingPublisher {
        fn published(&self) -> Vec<(TopicName, OutboundMessage)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &TopicName,
            message: &OutboundMessage,
        ) -> Result<(), PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.clone(), message.clone()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingPublisher {
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl Publisher for FailingPublisher {
        async fn publish(
            &self,
            topic: &TopicName,
            _message: &OutboundMessage,
        ) -> Result<(), PublishError> {
            *self.attempts.lock().unwrap() += 1;
            Err(PublishError::Transport {
                topic: topic.to_string(),
                message: "broker unavailable".to_string(),
            })
        }
    }

    /// Blocks every publish until a permit is released.
    struct GatedPublisher {
        gate: Semaphore,
        completed: Mutex<usize>,
    }

    #[async_trait]
    impl Publisher for GatedPublisher {
        async fn publish(
            &self,
            _topic: &TopicName,
            _message: &OutboundMessage,
        ) -> Result<(), PublishError> {
            self.gate.acquire().await.unwrap().forget();
            *self.completed.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Collects formatted log output for the current thread.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let writer = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || writer.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::INFO)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn lines_containing(&self, needle: &str) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter(|line| line.contains(needle))
                .map(str::to_string)
                .collect()
        }
    }

    // ─── Helpers ───

    fn single_push_config(topic: &str) -> Arc<dyn ConfigProvider> {
        let config = Configuration::single(BotConfig::new(topic).with_system_hook_events(["push"]))
            .prepare()
            .unwrap();
        Arc::new(SharedConfig::new(config))
    }

    fn system_hook(payload: &'static str) -> InboundEvent {
        InboundEvent {
            hook: HookClass::System,
            event_id: None,
            headers: InboundHeaders::from_pairs([
                ("Content-Type", "application/json"),
                ("X-Gitlab-Event", "System Hook"),
                ("X-Gitlab-Event-UUID", "uuid-1"),
                ("X-Gitlab-Token", "token"),
            ]),
            payload: Bytes::from_static(payload.as_bytes()),
        }
    }

    const PUSH: &str = r#"{"object_kind":"push","project":{"name":"r1","namespace":"o1"}}"#;

    // ─── Routing ───

    #[tokio::test]
    async fn routed_event_is_published_once_with_body_unchanged() {
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        let topic = coordinator.deliver(system_hook(PUSH)).unwrap();
        coordinator.wait_for_drain().await;

        assert_eq!(topic.as_str(), "T1");
        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0.as_str(), "T1");
        assert_eq!(published[0].1.body, Bytes::from_static(PUSH.as_bytes()));
        assert_eq!(
            published[0].1.headers.get("X-Gitlab-Event").map(String::as_str),
            Some("Push Hook")
        );
    }

    #[tokio::test]
    async fn object_kind_is_matched_case_insensitively() {
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        let topic = coordinator
            .deliver(system_hook(
                r#"{"object_kind":"PUSH","project":{"name":"r1","namespace":"o1"}}"#,
            ))
            .unwrap();
        coordinator.wait_for_drain().await;

        assert_eq!(topic.as_str(), "T1");
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribed_kind_is_not_published() {
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        let err = coordinator
            .deliver(system_hook(
                r#"{"object_kind":"tag_push","project":{"name":"r1","namespace":"o1"}}"#,
            ))
            .unwrap_err();
        coordinator.wait_for_drain().await;

        assert!(matches!(
            err,
            DeliveryError::NoMatchingTopic { ref kind, .. } if kind == "tag_push"
        ));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_not_published() {
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        let err = coordinator.deliver(system_hook("{not json")).unwrap_err();
        coordinator.handle(system_hook("{not json"));
        coordinator.wait_for_drain().await;

        assert!(matches!(err, DeliveryError::MalformedPayload(_)));
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn multi_rule_configuration_routes_by_org() {
        let config = Configuration::with_items(
            vec![
                BotConfig::new("A")
                    .with_system_hook_events(["push"])
                    .with_filter(RepoFilter {
                        repos: vec!["o1".to_string()],
                        excluded_repos: Vec::new(),
                    }),
                BotConfig::new("B").with_system_hook_events(["push"]),
            ],
            None,
        )
        .prepare()
        .unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator =
            DeliveryCoordinator::new(publisher.clone(), Arc::new(SharedConfig::new(config)));

        let a = coordinator
            .deliver(system_hook(
                r#"{"object_kind":"push","project":{"name":"anyRepo","namespace":"o1"}}"#,
            ))
            .unwrap();
        let b = coordinator
            .deliver(system_hook(
                r#"{"object_kind":"push","project":{"name":"anyRepo","namespace":"o2"}}"#,
            ))
            .unwrap();
        coordinator.wait_for_drain().await;

        assert_eq!(a.as_str(), "A");
        assert_eq!(b.as_str(), "B");
        assert_eq!(publisher.published().len(), 2);
    }

    #[tokio::test]
    async fn reloaded_configuration_applies_to_later_events() {
        let shared = SharedConfig::new(
            Configuration::single(BotConfig::new("T1").with_system_hook_events(["push"]))
                .prepare()
                .unwrap(),
        );
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), Arc::new(shared.clone()));

        assert_eq!(coordinator.deliver(system_hook(PUSH)).unwrap().as_str(), "T1");

        shared
            .replace(Configuration::single(
                BotConfig::new("T2").with_system_hook_events(["push"]),
            ))
            .unwrap();

        assert_eq!(coordinator.deliver(system_hook(PUSH)).unwrap().as_str(), "T2");
        coordinator.wait_for_drain().await;
    }

    #[tokio::test]
    async fn unavailable_configuration_drops_event() {
        let publisher = Arc::new(RecordingPublisher::default());
        let provider = || -> Result<Arc<Configuration>, ConfigError> {
            Err(ConfigError::Unavailable {
                message: "not loaded".to_string(),
            })
        };
        let coordinator = DeliveryCoordinator::new(publisher.clone(), Arc::new(provider));

        let err = coordinator.deliver(system_hook(PUSH)).unwrap_err();
        coordinator.wait_for_drain().await;

        assert!(matches!(err, DeliveryError::Config(_)));
        assert!(publisher.published().is_empty());
    }

    // ─── Publish failures ───

    #[tokio::test]
    async fn publish_failure_is_not_retried() {
        let publisher = Arc::new(FailingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        // Routing succeeds; the failure surfaces only in the log.
        assert!(coordinator.deliver(system_hook(PUSH)).is_ok());
        coordinator.wait_for_drain().await;

        assert_eq!(*publisher.attempts.lock().unwrap(), 1);
        assert_eq!(coordinator.in_flight(), 0);
    }

    // ─── Logging ───

    #[tokio::test]
    async fn routing_miss_logs_one_info_entry() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        coordinator.handle(system_hook(
            r#"{"object_kind":"tag_push","project":{"name":"r1","namespace":"o1"}}"#,
        ));
        coordinator.wait_for_drain().await;

        let dropped = logs.lines_containing("event dropped");
        assert_eq!(dropped.len(), 1, "{dropped:?}");
        assert!(dropped[0].contains("INFO"), "{}", dropped[0]);
        assert!(dropped[0].contains("tag_push"), "{}", dropped[0]);
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_logs_one_error_entry() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let coordinator = DeliveryCoordinator::new(
            Arc::new(RecordingPublisher::default()),
            single_push_config("T1"),
        );

        coordinator.handle(system_hook("{not json"));
        coordinator.wait_for_drain().await;

        let dropped = logs.lines_containing("event dropped");
        assert_eq!(dropped.len(), 1, "{dropped:?}");
        assert!(dropped[0].contains("ERROR"), "{}", dropped[0]);
        assert!(dropped[0].contains("failed to decode hook payload"), "{}", dropped[0]);
    }

    #[tokio::test]
    async fn publish_failure_logs_one_error_with_topic_and_cause() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let coordinator = DeliveryCoordinator::new(
            Arc::new(FailingPublisher::default()),
            single_push_config("T1"),
        );
        let mut event = system_hook(PUSH);
        event.event_id = EventId::new("uuid-1");

        coordinator.handle(event);
        coordinator.wait_for_drain().await;

        let failed = logs.lines_containing("failed to publish hook event");
        assert_eq!(failed.len(), 1, "{failed:?}");
        assert!(failed[0].contains("ERROR"), "{}", failed[0]);
        assert!(failed[0].contains("topic=T1"), "{}", failed[0]);
        assert!(failed[0].contains("event_id=\"uuid-1\""), "{}", failed[0]);
        assert!(failed[0].contains("broker unavailable"), "{}", failed[0]);
        assert!(logs.lines_containing("published hook event").is_empty());
    }

    #[tokio::test]
    async fn successful_publish_logs_topic_at_info() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let coordinator = DeliveryCoordinator::new(
            Arc::new(RecordingPublisher::default()),
            single_push_config("T1"),
        );

        coordinator.handle(system_hook(PUSH));
        coordinator.wait_for_drain().await;

        let published = logs.lines_containing("published hook event");
        assert_eq!(published.len(), 1, "{published:?}");
        assert!(published[0].contains("INFO"), "{}", published[0]);
        assert!(published[0].contains("topic=T1"), "{}", published[0]);
        assert!(logs.lines_containing("event dropped").is_empty());
    }

    // ─── Drain ───

    #[tokio::test]
    async fn drain_waits_for_every_in_flight_publish() {
        const N: usize = 5;

        let publisher = Arc::new(GatedPublisher {
            gate: Semaphore::new(0),
            completed: Mutex::new(0),
        });
        let coordinator = Arc::new(DeliveryCoordinator::new(
            publisher.clone(),
            single_push_config("T1"),
        ));

        for _ in 0..N {
            coordinator.deliver(system_hook(PUSH)).unwrap();
        }
        assert_eq!(coordinator.in_flight(), N);

        let drain = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.wait_for_drain().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!drain.is_finished());
        assert_eq!(*publisher.completed.lock().unwrap(), 0);

        publisher.gate.add_permits(N - 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!drain.is_finished());

        publisher.gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), drain)
            .await
            .expect("drain should finish once every publish completes")
            .unwrap();

        assert_eq!(*publisher.completed.lock().unwrap(), N);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_with_nothing_in_flight_returns_immediately() {
        let coordinator = DeliveryCoordinator::new(
            Arc::new(RecordingPublisher::default()),
            single_push_config("T1"),
        );

        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_drain())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn coordinator_accepts_events_after_drain() {
        let publisher = Arc::new(RecordingPublisher::default());
        let coordinator = DeliveryCoordinator::new(publisher.clone(), single_push_config("T1"));

        coordinator.deliver(system_hook(PUSH)).unwrap();
        coordinator.wait_for_drain().await;
        coordinator.deliver(system_hook(PUSH)).unwrap();
        coordinator.wait_for_drain().await;

        assert_eq!(publisher.published().len(), 2);
    }
}
