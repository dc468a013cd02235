//! Formats stored postings into push messages.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{PostingRecord, PushConfig, Source};
use crate::push::{AndroidHints, PushMessage, PushService};

/// Sends one notification per newly stored posting.
#[derive(Clone)]
pub struct Notifier {
    push: Arc<dyn PushService>,
    topic: String,
    android_channel_id: String,
    click_action: String,
    timeout: Duration,
}

impl Notifier {
    pub fn new(push: Arc<dyn PushService>, config: &PushConfig) -> Self {
        Self {
            push,
            topic: config.topic.clone(),
            android_channel_id: config.android_channel_id.clone(),
            click_action: config.click_action.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn message(&self, source: Source, body: String, link: &str) -> PushMessage {
        PushMessage {
            topic: self.topic.clone(),
            title: format!("[{}]", source.display_name()),
            body,
            data: BTreeMap::from([
                ("link".to_string(), link.to_string()),
                ("source".to_string(), source.tag().to_string()),
                ("click_action".to_string(), self.click_action.clone()),
            ]),
            android: AndroidHints::high(self.android_channel_id.clone()),
        }
    }

    /// Message announcing a stored posting.
    pub fn build_message(&self, record: &PostingRecord) -> PushMessage {
        self.message(record.source, record.title.clone(), &record.link)
    }

    /// Message used to check delivery for a source.
    pub fn test_message(&self, source: Source, link: &str) -> PushMessage {
        let body = format!(
            "테스트 알림: {} 알림이 정상적으로 발송됩니다.",
            source.display_name()
        );
        self.message(source, body, link)
    }

    /// Deliver a message within the configured timeout.
    pub async fn send(&self, message: &PushMessage) -> Result<String> {
        tokio::time::timeout(self.timeout, self.push.send(message))
            .await
            .map_err(|_| AppError::timeout(format!("push to {}", message.topic)))?
    }

    /// Notify about a newly stored posting.
    ///
    /// Failures are logged and reported as `false`; the record stays stored.
    pub async fn notify(&self, record: &PostingRecord) -> bool {
        let message = self.build_message(record);
        match self.send(&message).await {
            Ok(id) => {
                log::info!("[{}] Push sent ({}): {}", record.source, id, record.title);
                true
            }
            Err(e) => {
                log::error!(
                    "[{}] Push failed for '{}' via {}: {}",
                    record.source,
                    record.title,
                    self.push.name(),
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::LogPush;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FailingPush;

    #[async_trait]
    impl PushService for FailingPush {
        async fn send(&self, message: &PushMessage) -> Result<String> {
            Err(AppError::push(&message.topic, "credentials rejected"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn record() -> PostingRecord {
        PostingRecord {
            id: "abc".into(),
            source: Source::Kams,
            number: "88".into(),
            title: "2026 예술경영 컨설팅 지원 공모".into(),
            date: "2026-02-11".into(),
            link: "https://www.gokams.or.kr/01_news/notice_view.asp?idx=2001".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_message() {
        let notifier = Notifier::new(Arc::new(LogPush::new()), &PushConfig::default());
        let message = notifier.build_message(&record());

        assert_eq!(message.topic, "lh_notice");
        assert_eq!(message.title, "[예술경영지원센터 알림]");
        assert_eq!(message.body, "2026 예술경영 컨설팅 지원 공모");
        assert_eq!(message.data["source"], "KAMS");
        assert_eq!(message.data["click_action"], "FLUTTER_NOTIFICATION_CLICK");
        assert_eq!(
            message.data["link"],
            "https://www.gokams.or.kr/01_news/notice_view.asp?idx=2001"
        );
        assert_eq!(message.android, AndroidHints::high("lh_notice_channel"));
    }

    #[test]
    fn test_test_message() {
        let notifier = Notifier::new(Arc::new(LogPush::new()), &PushConfig::default());
        let message = notifier.test_message(Source::SeoulPublicArt, "https://www.seoul.go.kr");
        assert_eq!(message.title, "[서울 공공미술 공모 알림]");
        assert!(message.body.starts_with("테스트 알림"));
        assert_eq!(message.data["source"], "SeoulPublicArt");
    }

    #[tokio::test]
    async fn test_notify_reports_outcome() {
        let ok = Notifier::new(Arc::new(LogPush::new()), &PushConfig::default());
        assert!(ok.notify(&record()).await);

        let failing = Notifier::new(Arc::new(FailingPush), &PushConfig::default());
        assert!(!failing.notify(&record()).await);
    }
}
