use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EntryId, Job};
use crate::error::{Result, SchedulerError};

/// A single scheduled notification: one GET to `notify_url`.
///
/// Immutable once built; the handle is assigned before construction.
pub struct TaskJob {
    id: EntryId,
    notify_url: String,
    param: String,
    time_str: String,
    client: reqwest::Client,
    finished: mpsc::UnboundedSender<EntryId>,
}

/// Serializable listing view of a [`TaskJob`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub id: EntryId,
    pub notify_url: String,
    pub param: String,
    pub time_str: String,
    /// RFC 3339 instant of the next firing; `None` once disarmed.
    pub next_run: Option<String>,
}

impl TaskJob {
    pub(crate) fn new(
        id: EntryId,
        notify_url: &str,
        param: &str,
        time_str: &str,
        client: reqwest::Client,
        finished: mpsc::UnboundedSender<EntryId>,
    ) -> Self {
        Self {
            id,
            notify_url: notify_url.to_string(),
            param: param.to_string(),
            time_str: time_str.to_string(),
            client,
            finished,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn notify_url(&self) -> &str {
        &self.notify_url
    }

    /// Opaque caller payload; only ever written to logs.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// The timestamp exactly as submitted.
    pub fn time_str(&self) -> &str {
        &self.time_str
    }

    pub(crate) fn view(&self, next_run: Option<String>) -> TaskView {
        TaskView {
            id: self.id,
            notify_url: self.notify_url.clone(),
            param: self.param.clone(),
            time_str: self.time_str.clone(),
            next_run,
        }
    }

    /// Issue the GET. The client carries the timeout.
    async fn notify(&self) -> Result<StatusCode> {
        let resp = self
            .client
            .get(&self.notify_url)
            .send()
            .await
            .map_err(|e| SchedulerError::Notification(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SchedulerError::Notification(format!(
                "{} responded with {status}",
                self.notify_url
            )));
        }
        Ok(status)
    }
}

#[async_trait]
impl Job for TaskJob {
    async fn run(&self) {
        info!(
            task_id = %self.id,
            url = %self.notify_url,
            param = %self.param,
            "task running"
        );

        match self.notify().await {
            Ok(status) => info!(task_id = %self.id, status = status.as_u16(), "task finished"),
            Err(e) => warn!(task_id = %self.id, error = %e, "task notification failed"),
        }

        // Always the last step, whatever the outcome above.
        if self.finished.send(self.id).is_err() {
            debug!(task_id = %self.id, "completion channel closed; nobody left to reap");
        }
    }
}

impl fmt::Display for TaskJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#Task {} -{}- -{}- @{}@ #",
            self.id, self.notify_url, self.param, self.time_str
        )
    }
}

impl fmt::Debug for TaskJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskJob")
            .field("id", &self.id)
            .field("notify_url", &self.notify_url)
            .field("param", &self.param)
            .field("time_str", &self.time_str)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn job(url: &str) -> (TaskJob, mpsc::UnboundedReceiver<EntryId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let job = TaskJob::new(EntryId::from(7), url, "abc", "20250601 09:00:00", client, tx);
        (job, rx)
    }

    #[test]
    fn display_summarises_fields() {
        let (job, _rx) = job("http://example.test/hook");
        assert_eq!(
            job.to_string(),
            "#Task 7 -http://example.test/hook- -abc- @20250601 09:00:00@ #"
        );
    }

    #[test]
    fn view_serializes_flat() {
        let (job, _rx) = job("http://example.test/hook");
        let json = serde_json::to_value(job.view(None)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["notify_url"], "http://example.test/hook");
        assert_eq!(json["param"], "abc");
        assert_eq!(json["time_str"], "20250601 09:00:00");
        assert!(json["next_run"].is_null());
    }

    #[tokio::test]
    async fn run_gets_url_and_signals_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (job, mut rx) = job(&format!("{}/hook", server.uri()));
        job.run().await;
        assert_eq!(rx.try_recv().ok(), Some(EntryId::from(7)));
    }

    #[tokio::test]
    async fn non_success_status_still_signals_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let (job, mut rx) = job(&format!("{}/hook", server.uri()));
        assert!(matches!(
            job.notify().await,
            Err(SchedulerError::Notification(_))
        ));
        job.run().await;
        assert_eq!(rx.try_recv().ok(), Some(EntryId::from(7)));
    }

    #[tokio::test]
    async fn transport_error_still_signals_completion() {
        // Nothing listens on port 1.
        let (job, mut rx) = job("http://127.0.0.1:1/hook");
        job.run().await;
        assert_eq!(rx.try_recv().ok(), Some(EntryId::from(7)));
    }

    #[tokio::test]
    async fn closed_channel_does_not_panic() {
        let (job, rx) = job("http://127.0.0.1:1/hook");
        drop(rx);
        job.run().await;
    }
}
