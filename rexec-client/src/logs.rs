//! Log streaming endpoint
//!
//! The server sends captured lines as Server-Sent Events. This module turns
//! that event stream back into [`LogEntry`] values.

use crate::RexecClient;
use crate::error::{ClientError, Result};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Method;
use reqwest::header::ACCEPT;
use rexec_core::domain::job::JobId;
use rexec_core::domain::log::LogEntry;
use rexec_core::dto::log::{END_EVENT, LOG_EVENT};
use sse_stream::SseStream;

/// Lines of a job's output, in capture order
pub type LogStream = BoxStream<'static, Result<LogEntry>>;

impl RexecClient {
    /// Stream the output of a job
    ///
    /// Replays every line from `offset`, then follows the job until its
    /// output is exhausted. The stream ends cleanly when the server signals
    /// the end; if the connection breaks before that, the last item is a
    /// [`ClientError::StreamError`] and the stream can be resumed with the
    /// offset of the next unseen line.
    ///
    /// # Arguments
    /// * `job_id` - The job whose output to read
    /// * `offset` - Index of the first line to receive
    pub async fn stream_logs(&self, job_id: JobId, offset: usize) -> Result<LogStream> {
        let path = format!("/api/jobs/{}/logs?offset={}", job_id, offset);
        let response = self
            .request(Method::GET, &path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = self.check_status(response).await?;

        let mut events = SseStream::from_byte_stream(response.bytes_stream()).boxed();

        let stream = async_stream::try_stream! {
            let mut ended = false;

            while let Some(event) = events.next().await {
                let event = event.map_err(|e| ClientError::StreamError(e.to_string()))?;

                match event.event.as_deref() {
                    Some(LOG_EVENT) => {
                        let data = event.data.unwrap_or_default();
                        let entry: LogEntry = serde_json::from_str(&data).map_err(|e| {
                            ClientError::ParseError(format!("Invalid log entry: {}", e))
                        })?;
                        yield entry;
                    }
                    Some(END_EVENT) => {
                        ended = true;
                        break;
                    }
                    other => {
                        tracing::debug!("Ignoring SSE event {:?}", other);
                    }
                }
            }

            if !ended {
                Err::<(), _>(ClientError::StreamError(
                    "connection closed before the end of the logs".to_string(),
                ))?;
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use crate::RexecClient;
    use crate::test_support::serve;
    use axum::{
        Router,
        extract::Query,
        response::sse::{Event, Sse},
        routing::get,
    };
    use futures::{StreamExt, TryStreamExt};
    use rexec_core::domain::job::JobId;
    use rexec_core::domain::log::{LogEntry, LogSource};
    use rexec_core::dto::log::LogQuery;
    use std::convert::Infallible;

    fn lines() -> Vec<LogEntry> {
        vec![
            LogEntry::new("first", LogSource::Stdout),
            LogEntry::new("second", LogSource::Stderr),
            LogEntry::new("third", LogSource::Stdout),
        ]
    }

    /// Serves the fixed lines from the requested offset, optionally without the end event
    fn log_server(send_end: bool) -> Router {
        Router::new().route(
            "/api/jobs/{id}/logs",
            get(move |Query(query): Query<LogQuery>| async move {
                let offset = query.offset.unwrap_or(0);
                let mut events: Vec<Result<Event, Infallible>> = lines()
                    .iter()
                    .enumerate()
                    .skip(offset)
                    .map(|(i, entry)| {
                        Ok(Event::default()
                            .event("log")
                            .id(i.to_string())
                            .data(serde_json::to_string(entry).unwrap()))
                    })
                    .collect();
                events.insert(0, Ok(Event::default().comment("keep-alive")));
                if send_end {
                    events.push(Ok(Event::default().event("end").data("{}")));
                }
                Sse::new(futures::stream::iter(events))
            }),
        )
    }

    #[tokio::test]
    async fn test_stream_logs_until_end() {
        let url = serve(log_server(true)).await;
        let client = RexecClient::new(&url);

        let entries: Vec<LogEntry> = client
            .stream_logs(JobId::new(), 0)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(entries[1].source, LogSource::Stderr);
    }

    #[tokio::test]
    async fn test_stream_logs_from_offset() {
        let url = serve(log_server(true)).await;
        let client = RexecClient::new(&url);

        let entries: Vec<LogEntry> = client
            .stream_logs(JobId::new(), 2)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "third");
    }

    #[tokio::test]
    async fn test_stream_without_end_reports_error() {
        let url = serve(log_server(false)).await;
        let client = RexecClient::new(&url);

        let items: Vec<_> = client
            .stream_logs(JobId::new(), 0)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(|item| item.is_ok()));
        assert!(matches!(
            items[3],
            Err(crate::ClientError::StreamError(_))
        ));
    }

    #[tokio::test]
    async fn test_stream_of_unknown_job_fails_upfront() {
        let url = serve(Router::new()).await;
        let client = RexecClient::new(&url);

        let err = client.stream_logs(JobId::new(), 0).await.err().unwrap();
        assert!(err.is_not_found());
    }
}
