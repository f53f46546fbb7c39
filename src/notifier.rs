use futures::future::join_all;
use tracing::debug;

use crate::config::NOTIFY_TIMEOUT;
use crate::models::Report;

/// Posts the report to every sink at once. A failing sink is only traced;
/// it never holds back the others.
pub async fn deliver(http_client: &reqwest::Client, sinks: &[String], report: &Report) {
    if sinks.is_empty() {
        return;
    }

    let deliveries = sinks.iter().map(|url| async move {
        match http_client.post(url).json(report).timeout(NOTIFY_TIMEOUT).send().await {
            Ok(resp) => debug!(%url, status = resp.status().as_u16(), "Report delivered"),
            Err(e) => debug!(%url, error = %e, "Report delivery failed"),
        }
    });
    join_all(deliveries).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckResult, SectionResults};
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn sample_report() -> Report {
        Report {
            timestamp: Utc::now(),
            internos: std::iter::once(("svcA".to_string(), CheckResult::from_code("https://example.com", 200)))
                .collect(),
            empresa: SectionResults::default(),
            externos: SectionResults::default(),
            execution_time_seconds: 0.42,
        }
    }

    #[tokio::test]
    async fn unreachable_sink_does_not_block_the_next() {
        let mut server = Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "internos": {"svcA_status": 200},
                "execution_time_seconds": 0.42
            })))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let sinks = vec!["http://127.0.0.1:1/hook".to_string(), format!("{}/hook", server.url())];
        deliver(&reqwest::Client::new(), &sinks, &sample_report()).await;

        hook.assert_async().await;
    }

    #[tokio::test]
    async fn sink_errors_are_swallowed() {
        let mut server = Server::new_async().await;
        let broken = server.mock("POST", "/broken").with_status(500).expect(1).create_async().await;

        let sinks = vec![format!("{}/broken", server.url()), "not a url".to_string()];
        deliver(&reqwest::Client::new(), &sinks, &sample_report()).await;

        broken.assert_async().await;
    }
}
