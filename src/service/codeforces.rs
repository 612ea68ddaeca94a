//! Client for the public Codeforces API.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// One entry of a contest's problem roster.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProblemDescriptor {
    pub index: String,
    pub name: String,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Source of problem metadata for a contest.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn contest_problems(&self, contest_id: &str) -> Result<Vec<ProblemDescriptor>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    result: Option<StandingsResult>,
}

#[derive(Debug, Deserialize)]
struct StandingsResult {
    #[serde(default)]
    problems: Vec<ProblemDescriptor>,
}

pub struct CodeforcesClient {
    client: reqwest::Client,
    api_base: String,
}

impl CodeforcesClient {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cfnotes/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(CodeforcesClient {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for CodeforcesClient {
    async fn contest_problems(&self, contest_id: &str) -> Result<Vec<ProblemDescriptor>, ProviderError> {
        // contest.standings with count=1 is the cheapest call that lists every
        // problem of a contest.
        let url = format!("{}/contest.standings", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[("contestId", contest_id), ("from", "1"), ("count", "1")])
            .send()
            .await?;

        // The API answers 400 with a JSON body for unknown contests, so read
        // the envelope before judging the HTTP status.
        let status = response.status();
        let envelope: ApiEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            Err(e) => return Err(e.into()),
        };

        if envelope.status != "OK" {
            return Err(ProviderError::Api {
                status: envelope.status,
                comment: envelope.comment.unwrap_or_default(),
            });
        }
        Ok(envelope.result.map(|r| r.problems).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::resolver::{Resolution, Resolver};
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CodeforcesClient {
        CodeforcesClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_problem_roster() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contest.standings"))
            .and(query_param("contestId", "1"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": {
                    "contest": {"id": 1},
                    "problems": [
                        {"contestId": 1, "index": "A", "name": "Theatre Square", "rating": 1000, "tags": ["math"]},
                        {"contestId": 1, "index": "B", "name": "Spreadsheets"}
                    ],
                    "rows": []
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let problems = client_for(&server).contest_problems("1").await.unwrap();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].name, "Theatre Square");
        assert_eq!(problems[0].rating, Some(1000));
        assert_eq!(problems[1].rating, None);
        assert_eq!(problems[1].tags, None);
    }

    #[tokio::test]
    async fn test_failed_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contest.standings"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": "FAILED",
                "comment": "contestId: Contest with id 99999 not found"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).contest_problems("99999").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[tokio::test]
    async fn test_non_json_error_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("<html>busy</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).contest_problems("1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status(503)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out_to_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contest.standings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({"status": "OK", "result": {"problems": []}})),
            )
            .mount(&server)
            .await;

        let client = CodeforcesClient::new(server.uri(), Duration::from_millis(200)).unwrap();
        let err = client.contest_problems("1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(ref e) if e.is_timeout()));

        let resolver = Resolver::new(Arc::new(client));
        let started = std::time::Instant::now();
        let resolution = resolver.resolve("https://codeforces.com/contest/1/problem/A").await;
        assert_eq!(resolution, Resolution::Unresolved);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
