use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{ReviewSource, UpstreamError};
use crate::models::{ProfessorSummary, Review};

const GRAPHQL_URL: &str = "https://www.ratemyprofessors.com/graphql";

// The public site accepts a fixed basic-auth header on its GraphQL endpoint.
const AUTH_HEADER: &str = "Basic dGVzdDp0ZXN0";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const PROFESSOR_QUERY: &str = r#"
query RatingsListQuery($id: ID!) {
  node(id: $id) {
    ... on Teacher {
      firstName
      lastName
      department
      avgRating
      avgDifficulty
      numRatings
      wouldTakeAgainPercent
      school {
        name
        id
      }
    }
  }
}
"#;

// textbookUse is not guaranteed to exist in the upstream schema; see
// fetch_reviews for the strip-and-retry fallback.
const RATINGS_QUERY: &str = r#"
query RatingsListQuery($count: Int!, $id: ID!, $courseFilter: String) {
  node(id: $id) {
    ... on Teacher {
      ratings(first: $count, courseFilter: $courseFilter) {
        edges {
          node {
            id
            comment
            date
            class
            helpfulRating
            difficultyRating
            attendanceMandatory
            wouldTakeAgain
            grade
            isForOnlineClass
            isForCredit
            ratingTags
            thumbsUpTotal
            thumbsDownTotal
            textbookUse
          }
        }
      }
    }
  }
}
"#;

/// Client for the RateMyProfessors GraphQL API, pinned to one professor.
pub struct RmpClient {
    http: reqwest::Client,
    endpoint: String,
    node_id: String,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProfessorData {
    node: Option<ProfessorSummary>,
}

#[derive(Debug, Deserialize)]
struct RatingsData {
    node: Option<RatingsNode>,
}

#[derive(Debug, Deserialize)]
struct RatingsNode {
    ratings: RatingsConnection,
}

#[derive(Debug, Deserialize)]
struct RatingsConnection {
    #[serde(default)]
    edges: Vec<RatingEdge>,
}

#[derive(Debug, Deserialize)]
struct RatingEdge {
    node: Review,
}

impl RmpClient {
    pub fn new(professor_id: u64) -> Result<Self, UpstreamError> {
        Self::with_endpoint(GRAPHQL_URL, professor_id)
    }

    /// Point the client at a different endpoint; used by tests.
    pub fn with_endpoint(endpoint: &str, professor_id: u64) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        // The GraphQL node id is base64("Teacher-<numeric id>").
        let node_id = STANDARD.encode(format!("Teacher-{professor_id}"));

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            node_id,
        })
    }

    async fn post_graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphQlResponse<T>, UpstreamError> {
        let request = GraphQlRequest { query, variables };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", AUTH_HEADER)
            .header("User-Agent", USER_AGENT)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        Ok(response.json().await?)
    }

    fn join_errors(errors: &[GraphQlError]) -> String {
        errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait::async_trait]
impl ReviewSource for RmpClient {
    async fn fetch_professor_summary(&self) -> Result<ProfessorSummary, UpstreamError> {
        debug!("Fetching professor summary");

        let variables = json!({ "id": self.node_id });
        let response: GraphQlResponse<ProfessorData> =
            self.post_graphql(PROFESSOR_QUERY, variables).await?;

        if !response.errors.is_empty() {
            return Err(UpstreamError::GraphQl(Self::join_errors(&response.errors)));
        }

        let summary = response
            .data
            .and_then(|d| d.node)
            .ok_or(UpstreamError::MissingData)?;

        info!(professor = %summary.full_name(), ratings = summary.num_ratings, "Fetched professor summary");

        Ok(summary)
    }

    async fn fetch_reviews(&self, count: usize) -> Result<Vec<Review>, UpstreamError> {
        debug!(count, "Fetching review window");

        let variables = json!({
            "id": self.node_id,
            "count": count,
            "courseFilter": null,
        });

        let mut response: GraphQlResponse<RatingsData> = self
            .post_graphql(RATINGS_QUERY, variables.clone())
            .await?;

        if !response.errors.is_empty() {
            let joined = Self::join_errors(&response.errors);
            if joined.contains("textbookUse") {
                // Upstream dropped the optional field; retry once without it.
                warn!("textbookUse rejected by review source, retrying without it");
                let stripped = RATINGS_QUERY.replace("textbookUse", "");
                response = self.post_graphql(&stripped, variables).await?;
                if !response.errors.is_empty() {
                    return Err(UpstreamError::GraphQl(Self::join_errors(&response.errors)));
                }
            } else {
                return Err(UpstreamError::GraphQl(joined));
            }
        }

        let reviews: Vec<Review> = match response.data.and_then(|d| d.node) {
            Some(node) => node.ratings.edges.into_iter().map(|e| e.node).collect(),
            None => Vec::new(),
        };

        debug!(fetched = reviews.len(), "Fetched review window");

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rating_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "comment": "Clear lectures",
            "date": "2024-03-15 20:21:33 +0000 UTC",
            "class": "LING301",
            "helpfulRating": 4.5,
            "difficultyRating": 2.0,
            "attendanceMandatory": "mandatory",
            "wouldTakeAgain": 1,
            "grade": "A",
            "isForOnlineClass": false,
            "isForCredit": true,
            "ratingTags": "Caring--Clear grading criteria",
            "thumbsUpTotal": 2,
            "thumbsDownTotal": 0,
            "textbookUse": 3
        })
    }

    fn ratings_body(ids: &[&str]) -> serde_json::Value {
        let edges: Vec<_> = ids.iter().map(|id| json!({ "node": rating_json(id) })).collect();
        json!({ "data": { "node": { "ratings": { "edges": edges } } } })
    }

    async fn client_for(server: &MockServer) -> RmpClient {
        RmpClient::with_endpoint(&server.uri(), 2635703).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_reviews_parses_window() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ratings_body(&["r2", "r1"])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let reviews = client.fetch_reviews(10).await.unwrap();

        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].id, "r2");
        assert_eq!(reviews[0].class_name, "LING301");
        assert_eq!(reviews[0].textbook_use, Some(3));
    }

    #[tokio::test]
    async fn test_fetch_reviews_retries_without_textbook_use() {
        let server = MockServer::start().await;

        // The first request still carries textbookUse and gets rejected.
        Mock::given(method("POST"))
            .and(body_string_contains("textbookUse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Cannot query field \"textbookUse\" on type \"Rating\"." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // The stripped retry succeeds.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ratings_body(&["r1"])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let reviews = client.fetch_reviews(10).await.unwrap();

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, "r1");
    }

    #[tokio::test]
    async fn test_fetch_reviews_other_graphql_error_fails() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Something unrelated broke" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_reviews(10).await.unwrap_err();

        assert!(matches!(err, UpstreamError::GraphQl(_)));
    }

    #[tokio::test]
    async fn test_fetch_reviews_null_node_is_empty_window() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "node": null } })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let reviews = client.fetch_reviews(10).await.unwrap();

        assert!(reviews.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_surfaces_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_reviews(10).await.unwrap_err();

        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert!(body.contains("upstream down"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_professor_summary() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "node": {
                    "firstName": "Pengyuan",
                    "lastName": "Liu",
                    "department": "Linguistics",
                    "avgRating": 4.2,
                    "avgDifficulty": 2.8,
                    "numRatings": 37,
                    "wouldTakeAgainPercent": 91.0,
                    "school": { "id": "U2Nob29sLTE=", "name": "Example University" }
                }}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let summary = client.fetch_professor_summary().await.unwrap();

        assert_eq!(summary.full_name(), "Pengyuan Liu");
        assert_eq!(summary.num_ratings, 37);
        assert_eq!(summary.school.name, "Example University");
    }

    #[tokio::test]
    async fn test_fetch_professor_summary_null_node_is_missing_data() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "node": null } })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_professor_summary().await.unwrap_err();

        assert!(matches!(err, UpstreamError::MissingData));
    }
}
