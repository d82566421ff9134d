//! Paged JSON API variant.
//!
//! A zero-offset request reads the participant total, which fixes the number
//! of windows. Each window is one GET; participants map to records through a
//! fixed key table. No interaction state and no retries beyond the HTTP
//! client's timeout.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::error::{DiscoveryError, PageError};
use super::http_client::HttpClient;
use super::ResultSource;
use crate::models::{Job, PageResult, PageTask, Record};

/// Participant JSON keys and the record columns they fill.
pub const PARTICIPANT_FIELDS: &[(&str, &str)] = &[
    ("athleteName", "Name"),
    ("designation", "Designation"),
    ("divRank", "Div Rank"),
    ("genderRank", "Gender Rank"),
    ("overallRank", "Overall Rank"),
    ("bib", "Bib"),
    ("division", "Division"),
    ("country", "Country"),
    ("points", "Points"),
    ("swimTime", "Swim Time"),
    ("swimDivRank", "Swim Div Rank"),
    ("swimGenderRank", "Swim Gender Rank"),
    ("swimOverallRank", "Swim Overall Rank"),
    ("bikeTime", "Bike Time"),
    ("bikeDivRank", "Bike Div Rank"),
    ("bikeGenderRank", "Bike Gender Rank"),
    ("bikeOverallRank", "Bike Overall Rank"),
    ("runTime", "Run Time"),
    ("runDivRank", "Run Div Rank"),
    ("runGenderRank", "Run Gender Rank"),
    ("runOverallRank", "Run Overall Rank"),
    ("transition1Time", "Transition 1"),
    ("transition2Time", "Transition 2"),
    ("finishTime", "Overall Time"),
];

/// Render a JSON scalar as a record field.
fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Map one participant object onto a record for `job_id`.
pub fn participant_record(job_id: &str, participant: &Value) -> Record {
    let mut record = Record::for_job(job_id);
    for (key, column) in PARTICIPANT_FIELDS {
        if let Some(value) = participant.get(*key) {
            record.set_column(column, field_text(value));
        }
    }
    record.suppress_dnf_ranks();
    record
}

/// Results source backed by the paged JSON API.
pub struct ApiSource {
    client: HttpClient,
}

impl ApiSource {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn window_url(&self, job_id: &str, offset: u64) -> Option<String> {
        let config = self.client.config();
        let base = config.participants_url(job_id)?;
        let params = [
            (config.offset_param.as_str(), offset.to_string()),
            (config.limit_param.as_str(), config.page_size.to_string()),
        ];
        match url::Url::parse_with_params(&base, &params) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Invalid participants URL {}: {}", base, e);
                None
            }
        }
    }

    /// GET `url` and decode its JSON body. Errors are rendered as messages.
    async fn fetch(&self, url: &str) -> Result<Value, String> {
        let response = self
            .client
            .get(url, &[])
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !response.is_success() {
            let note = if response.is_rate_limited() {
                " (rate limited)"
            } else {
                ""
            };
            return Err(format!(
                "HTTP {}{} from {}",
                response.status.as_u16(),
                note,
                url
            ));
        }
        let content_type = response.content_type().unwrap_or("unknown").to_string();
        response.json::<Value>().await.map_err(|e| {
            format!(
                "undecodable body ({}) from {}: {}",
                content_type, url, e
            )
        })
    }
}

#[async_trait]
impl ResultSource for ApiSource {
    async fn discover(&self, job_id: &str) -> Result<Job, DiscoveryError> {
        let api_error = |message: String| DiscoveryError::Api {
            job_id: job_id.to_string(),
            message,
        };
        let url = self
            .window_url(job_id, 0)
            .ok_or_else(|| api_error("no usable api.url_template configured".to_string()))?;

        let body = self.fetch(&url).await.map_err(api_error)?;
        let total_field = &self.client.config().total_field;
        let total = match body.get(total_field) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| api_error(format!("response has no numeric '{}'", total_field)))?;

        let config = self.client.config();
        let windows = config.window_count(total).ok_or_else(|| {
            api_error(format!(
                "total of {} participants exceeds {} windows of {}",
                total, config.max_windows, config.page_size
            ))
        })?;
        info!("{}: {} participants in {} window(s)", job_id, total, windows);
        Ok(Job::new(job_id, windows))
    }

    fn tasks(&self, job: &Job) -> Vec<PageTask> {
        let config = self.client.config();
        job.tasks(|job_id, page| {
            self.window_url(job_id, config.window_offset(page))
                .unwrap_or_default()
        })
    }

    async fn extract(&self, task: &PageTask) -> Result<PageResult, PageError> {
        let api_error = |message: String| PageError::Api {
            job_id: task.job_id.clone(),
            page: task.page_number,
            message,
        };

        let body = self.fetch(&task.url).await.map_err(api_error)?;
        let data_field = &self.client.config().data_field;
        let participants = body
            .get(data_field)
            .and_then(Value::as_array)
            .ok_or_else(|| api_error(format!("response has no '{}' array", data_field)))?;

        let records: Vec<Record> = participants
            .iter()
            .map(|p| participant_record(&task.job_id, p))
            .collect();
        debug!(
            "{} window {}: {} participants",
            task.job_id,
            task.page_number,
            records.len()
        );
        Ok(PageResult::new(task.page_number, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> ApiSource {
        let config = ApiConfig {
            url_template: Some(format!("{}/subevents/{{job_id}}/participants", server.uri())),
            page_size: 2,
            ..ApiConfig::default()
        };
        ApiSource::new(HttpClient::new(config).unwrap())
    }

    fn participant(name: &str, designation: &str, rank: u64) -> Value {
        json!({
            "athleteName": name,
            "designation": designation,
            "overallRank": rank,
            "swimTime": "00:55:01",
            "swimOverallRank": rank + 1,
            "country": null,
            "ignored": "x"
        })
    }

    #[test]
    fn maps_participant_fields() {
        let record = participant_record("abc123", &participant("Ann", "Finisher", 4));

        assert_eq!(record.data_source_id, "abc123");
        assert_eq!(record.name, "Ann");
        assert_eq!(record.overall_rank, "4");
        assert_eq!(record.swim_overall_rank, "5");
        assert_eq!(record.country, "");
        assert_eq!(record.bib, "");
    }

    #[test]
    fn dnf_participants_lose_ranks() {
        let record = participant_record("abc123", &participant("Bob", "DQ", 9));

        assert!(record.ranks_are_empty());
        assert_eq!(record.swim_time, "00:55:01");
    }

    #[tokio::test]
    async fn discovers_window_count_from_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subevents/abc123/participants"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 5, "data": []})))
            .mount(&server)
            .await;

        let job = source(&server).discover("abc123").await.unwrap();

        assert_eq!(job.page_count, 3);
    }

    #[tokio::test]
    async fn zero_total_is_one_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "data": []})))
            .mount(&server)
            .await;

        let job = source(&server).discover("empty").await.unwrap();

        assert_eq!(job.page_count, 1);
    }

    #[tokio::test]
    async fn implausible_total_is_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"total": 1_000_000_000_000u64, "data": []})),
            )
            .mount(&server)
            .await;

        let err = source(&server).discover("abc123").await.unwrap_err();

        assert!(matches!(err, DiscoveryError::Api { .. }));
        assert!(err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn missing_total_is_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = source(&server).discover("abc123").await.unwrap_err();

        assert!(matches!(err, DiscoveryError::Api { .. }));
        assert!(err.to_string().contains("total"));
    }

    #[tokio::test]
    async fn tasks_carry_window_offsets() {
        let server = MockServer::start().await;
        let source = source(&server);

        let tasks = source.tasks(&Job::new("abc123", 3));

        assert_eq!(tasks.len(), 3);
        assert!(tasks[0].url.contains("offset=0"));
        assert!(tasks[2].url.contains("offset=4"));
        assert!(tasks[2].url.contains("limit=2"));
    }

    #[tokio::test]
    async fn extracts_window_in_response_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 4,
                "data": [participant("Cy", "Finisher", 3), participant("Di", "DNS", 4)]
            })))
            .mount(&server)
            .await;

        let source = source(&server);
        let task = source.tasks(&Job::new("abc123", 2)).remove(1);
        let page = source.extract(&task).await.unwrap();

        assert_eq!(page.page_number, 2);
        let names: Vec<_> = page.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Di"]);
        assert!(page.records[1].ranks_are_empty());
    }

    #[tokio::test]
    async fn http_failure_is_page_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = source(&server);
        let task = source.tasks(&Job::new("abc123", 1)).remove(0);
        let err = source.extract(&task).await.unwrap_err();

        assert!(matches!(err, PageError::Api { page: 1, .. }));
        assert!(err.to_string().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn undecodable_body_is_page_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let source = source(&server);
        let task = source.tasks(&Job::new("abc123", 1)).remove(0);
        let err = source.extract(&task).await.unwrap_err();

        assert!(err.to_string().contains("undecodable"));
    }
}
