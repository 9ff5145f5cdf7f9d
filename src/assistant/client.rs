use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::retry::RetryPolicy;

use super::error::AssistantError;
use super::types::{
    CreateMessageRequest, CreateRunRequest, MessageListResponse, RunResponse, ThreadResponse,
};

const API_URL: &str = "https://api.openai.com/v1";

/// One text exchange with a generative service: send an input under a role
/// identifier, get one text reply back.
///
/// The orchestrator core sees only this contract; how the transport realises
/// it (polling, streaming, a single request) is the implementation's concern.
pub trait TextGenerator {
    fn call(
        &self,
        assistant_id: &str,
        input: &str,
    ) -> impl Future<Output = Result<String, AssistantError>> + Send;
}

/// Parameters for [`AssistantsClient`].
#[derive(Debug, Clone)]
pub struct AssistantsConfig {
    pub api_key: String,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    /// Pause between run-status polls.
    pub poll_interval: Duration,
    /// Overall budget for one run; `None` polls until the run is terminal.
    pub run_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

/// Client for the assistants thread/run protocol.
///
/// One `call` is the full exchange: create a thread, post the user message,
/// start a run, poll it to a terminal state, then fetch the newest assistant
/// reply. The whole exchange is retried as a unit on failure.
#[derive(Clone)]
pub struct AssistantsClient {
    http: Client,
    base_url: String,
    config: AssistantsConfig,
}

impl AssistantsClient {
    pub fn new(config: AssistantsConfig) -> Self {
        Self::with_base_url(config, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(config: AssistantsConfig, base_url: String) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url,
            config,
        }
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2");
        if let Some(org) = &self.config.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.config.project_id {
            builder = builder.header("OpenAI-Project", project);
        }
        builder
    }

    async fn check(response: Response) -> Result<Response, AssistantError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(AssistantError::RateLimited {
                retry_after_ms: retry_after,
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AssistantError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn run_once(&self, assistant_id: &str, input: &str) -> Result<String, AssistantError> {
        let thread = Self::check(
            self.decorate(self.http.post(format!("{}/threads", self.base_url)))
                .json(&serde_json::json!({}))
                .send()
                .await?,
        )
        .await?
        .json::<ThreadResponse>()
        .await?;

        Self::check(
            self.decorate(
                self.http
                    .post(format!("{}/threads/{}/messages", self.base_url, thread.id)),
            )
            .json(&CreateMessageRequest {
                role: "user".into(),
                content: input.into(),
            })
            .send()
            .await?,
        )
        .await?;

        let run = Self::check(
            self.decorate(
                self.http
                    .post(format!("{}/threads/{}/runs", self.base_url, thread.id)),
            )
            .json(&CreateRunRequest {
                assistant_id: assistant_id.into(),
            })
            .send()
            .await?,
        )
        .await?
        .json::<RunResponse>()
        .await?;

        let status = self.wait_for_completion(&thread.id, &run.id).await?;
        if status != "completed" {
            return Err(AssistantError::RunFailed(status));
        }

        self.newest_reply(&thread.id).await
    }

    async fn wait_for_completion(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<String, AssistantError> {
        let started = Instant::now();
        loop {
            let run = Self::check(
                self.decorate(self.http.get(format!(
                    "{}/threads/{thread_id}/runs/{run_id}",
                    self.base_url
                )))
                .send()
                .await?,
            )
            .await?
            .json::<RunResponse>()
            .await?;

            if run.is_terminal() {
                return Ok(run.status);
            }
            if let Some(timeout) = self.config.run_timeout
                && started.elapsed() > timeout
            {
                return Err(AssistantError::Timeout);
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn newest_reply(&self, thread_id: &str) -> Result<String, AssistantError> {
        let page = Self::check(
            self.decorate(
                self.http
                    .get(format!("{}/threads/{thread_id}/messages", self.base_url))
                    .query(&[("order", "desc"), ("limit", "5")]),
            )
            .send()
            .await?,
        )
        .await?
        .json::<MessageListResponse>()
        .await?;

        page.data
            .iter()
            .filter(|message| message.role == "assistant")
            .find_map(|message| message.joined_text())
            .ok_or(AssistantError::EmptyReply)
    }
}

impl TextGenerator for AssistantsClient {
    async fn call(&self, assistant_id: &str, input: &str) -> Result<String, AssistantError> {
        debug!(assistant_id, "starting assistant exchange");
        let this = self.clone();
        let assistant_id = assistant_id.to_string();
        let input = input.to_string();
        self.config
            .retry
            .run("assistants", async move || {
                this.run_once(&assistant_id, &input).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, attempts: u32) -> AssistantsClient {
        AssistantsClient::with_base_url(
            AssistantsConfig {
                api_key: "key".into(),
                org_id: None,
                project_id: None,
                poll_interval: Duration::from_millis(1),
                run_timeout: Some(Duration::from_secs(5)),
                retry: RetryPolicy {
                    attempts,
                    base_delay_ms: 1,
                    max_delay_ms: 1,
                },
            },
            server.uri(),
        )
    }

    async fn mount_happy_protocol(server: &MockServer, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "thread_1"})),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})),
            )
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "queued"}),
            ))
            .mount(server)
            .await;
        // First poll still running, second poll terminal.
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "in_progress"}),
            ))
            .up_to_n_times(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "completed"}),
            ))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "role": "assistant",
                    "content": [{"type": "text", "text": {"value": reply}}]
                }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn call_polls_run_and_returns_reply() {
        let server = MockServer::start().await;
        mount_happy_protocol(&server, " Черновик статьи ").await;

        let reply = client(&server, 1).call("asst_writer", "Заголовок").await.unwrap();
        assert_eq!(reply, "Черновик статьи");
    }

    #[tokio::test]
    async fn call_sends_user_message_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "thread_1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .and(body_json_string(
                r#"{"role":"user","content":"Текст:\nD\n\nКомментарий:\nF"}"#,
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "completed"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "completed"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "role": "assistant",
                    "content": [{"type": "text", "text": {"value": "ok"}}]
                }]
            })))
            .mount(&server)
            .await;

        client(&server, 1)
            .call("asst_writer", "Текст:\nD\n\nКомментарий:\nF")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_run_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "thread_1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "msg_1"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/threads/thread_1/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "queued"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"id": "run_1", "status": "expired"}),
            ))
            .mount(&server)
            .await;

        let err = client(&server, 1).call("asst_writer", "hi").await.unwrap_err();
        assert!(matches!(err, AssistantError::RunFailed(status) if status == "expired"));
    }

    #[tokio::test]
    async fn transient_api_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_happy_protocol(&server, "готово").await;

        let reply = client(&server, 2).call("asst_writer", "hi").await.unwrap();
        assert_eq!(reply, "готово");
    }

    #[tokio::test]
    async fn api_error_after_exhausted_retries_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server, 2).call("asst_writer", "hi").await.unwrap_err();
        assert!(matches!(err, AssistantError::ApiError { status: 500, .. }));
    }
}
