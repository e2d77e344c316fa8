//! HTTP store speaking JSON to the surrounding REST backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use examkit_core::error::StoreError;
use examkit_core::model::{Answer, Attempt, AttemptStatus, Exam, ExamSummary};
use examkit_core::traits::{
    ActivityKind, ActivitySink, AttemptStore, ExamRepository, Severity, SubmitReceipt,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// REST-backed implementation of the collaborator traits.
///
/// The bearer token is injected through the constructor (from config), not
/// read from ambient state.
pub struct HttpStore {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else {
                StoreError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unauthorized(error_message(&body)));
        }
        if status == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::NotFound(error_message(&body)));
        }
        if (400..500).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status,
                message: error_message(&body),
            });
        }
        if status >= 500 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status,
                message: error_message(&body),
            });
        }

        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, StoreError> {
        let response = self.send(builder).await?;
        response.json().await.map_err(|e| StoreError::ApiError {
            status: 0,
            message: format!("failed to parse response: {e}"),
        })
    }
}

#[derive(Deserialize)]
struct BackendError {
    error: String,
}

/// The backend reports failures as `{"error": "..."}`; fall back to the raw
/// body when it doesn't.
fn error_message(body: &str) -> String {
    serde_json::from_str::<BackendError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string())
}

#[derive(Serialize)]
struct StartRequest<'a> {
    student_id: &'a str,
    exam_id: &'a str,
}

#[derive(Serialize)]
struct SaveAnswerRequest<'a> {
    question_id: &'a str,
    answer: &'a Answer,
}

#[derive(Serialize)]
struct FinalizeRequest {
    score: f64,
    status: AttemptStatus,
}

#[derive(Serialize)]
struct RetakeRequest<'a> {
    student_id: &'a str,
    exam_id: &'a str,
}

#[derive(Serialize)]
struct ActivityRequest {
    attempt_id: Uuid,
    activity_type: ActivityKind,
    severity: Severity,
}

#[async_trait]
impl ExamRepository for HttpStore {
    #[instrument(skip(self))]
    async fn load_exam(&self, exam_id: &str) -> anyhow::Result<Exam> {
        let exam: Exam = self
            .json(self.request(reqwest::Method::GET, &format!("/api/exams/{exam_id}")))
            .await?;
        Ok(exam)
    }

    async fn list_exams(&self) -> anyhow::Result<Vec<ExamSummary>> {
        let exams: Vec<ExamSummary> = self
            .json(self.request(reqwest::Method::GET, "/api/exams"))
            .await?;
        Ok(exams)
    }
}

#[async_trait]
impl AttemptStore for HttpStore {
    #[instrument(skip(self))]
    async fn start_or_resume_attempt(
        &self,
        student_id: &str,
        exam_id: &str,
    ) -> anyhow::Result<Attempt> {
        let attempt: Attempt = self
            .json(
                self.request(reqwest::Method::POST, "/api/attempts/start")
                    .json(&StartRequest { student_id, exam_id }),
            )
            .await?;
        Ok(attempt)
    }

    async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: &str,
        answer: &Answer,
    ) -> anyhow::Result<()> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/api/attempts/{attempt_id}/answers"),
            )
            .json(&SaveAnswerRequest { question_id, answer }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn submit_attempt(&self, attempt_id: Uuid) -> anyhow::Result<SubmitReceipt> {
        let receipt: SubmitReceipt = self
            .json(self.request(
                reqwest::Method::POST,
                &format!("/api/attempts/{attempt_id}/submit"),
            ))
            .await?;
        Ok(receipt)
    }

    #[instrument(skip(self))]
    async fn finalize_grade(
        &self,
        attempt_id: Uuid,
        score: f64,
        status: AttemptStatus,
    ) -> anyhow::Result<()> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/api/attempts/{attempt_id}/grade"),
            )
            .json(&FinalizeRequest { score, status }),
        )
        .await?;
        Ok(())
    }

    async fn begin_retake(
        &self,
        student_id: &str,
        exam_id: &str,
        previous_attempt: Uuid,
    ) -> anyhow::Result<Attempt> {
        let attempt: Attempt = self
            .json(
                self.request(
                    reqwest::Method::POST,
                    &format!("/api/attempts/{previous_attempt}/retake"),
                )
                .json(&RetakeRequest { student_id, exam_id }),
            )
            .await?;
        Ok(attempt)
    }
}

#[async_trait]
impl ActivitySink for HttpStore {
    async fn report_suspicious_activity(
        &self,
        attempt_id: Uuid,
        kind: ActivityKind,
        severity: Severity,
    ) -> anyhow::Result<()> {
        self.send(
            self.request(reqwest::Method::POST, "/api/activity")
                .json(&ActivityRequest {
                    attempt_id,
                    activity_type: kind,
                    severity,
                }),
        )
        .await?;
        Ok(())
    }
}
