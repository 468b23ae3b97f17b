use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use quiz_core::model::{
    LeaderboardEntry, Question, QuizId, QuizMetadata, SessionProfile, SessionRequest,
    clamp_leaderboard_limit,
};

use super::detail::flatten_detail;
use super::wire::{
    FinalFeedbackBody, FinalFeedbackDto, GradeBody, GradeDto, HealthDto, LeaderboardDto, MetaDto,
    QuestionsDto, SessionDto, StartSessionBody,
};
use super::{FinalFeedback, FinalFeedbackRequest, GradeRequest, GradeResponse, QuizService};
use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// `QuizService` over HTTP/JSON.
#[derive(Clone, Debug)]
pub struct HttpQuizService {
    client: Client,
    base_url: Url,
}

impl HttpQuizService {
    /// # Errors
    ///
    /// Returns `ServiceError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ServiceError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|err| ServiceError::Protocol(format!("bad endpoint {path}: {err}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        tracing::debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        decode(response).await
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(%url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ServiceError::Status {
            status,
            detail: flatten_detail(&body, status),
        });
    }
    serde_json::from_str(&body).map_err(|err| ServiceError::Protocol(err.to_string()))
}

#[async_trait]
impl QuizService for HttpQuizService {
    async fn health(&self) -> Result<(), ServiceError> {
        let health: HealthDto = self.get_json(self.endpoint("health", &[])?).await?;
        if health.status.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(ServiceError::Unavailable(format!(
                "health status is {:?}",
                health.status
            )))
        }
    }

    async fn fetch_metadata(&self, quiz_id: &QuizId) -> Result<QuizMetadata, ServiceError> {
        let url = self.endpoint("api/meta", &[("quiz_id", quiz_id.as_str())])?;
        let meta: MetaDto = self.get_json(url).await?;
        Ok(meta.into())
    }

    async fn fetch_questions(&self, quiz_id: &QuizId) -> Result<Vec<Question>, ServiceError> {
        let url = self.endpoint("api/questions", &[("quiz_id", quiz_id.as_str())])?;
        let questions: QuestionsDto = self.get_json(url).await?;
        Ok(questions.into_questions())
    }

    async fn start_session(
        &self,
        quiz_id: &QuizId,
        request: &SessionRequest,
    ) -> Result<SessionProfile, ServiceError> {
        let body = StartSessionBody {
            nickname: request.nickname.as_deref(),
            quiz_id: quiz_id.as_str(),
            show_in_leaderboard: request.show_in_leaderboard,
        };
        let session: SessionDto = self
            .post_json(self.endpoint("api/session/start", &[])?, &body)
            .await?;
        session.into_profile(request)
    }

    async fn grade(&self, request: &GradeRequest) -> Result<GradeResponse, ServiceError> {
        let body = GradeBody {
            session_id: request.session_id.as_str(),
            id: request.question_id.as_str(),
            answer: &request.answer,
        };
        let graded: GradeDto = self.post_json(self.endpoint("api/grade", &[])?, &body).await?;
        Ok(graded.into())
    }

    async fn final_feedback(
        &self,
        request: &FinalFeedbackRequest,
    ) -> Result<FinalFeedback, ServiceError> {
        let body = FinalFeedbackBody {
            session_id: request.session_id.as_str(),
            correct: request.progress.correct,
            answered: request.progress.answered,
            total: request.progress.total,
        };
        let feedback: FinalFeedbackDto = self
            .post_json(self.endpoint("api/final_feedback", &[])?, &body)
            .await?;
        Ok(feedback.into())
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let limit = clamp_leaderboard_limit(limit).to_string();
        let url = self.endpoint("api/leaderboard", &[("limit", limit.as_str())])?;
        let board: LeaderboardDto = self.get_json(url).await?;
        Ok(board.items.into_iter().map(Into::into).collect())
    }
}
