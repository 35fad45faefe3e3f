//! Scripted model for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::client::{
    AiError, Candidate, Content, GenerateRequest, GenerateResponse, GenerativeModel, InlineData,
    Part,
};

/// Replays canned answers in order and records every request.
///
/// Requests for an image model are answered with the configured image
/// without consuming a scripted answer.
pub struct ScriptedModel {
    answers: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    image: Option<InlineData>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(answers: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            requests: Mutex::new(Vec::new()),
            image: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Builder used on a freshly created model
    pub fn with_image(self: Arc<Self>, mime_type: &str, data: &str) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("model already shared"));
        inner.image = Some(InlineData {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        });
        Arc::new(inner)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of concurrently outstanding calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, AiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let is_image = request.model.contains("image");
        self.requests.lock().unwrap().push(request);

        let result = match (&self.image, is_image) {
            (Some(image), true) => Ok(GenerateResponse {
                candidates: vec![Candidate {
                    content: Some(Content {
                        role: Some("model".to_string()),
                        parts: vec![Part {
                            text: None,
                            inline_data: Some(image.clone()),
                        }],
                    }),
                    finish_reason: None,
                }],
            }),
            _ => match self.answers.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(GenerateResponse::from_text(text)),
                Some(Err(message)) => Err(AiError::Http(message)),
                None => Err(AiError::Http("script exhausted".to_string())),
            },
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
