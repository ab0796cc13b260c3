//! Application state shared by every user-facing operation: the backend,
//! the cached location, the chat transcript and the latest detections.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::{
    Config,
    backend::AgriBackend,
    chat::{ChatReply, FALLBACK_REPLY, Transcript, solution_query},
    error::{ApiError, ApiResult},
    model::{DetectionKind, Diagnosis, WeatherReport},
    upload::ImageUpload,
};

/// Label shown in a result panel after a failed prediction.
pub const ERROR_LABEL: &str = "Error";
/// Confidence placeholder for panels without a score.
pub const NO_CONFIDENCE: &str = "--";
pub const WEATHER_UNAVAILABLE: &str = "Could not fetch weather data.";

/// What a prediction panel shows.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionView {
    Ready(Diagnosis),
    /// The backend answered with `success: false` or an `error` field.
    Rejected { message: String },
    /// The request failed or the response could not be parsed.
    Failed { message: String },
}

impl PredictionView {
    pub fn label(&self) -> &str {
        match self {
            PredictionView::Ready(d) => &d.name,
            _ => ERROR_LABEL,
        }
    }

    pub fn plant(&self) -> Option<&str> {
        match self {
            PredictionView::Ready(d) => d.plant.as_deref(),
            _ => None,
        }
    }

    pub fn confidence_text(&self) -> String {
        match self {
            PredictionView::Ready(Diagnosis { confidence: Some(c), .. }) => c.to_string(),
            _ => NO_CONFIDENCE.to_string(),
        }
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            PredictionView::Ready(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeatherView {
    Ready(Box<WeatherReport>),
    Unavailable,
}

#[derive(Debug)]
pub struct Session {
    backend: Box<dyn AgriBackend>,
    config: Config,
    config_path: Option<PathBuf>,
    transcript: Transcript,
    detections: HashMap<DetectionKind, Diagnosis>,
}

impl Session {
    /// A session whose location cache lives only in memory.
    pub fn new(backend: Box<dyn AgriBackend>, config: Config) -> Self {
        Self {
            backend,
            config,
            config_path: None,
            transcript: Transcript::new(),
            detections: HashMap::new(),
        }
    }

    /// Persist the config (and with it the cached location) to `path`.
    pub fn with_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn location(&self) -> Option<&str> {
        self.config.location()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn last_detection(&self, kind: DetectionKind) -> Option<&Diagnosis> {
        self.detections.get(&kind)
    }

    /// Stage the image at `path` and run the prediction.
    pub async fn predict_path(
        &mut self,
        kind: DetectionKind,
        path: Option<&Path>,
    ) -> ApiResult<PredictionView> {
        let path = path.ok_or(ApiError::MissingInput("Please upload an image!"))?;
        let image = ImageUpload::from_path(path, self.config.max_upload_bytes())?;
        Ok(self.predict(kind, &image).await)
    }

    /// Send a staged image. Failures are folded into the returned view.
    pub async fn predict(&mut self, kind: DetectionKind, image: &ImageUpload) -> PredictionView {
        match self.backend.predict(kind, image).await {
            Ok(diagnosis) => {
                self.detections.insert(kind, diagnosis.clone());
                PredictionView::Ready(diagnosis)
            }
            Err(err) => {
                self.detections.remove(&kind);
                match err {
                    ApiError::Backend(message) => {
                        warn!(%kind, %message, "backend rejected prediction");
                        PredictionView::Rejected { message }
                    }
                    other => {
                        error!(%kind, error = %other, "prediction failed");
                        PredictionView::Failed { message: other.to_string() }
                    }
                }
            }
        }
    }

    /// Ask the chatbot how to treat the last unhealthy detection of `kind`.
    pub async fn solution(&mut self, kind: DetectionKind) -> ApiResult<ChatReply> {
        let missing = match kind {
            DetectionKind::Disease => "Please predict a disease first!",
            DetectionKind::Pest => "Please predict a pest first!",
        };

        let query = {
            let detection = self.detections.get(&kind).ok_or(ApiError::MissingInput(missing))?;
            if !detection.needs_solution() {
                return Err(ApiError::MissingInput("No problem was detected, nothing to solve."));
            }
            solution_query(kind, &detection.name).ok_or(ApiError::MissingInput(missing))?
        };

        self.send_chat(&query).await.ok_or(ApiError::MissingInput(missing))
    }

    /// Send a chat message. Blank input is ignored; a failed request
    /// appends the fallback reply instead of an error.
    pub async fn send_chat(&mut self, text: &str) -> Option<ChatReply> {
        let message = text.trim();
        if message.is_empty() {
            return None;
        }

        self.transcript.push_user(message);

        let reply = match self.backend.chat(message).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(error = %err, "chat request failed");
                ChatReply::text(FALLBACK_REPLY)
            }
        };

        self.transcript.push_bot(reply.clone());
        Some(reply)
    }

    /// Clear backend memory and the local transcript. The transcript is
    /// reset even when the backend call fails.
    pub async fn clear_memory(&mut self) {
        if let Err(err) = self.backend.clear_memory().await {
            warn!(error = %err, "failed to clear chat memory");
        }
        self.transcript.reset();
    }

    /// Send the location to the backend and cache it on success.
    /// Returns the confirmation message.
    pub async fn set_location(&mut self, text: &str) -> ApiResult<String> {
        let location = text.trim();
        if location.is_empty() {
            return Err(ApiError::MissingInput("Please enter a location."));
        }

        let ack = self.backend.set_location(location).await?;

        if let Err(err) = self.config.set_location(location) {
            warn!(error = %err, "could not cache location");
        }
        self.persist();
        info!(%location, "location updated");

        Ok(ack.confirmation(location))
    }

    /// Weather for an explicit `location`. Without one the backend reports
    /// on the location last sent through [`Session::set_location`].
    pub async fn weather(&self, location: Option<&str>) -> WeatherView {
        let target = location.map(str::trim).filter(|l| !l.is_empty());

        match self.backend.weather(target).await {
            Ok(report) => WeatherView::Ready(Box::new(report)),
            Err(err) => {
                let location = target.or_else(|| self.config.location());
                error!(error = %err, ?location, "weather request failed");
                WeatherView::Unavailable
            }
        }
    }

    /// Weather for the cached location, if one was set previously.
    pub async fn startup_weather(&self) -> Option<WeatherView> {
        self.config.location()?;
        Some(self.weather(None).await)
    }

    /// Ask the backend for growing advice about `crop`.
    pub async fn advice(&self, crop: &str) -> ApiResult<ChatReply> {
        let crop = crop.trim();
        if crop.is_empty() {
            return Err(ApiError::MissingInput("Please enter a crop name."));
        }
        self.backend.advice(crop).await
    }

    fn persist(&self) {
        let Some(path) = &self.config_path else { return };
        if let Err(err) = self.config.save_to(path) {
            warn!(error = %err, path = %path.display(), "failed to persist configuration");
        }
    }
}
