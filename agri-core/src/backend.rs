use async_trait::async_trait;
use reqwest::{Client, Response, multipart};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    Config,
    chat::ChatReply,
    error::{ApiError, ApiResult, truncate_body},
    inflight::InFlight,
    model::{
        AdviceResponse, ChatResponse, DetectionKind, Diagnosis, DiseasePrediction, LocationAck, PestPrediction,
        WeatherReport,
    },
    upload::ImageUpload,
};

/// The agricultural assistant backend as seen by the client.
#[async_trait]
pub trait AgriBackend: Send + Sync + Debug {
    async fn predict(&self, kind: DetectionKind, image: &ImageUpload) -> ApiResult<Diagnosis>;

    async fn chat(&self, query: &str) -> ApiResult<ChatReply>;

    async fn clear_memory(&self) -> ApiResult<()>;

    async fn set_location(&self, location: &str) -> ApiResult<LocationAck>;

    /// Weather for `location`, or for the backend's current location when `None`.
    async fn weather(&self, location: Option<&str>) -> ApiResult<WeatherReport>;

    /// Growing advice for a crop. The backend phrases it like a chat reply.
    async fn advice(&self, crop: &str) -> ApiResult<ChatReply>;

    async fn predict_disease(&self, image: &ImageUpload) -> ApiResult<Diagnosis> {
        self.predict(DetectionKind::Disease, image).await
    }

    async fn predict_pest(&self, image: &ImageUpload) -> ApiResult<Diagnosis> {
        self.predict(DetectionKind::Pest, image).await
    }
}

/// REST client for the backend. Each operation kind keeps at most one
/// request in flight; a newer call cancels the older one.
#[derive(Debug)]
pub struct HttpBackend {
    base: Url,
    http: Client,
    disease: InFlight,
    pest: InFlight,
    chat: InFlight,
    location: InFlight,
    weather: InFlight,
    advice: InFlight,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        Self::with_client(base_url, Client::new())
    }

    pub fn from_config(config: &Config) -> ApiResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Self::with_client(config.base_url(), builder.build()?)
    }

    pub fn with_client(base_url: &str, http: Client) -> ApiResult<Self> {
        Ok(Self {
            base: parse_base_url(base_url)?,
            http,
            disease: InFlight::new("disease-prediction"),
            pest: InFlight::new("pest-prediction"),
            chat: InFlight::new("chatbot"),
            location: InFlight::new("set-location"),
            weather: InFlight::new("weather"),
            advice: InFlight::new("crop-advice"),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.base.join(path).map_err(|e| ApiError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            reason: e.to_string(),
        })
    }

    fn weather_url(&self, location: Option<&str>) -> ApiResult<Url> {
        let mut url = self.endpoint("weather/")?;
        if let Some(location) = location {
            url.path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl {
                    url: self.base.to_string(),
                    reason: "URL cannot carry a path".to_string(),
                })?
                .pop_if_empty()
                .push(location);
        }
        Ok(url)
    }

    async fn send_prediction(
        &self,
        kind: DetectionKind,
        image: &ImageUpload,
    ) -> ApiResult<Diagnosis> {
        let url = self.endpoint(kind.endpoint())?;
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime)?;
        let form = multipart::Form::new().part("file", part);

        info!(%kind, file = %image.file_name, size = image.len(), "requesting prediction");
        let res = self.http.post(url).multipart(form).send().await?;

        let diagnosis = match kind {
            DetectionKind::Disease => {
                read_json::<DiseasePrediction>(res, "disease prediction").await?.into_diagnosis()
            }
            DetectionKind::Pest => {
                read_json::<PestPrediction>(res, "pest prediction").await?.into_diagnosis()
            }
        }?;

        debug!(%kind, name = %diagnosis.name, healthy = diagnosis.healthy, "prediction received");
        Ok(diagnosis)
    }

    async fn send_chat(&self, query: &str) -> ApiResult<ChatReply> {
        let url = self.endpoint("chatbot/")?;
        debug!(chars = query.len(), "sending chat query");

        let res = self.http.get(url).query(&[("query", query)]).send().await?;
        let parsed: ChatResponse = read_json(res, "chatbot").await?;

        Ok(ChatReply::parse(&parsed.response))
    }

    async fn send_location(&self, location: &str) -> ApiResult<LocationAck> {
        let url = self.endpoint("set-location/")?;
        info!(%location, "setting location");

        let res = self.http.put(url).query(&[("location", location)]).send().await?;
        read_json(res, "set-location").await
    }

    async fn send_weather(&self, location: Option<&str>) -> ApiResult<WeatherReport> {
        let url = self.weather_url(location)?;
        debug!(%url, "fetching weather");

        let res = self.http.get(url).send().await?;
        read_json(res, "weather").await
    }

    async fn send_advice(&self, crop: &str) -> ApiResult<ChatReply> {
        let url = self.endpoint("crop-advice/")?;
        info!(%crop, "requesting crop advice");

        let res = self.http.get(url).query(&[("crop_name", crop)]).send().await?;
        let parsed: AdviceResponse = read_json(res, "crop advice").await?;

        Ok(ChatReply::parse(&parsed.advice))
    }
}

#[async_trait]
impl AgriBackend for HttpBackend {
    async fn predict(&self, kind: DetectionKind, image: &ImageUpload) -> ApiResult<Diagnosis> {
        let slot = match kind {
            DetectionKind::Disease => &self.disease,
            DetectionKind::Pest => &self.pest,
        };
        slot.run(self.send_prediction(kind, image)).await
    }

    async fn chat(&self, query: &str) -> ApiResult<ChatReply> {
        self.chat.run(self.send_chat(query)).await
    }

    async fn clear_memory(&self) -> ApiResult<()> {
        let url = self.endpoint("clear-memory/")?;
        self.chat.cancel();

        let res = self.http.post(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body: truncate_body(&body) });
        }

        info!("backend conversation memory cleared");
        Ok(())
    }

    async fn set_location(&self, location: &str) -> ApiResult<LocationAck> {
        self.location.run(self.send_location(location)).await
    }

    async fn weather(&self, location: Option<&str>) -> ApiResult<WeatherReport> {
        self.weather.run(self.send_weather(location)).await
    }

    async fn advice(&self, crop: &str) -> ApiResult<ChatReply> {
        self.advice.run(self.send_advice(crop)).await
    }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
    let trimmed = raw.trim();
    let with_slash =
        if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };

    let url = Url::parse(&with_slash).map_err(|e| ApiError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

async fn read_json<T: DeserializeOwned>(res: Response, context: &'static str) -> ApiResult<T> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        warn!(%status, context, "backend returned an error status");
        return Err(ApiError::Status { status, body: truncate_body(&body) });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode { context, source })
}
