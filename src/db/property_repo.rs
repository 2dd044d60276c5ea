// src/db/property_repo.rs

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    common::error::AppError,
    models::property::{NewProperty, Property, PropertyChanges},
};

/// Acesso ao backend de propriedades. Toda chamada exige os headers de
/// autenticação montados pelo `SessionManager`.
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn list(&self, auth: &HeaderMap) -> Result<Vec<Property>, AppError>;
    async fn create(&self, auth: &HeaderMap, property: &NewProperty) -> Result<Property, AppError>;
    async fn update(
        &self,
        auth: &HeaderMap,
        id: &str,
        changes: &PropertyChanges,
    ) -> Result<Property, AppError>;
    async fn delete(&self, auth: &HeaderMap, id: &str) -> Result<(), AppError>;
}

// O backend já respondeu tanto com o registro puro quanto embrulhado
#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyEnvelope {
    Wrapped { property: Property },
    Bare(Property),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Bare(Vec<Property>),
    Wrapped { properties: Vec<Property> },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

// Extrai a mensagem de erro do corpo: campo `error`, depois `message`, depois o texto cru
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[derive(Clone)]
pub struct HttpPropertyRepository {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPropertyRepository {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    // Converte respostas não-2xx em AppError (401 = sessão expirada)
    async fn check(resp: Response) -> Result<Response, AppError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::SessionExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Backend {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok(resp)
    }

    async fn parse<R: DeserializeOwned>(resp: Response) -> Result<R, AppError> {
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PropertyRepository for HttpPropertyRepository {
    async fn list(&self, auth: &HeaderMap) -> Result<Vec<Property>, AppError> {
        let resp = self
            .http
            .get(&self.base_url)
            .headers(auth.clone())
            .send()
            .await?;

        let properties = match Self::parse::<ListEnvelope>(resp).await? {
            ListEnvelope::Wrapped { properties } => properties,
            ListEnvelope::Bare(properties) => properties,
        };
        tracing::debug!("📦 {} propriedades recebidas do backend", properties.len());
        Ok(properties)
    }

    async fn create(&self, auth: &HeaderMap, property: &NewProperty) -> Result<Property, AppError> {
        let resp = self
            .http
            .post(&self.base_url)
            .headers(auth.clone())
            .json(property)
            .send()
            .await?;

        match Self::parse::<PropertyEnvelope>(resp).await? {
            PropertyEnvelope::Wrapped { property } | PropertyEnvelope::Bare(property) => {
                Ok(property)
            }
        }
    }

    async fn update(
        &self,
        auth: &HeaderMap,
        id: &str,
        changes: &PropertyChanges,
    ) -> Result<Property, AppError> {
        let resp = self
            .http
            .put(self.item_url(id))
            .headers(auth.clone())
            .json(changes)
            .send()
            .await?;

        match Self::parse::<PropertyEnvelope>(resp).await? {
            PropertyEnvelope::Wrapped { property } | PropertyEnvelope::Bare(property) => {
                Ok(property)
            }
        }
    }

    async fn delete(&self, auth: &HeaderMap, id: &str) -> Result<(), AppError> {
        let resp = self
            .http
            .delete(self.item_url(id))
            .headers(auth.clone())
            .send()
            .await?;

        Self::check(resp).await?;
        Ok(())
    }
}
