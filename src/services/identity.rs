// src/services/identity.rs

use std::collections::HashMap;

use reqwest::Url;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    common::error::AppError,
    config::CognitoConfig,
    models::auth::{
        ConfirmSignUpRequest, EmptyResponse, InitiateAuthRequest, InitiateAuthResponse,
        NEW_PASSWORD_REQUIRED, OAuthTokenResponse, ProviderError, ResendConfirmationCodeRequest,
        RespondToAuthChallengeRequest, SignUpRequest, SignUpResponse, UserAttribute,
    },
};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const OAUTH_SCOPE: &str = "email openid profile";

/// Resposta do protocolo JSON: o provedor pode aceitar ou recusar com um
/// corpo de erro estruturado. Recusas são valores, não erros; o chamador
/// precisa inspecioná-las.
#[derive(Debug, Clone)]
pub enum ProviderReply<T> {
    Accepted(T),
    Rejected(ProviderError),
}

// Cliente HTTP do provedor de identidade (Cognito)
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    config: CognitoConfig,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, config: CognitoConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &CognitoConfig {
        &self.config
    }

    async fn call<Req, Res>(
        &self,
        operation: &str,
        body: &Req,
    ) -> Result<ProviderReply<Res>, AppError>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.config.idp_endpoint)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            return Ok(ProviderReply::Accepted(serde_json::from_str(&text)?));
        }

        let error = serde_json::from_str::<ProviderError>(&text).unwrap_or_else(|_| ProviderError {
            kind: format!("HTTP {}", status.as_u16()),
            message: (!text.is_empty()).then_some(text),
        });
        tracing::warn!("⚠️ {} recusado pelo provedor: {}", operation, error.short_kind());
        Ok(ProviderReply::Rejected(error))
    }

    pub async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ProviderReply<InitiateAuthResponse>, AppError> {
        let request = InitiateAuthRequest {
            client_id: &self.config.client_id,
            auth_flow: "USER_PASSWORD_AUTH",
            auth_parameters: HashMap::from([("USERNAME", username), ("PASSWORD", password)]),
        };
        self.call("InitiateAuth", &request).await
    }

    pub async fn respond_to_new_password(
        &self,
        session: &str,
        username: &str,
        new_password: &str,
    ) -> Result<ProviderReply<InitiateAuthResponse>, AppError> {
        let request = RespondToAuthChallengeRequest {
            client_id: &self.config.client_id,
            challenge_name: NEW_PASSWORD_REQUIRED,
            session,
            challenge_responses: HashMap::from([
                ("USERNAME", username),
                ("NEW_PASSWORD", new_password),
            ]),
        };
        self.call("RespondToAuthChallenge", &request).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderReply<SignUpResponse>, AppError> {
        let request = SignUpRequest {
            client_id: &self.config.client_id,
            username: email,
            password,
            user_attributes: vec![UserAttribute {
                name: "email",
                value: email,
            }],
        };
        self.call("SignUp", &request).await
    }

    pub async fn confirm_sign_up(
        &self,
        username: &str,
        code: &str,
    ) -> Result<ProviderReply<EmptyResponse>, AppError> {
        let request = ConfirmSignUpRequest {
            client_id: &self.config.client_id,
            username,
            confirmation_code: code,
        };
        self.call("ConfirmSignUp", &request).await
    }

    pub async fn resend_confirmation_code(
        &self,
        username: &str,
    ) -> Result<ProviderReply<EmptyResponse>, AppError> {
        let request = ResendConfirmationCodeRequest {
            client_id: &self.config.client_id,
            username,
        };
        self.call("ResendConfirmationCode", &request).await
    }

    // --- Hosted UI (OAuth2 authorization code) ---

    pub fn authorize_url(
        &self,
        state: &str,
        identity_provider: Option<&str>,
    ) -> Result<Url, AppError> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("scope", OAUTH_SCOPE),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("state", state),
        ];
        if let Some(provider) = identity_provider {
            params.push(("identity_provider", provider));
        }

        Url::parse_with_params(&format!("{}/oauth2/authorize", self.config.hosted_ui_url), &params)
            .map_err(|e| anyhow::anyhow!("URL de autorização inválida: {}", e).into())
    }

    pub fn logout_url(&self) -> Result<Url, AppError> {
        Url::parse_with_params(
            &format!("{}/logout", self.config.hosted_ui_url),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("logout_uri", self.config.logout_uri.as_str()),
            ],
        )
        .map_err(|e| anyhow::anyhow!("URL de logout inválida: {}", e).into())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<OAuthTokenResponse, AppError> {
        let resp = self
            .http
            .post(format!("{}/oauth2/token", self.config.hosted_ui_url))
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Provider(format!(
                "Falha na troca de token: {}",
                status.as_u16()
            )));
        }
        Ok(serde_json::from_str(&resp.text().await?)?)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
