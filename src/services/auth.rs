// src/services/auth.rs

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{
    decode_header,
    errors::{Error as JwtError, ErrorKind},
};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Url,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::token_repo::{TokenStore, ACCESS_TOKEN_KEY, ID_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_KEYS},
    models::auth::{
        validate_password_policy, AuthenticationResult, InitiateAuthResponse, NewPasswordPayload,
        ProviderError, Session, SignUpPayload, SignUpResponse, TokenClaims, UserInfo,
        NEW_PASSWORD_REQUIRED,
    },
    services::identity::{IdentityClient, ProviderReply},
};

/// Resultado de `sign_in` / `respond_to_challenge`.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Authenticated(AuthenticationResult),
    NewPasswordRequired { session: String },
    // Recusa do provedor (credenciais erradas, usuário inexistente...)
    Rejected(ProviderError),
}

#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    Registered(SignUpResponse),
    Rejected(ProviderError),
}

// Resultado do sign-out: para onde redirecionar para encerrar o Hosted UI
#[derive(Debug, Clone)]
pub struct SignOut {
    pub logout_url: Option<Url>,
}

/// Lê o payload do JWT SEM verificar a assinatura. Serve apenas para
/// exibir dados e checar `exp` no cliente; a autorização real é do backend.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AppError> {
    // Cabeçalho precisa ser um cabeçalho JWT válido
    decode_header(token)?;

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| JwtError::from(ErrorKind::InvalidToken))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| JwtError::from(ErrorKind::InvalidToken))?;

    Ok(serde_json::from_slice(&bytes)?)
}

// Gerenciador de sessão: credenciais, persistência e headers de autenticação
pub struct SessionManager {
    identity: IdentityClient,
    store: Arc<dyn TokenStore>,
    session: Session,
    pending_oauth_state: Option<String>,
}

impl SessionManager {
    /// Restaura os tokens persistidos (equivalente ao construtor do site).
    pub fn restore(identity: IdentityClient, store: Arc<dyn TokenStore>) -> Self {
        let session = Session {
            access_token: store.get(ACCESS_TOKEN_KEY),
            id_token: store.get(ID_TOKEN_KEY),
            refresh_token: store.get(REFRESH_TOKEN_KEY),
            ..Default::default()
        };

        tracing::info!(
            "🚀 Sessão restaurada (access: {}, id: {}, refresh: {})",
            session.access_token.is_some(),
            session.id_token.is_some(),
            session.refresh_token.is_some()
        );

        let mut manager = Self {
            identity,
            store,
            session,
            pending_oauth_state: None,
        };
        manager.session.current_username = manager.user_info().map(|info| info.username);
        manager
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    fn persist(&self, key: &str, value: Option<&str>) -> Result<(), AppError> {
        match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        }
    }

    // Guarda os tokens em memória e no armazenamento durável.
    // Sempre substitui o conjunto inteiro: nada de um login anterior sobrevive.
    fn store_tokens(
        &mut self,
        access_token: Option<String>,
        id_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<(), AppError> {
        self.session.access_token = access_token;
        self.session.id_token = id_token;
        self.session.refresh_token = refresh_token;

        self.persist(ACCESS_TOKEN_KEY, self.session.access_token.as_deref())?;
        self.persist(ID_TOKEN_KEY, self.session.id_token.as_deref())?;
        self.persist(REFRESH_TOKEN_KEY, self.session.refresh_token.as_deref())?;

        tracing::info!("✅ Login realizado, tokens salvos");
        Ok(())
    }

    fn accept_auth_response(
        &mut self,
        response: InitiateAuthResponse,
    ) -> Result<SignInOutcome, AppError> {
        if let Some(result) = response.authentication_result {
            self.store_tokens(
                result.access_token.clone(),
                result.id_token.clone(),
                result.refresh_token.clone(),
            )?;
            return Ok(SignInOutcome::Authenticated(result));
        }

        match (response.challenge_name.as_deref(), response.session) {
            (Some(NEW_PASSWORD_REQUIRED), Some(session)) => {
                tracing::info!("🔑 Provedor exige nova senha");
                Ok(SignInOutcome::NewPasswordRequired { session })
            }
            (challenge, _) => Ok(SignInOutcome::Rejected(ProviderError {
                kind: challenge.unwrap_or("UnexpectedResponse").to_string(),
                message: Some("Resposta inesperada do provedor de identidade".to_string()),
            })),
        }
    }

    pub async fn sign_in(
        &mut self,
        identifier: &str,
        password: &str,
    ) -> Result<SignInOutcome, AppError> {
        self.session.current_username = Some(identifier.to_string());

        match self.identity.initiate_auth(identifier, password).await? {
            ProviderReply::Accepted(response) => self.accept_auth_response(response),
            ProviderReply::Rejected(error) => Ok(SignInOutcome::Rejected(error)),
        }
    }

    /// Conclui o desafio NEW_PASSWORD_REQUIRED. A política de senha é
    /// checada antes de qualquer chamada de rede.
    pub async fn respond_to_challenge(
        &mut self,
        session: &str,
        new_password: &str,
    ) -> Result<SignInOutcome, AppError> {
        NewPasswordPayload {
            new_password: new_password.to_string(),
        }
        .validate()?;

        let username = self
            .session
            .current_username
            .clone()
            .ok_or(AppError::NotAuthenticated)?;

        match self
            .identity
            .respond_to_new_password(session, &username, new_password)
            .await?
        {
            ProviderReply::Accepted(response) => self.accept_auth_response(response),
            ProviderReply::Rejected(error) => Ok(SignInOutcome::Rejected(error)),
        }
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<SignUpOutcome, AppError> {
        SignUpPayload {
            email: email.to_string(),
            password: password.to_string(),
            password_confirmation: password_confirmation.to_string(),
        }
        .validate()?;

        match self.identity.sign_up(email, password).await? {
            ProviderReply::Accepted(response) => {
                if response.user_sub.is_some() {
                    self.session.pending_confirmation_username = Some(email.to_string());
                }
                Ok(SignUpOutcome::Registered(response))
            }
            ProviderReply::Rejected(error) => Ok(SignUpOutcome::Rejected(error)),
        }
    }

    pub async fn confirm_sign_up(&mut self, code: &str) -> Result<Option<ProviderError>, AppError> {
        let username = self
            .session
            .pending_confirmation_username
            .clone()
            .ok_or(AppError::NoPendingConfirmation)?;

        match self.identity.confirm_sign_up(&username, code).await? {
            ProviderReply::Accepted(_) => {
                tracing::info!("📧 Email confirmado para {}", username);
                Ok(None)
            }
            ProviderReply::Rejected(error) => Ok(Some(error)),
        }
    }

    pub async fn resend_confirmation_code(&self) -> Result<Option<ProviderError>, AppError> {
        let username = self
            .session
            .pending_confirmation_username
            .as_deref()
            .ok_or(AppError::NoPendingConfirmation)?;

        match self.identity.resend_confirmation_code(username).await? {
            ProviderReply::Accepted(_) => Ok(None),
            ProviderReply::Rejected(error) => Ok(Some(error)),
        }
    }

    // --- Hosted UI / SSO ---

    /// URL de login do Hosted UI (`identity_provider = Some("Google")` para SSO direto).
    pub fn begin_hosted_ui(&mut self, identity_provider: Option<&str>) -> Result<Url, AppError> {
        let state = Uuid::new_v4().to_string();
        let url = self.identity.authorize_url(&state, identity_provider)?;
        self.pending_oauth_state = Some(state);
        Ok(url)
    }

    pub async fn complete_hosted_ui(
        &mut self,
        code: &str,
        state: &str,
    ) -> Result<UserInfo, AppError> {
        if self.pending_oauth_state.take().as_deref() != Some(state) {
            return Err(AppError::InvalidOAuthState);
        }

        let tokens = self.identity.exchange_code(code).await?;
        self.store_tokens(Some(tokens.access_token), tokens.id_token, tokens.refresh_token)?;

        let info = self.user_info().ok_or(AppError::NotAuthenticated)?;
        self.session.current_username = Some(info.username.clone());
        tracing::info!("👤 Usuário autenticado via Hosted UI: {}", info.username);
        Ok(info)
    }

    /// Renovação explícita (nunca automática). Em caso de falha a sessão é encerrada.
    pub async fn refresh_tokens(&mut self) -> Result<(), AppError> {
        let refresh_token = self
            .session
            .refresh_token
            .clone()
            .ok_or(AppError::NotAuthenticated)?;

        match self.identity.refresh(&refresh_token).await {
            Ok(tokens) => {
                // O grant refresh_token normalmente não devolve outro refresh token
                let refresh_token = tokens.refresh_token.or(Some(refresh_token));
                self.store_tokens(Some(tokens.access_token), tokens.id_token, refresh_token)
            }
            Err(e) => {
                tracing::error!("🔥 Falha ao renovar tokens: {}", e);
                self.sign_out();
                Err(AppError::SessionExpired)
            }
        }
    }

    /// Limpa tokens em memória e persistidos, sempre.
    pub fn sign_out(&mut self) -> SignOut {
        self.session = Session::default();
        self.pending_oauth_state = None;

        for key in TOKEN_KEYS {
            if let Err(e) = self.store.remove(key) {
                tracing::error!("🔥 Falha ao remover {} do armazenamento: {}", key, e);
            }
        }
        tracing::info!("🚪 Usuário saiu, tokens removidos");

        SignOut {
            logout_url: self.identity.logout_url().ok(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.access_token.is_some() || self.session.id_token.is_some()
    }

    // ID token tem preferência para as APIs
    pub fn get_token(&self) -> Option<&str> {
        self.session
            .id_token
            .as_deref()
            .or(self.session.access_token.as_deref())
    }

    pub fn auth_headers(&self) -> Result<HeaderMap, AppError> {
        let token = self.get_token().ok_or(AppError::NotAuthenticated)?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| AppError::NotAuthenticated)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub fn is_token_valid(&self) -> bool {
        let Some(token) = self.get_token() else {
            tracing::debug!("❌ Nenhum token para validar");
            return false;
        };

        match decode_claims(token) {
            Ok(claims) => {
                let now = Utc::now().timestamp();
                let valid = claims.exp.is_some_and(|exp| exp > now);
                tracing::debug!(
                    "⏰ Validação do token: exp={:?} now={} valid={}",
                    claims.exp,
                    now,
                    valid
                );
                valid
            }
            Err(e) => {
                tracing::warn!("❌ Erro ao validar token: {}", e);
                false
            }
        }
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        let token = self.get_token()?;
        match decode_claims(token) {
            Ok(claims) => Some(UserInfo::from(claims)),
            Err(e) => {
                tracing::warn!("❌ Erro ao extrair dados do usuário: {}", e);
                None
            }
        }
    }

    pub fn validate_password(password: &str) -> bool {
        validate_password_policy(password).is_ok()
    }
}
