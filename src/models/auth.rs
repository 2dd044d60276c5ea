// src/models/auth.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// Desafio do Cognito para troca obrigatória de senha
pub const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

// ---
// Estado da sessão (o equivalente ao que ficava no localStorage + memória)
// ---
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub current_username: Option<String>,
    pub pending_confirmation_username: Option<String>,
}

// ---
// Política de senha: mínimo 8 caracteres, maiúscula, minúscula e número
// ---
pub fn validate_password_policy(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if long_enough && has_lower && has_upper && has_digit {
        return Ok(());
    }

    let mut err = ValidationError::new("password_policy");
    err.message = Some(
        "A senha deve ter pelo menos 8 caracteres, incluindo maiúscula, minúscula e número."
            .into(),
    );
    Err(err)
}

// Dados do formulário de login
#[derive(Debug, Clone, Validate)]
pub struct LoginPayload {
    #[validate(length(min = 1, message = "Preencha todos os campos."))]
    pub identifier: String,
    #[validate(length(min = 1, message = "Preencha todos os campos."))]
    pub password: String,
}

// Dados do formulário de cadastro
#[derive(Debug, Clone, Validate)]
pub struct SignUpPayload {
    #[validate(email(message = "Email inválido"))]
    pub email: String,
    #[validate(custom(function = "validate_password_policy"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "As senhas não coincidem."))]
    pub password_confirmation: String,
}

// Nova senha exigida pelo desafio NEW_PASSWORD_REQUIRED
#[derive(Debug, Clone, Validate)]
pub struct NewPasswordPayload {
    #[validate(custom(function = "validate_password_policy"))]
    pub new_password: String,
}

// ---
// Protocolo JSON do Cognito (requisições)
// ---
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthRequest<'a> {
    pub client_id: &'a str,
    pub auth_flow: &'a str,
    pub auth_parameters: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RespondToAuthChallengeRequest<'a> {
    pub client_id: &'a str,
    pub challenge_name: &'a str,
    pub session: &'a str,
    pub challenge_responses: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpRequest<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub user_attributes: Vec<UserAttribute<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmSignUpRequest<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub confirmation_code: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResendConfirmationCodeRequest<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
}

// ---
// Protocolo JSON do Cognito (respostas)
// ---
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitiateAuthResponse {
    pub authentication_result: Option<AuthenticationResult>,
    pub challenge_name: Option<String>,
    pub session: Option<String>,
    #[serde(default)]
    pub challenge_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpResponse {
    pub user_sub: Option<String>,
    #[serde(default)]
    pub user_confirmed: bool,
}

// Respostas vazias ({}) de ConfirmSignUp / ResendConfirmationCode
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmptyResponse {}

// Corpo de erro do provedor: { "__type": "...", "message": "..." }
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderError {
    #[serde(rename = "__type", default)]
    pub kind: String,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}

impl ProviderError {
    // O Cognito às vezes prefixa o tipo com o namespace ("...#NotAuthorizedException")
    pub fn short_kind(&self) -> &str {
        self.kind.rsplit('#').next().unwrap_or(&self.kind)
    }

    /// Mensagem amigável para o usuário, com fallback para a do provedor.
    pub fn user_message(&self) -> String {
        let mapped = match self.short_kind() {
            "UsernameExistsException" => Some("Este email já está cadastrado"),
            "InvalidPasswordException" => Some("Senha não atende aos requisitos"),
            "InvalidParameterException" => Some("Email inválido"),
            "CodeMismatchException" => Some("Código incorreto"),
            "ExpiredCodeException" => Some("Código expirado"),
            "UserNotFoundException" => Some("Usuário não encontrado"),
            "NotAuthorizedException" => Some("Erro no login. Verifique suas credenciais."),
            _ => None,
        };

        match (mapped, &self.message) {
            (Some(text), _) => text.to_string(),
            (None, Some(message)) => message.clone(),
            (None, None) => "Erro no provedor de identidade".to_string(),
        }
    }
}

// ---
// Endpoints OAuth2 do Hosted UI
// ---
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

// ---
// Payload do JWT (lido sem verificação de assinatura: apenas informativo)
// ---
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<i64>,
    pub sub: Option<String>,
    #[serde(rename = "cognito:username")]
    pub cognito_username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred_username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub sub: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub preferred_username: Option<String>,
}

impl From<TokenClaims> for UserInfo {
    fn from(claims: TokenClaims) -> Self {
        let username = claims
            .cognito_username
            .clone()
            .or_else(|| claims.email.clone())
            .unwrap_or_else(|| "User".to_string());

        Self {
            username,
            email: claims.email,
            name: claims.name,
            sub: claims.sub,
            given_name: claims.given_name,
            family_name: claims.family_name,
            preferred_username: claims.preferred_username,
        }
    }
}

impl UserInfo {
    // Inicial do avatar: nome, depois email, depois username (que costuma ser um UUID)
    pub fn display_initial(&self) -> char {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(Some(self.username.as_str()))
            .and_then(|s| s.chars().next())
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('U')
    }
}
