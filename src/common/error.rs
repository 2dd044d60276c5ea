// src/common/error.rs

use thiserror::Error;

// Mensagem padrão para falhas de conectividade (recuperação = recarregar a página)
pub const CONNECTIVITY_MESSAGE: &str =
    "Erro de conectividade com o servidor. Recarregue a página e tente novamente.";

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Nenhuma área demarcada")]
    MissingPolygon,

    #[error("Usuário não autenticado")]
    NotAuthenticated,

    #[error("Sessão expirada")]
    SessionExpired,

    #[error("Parâmetro state do OAuth não confere")]
    InvalidOAuthState,

    #[error("Nenhum cadastro aguardando confirmação")]
    NoPendingConfirmation,

    #[error("Propriedade não encontrada: {0}")]
    PropertyNotFound(String),

    #[error("Já existe uma requisição em andamento")]
    RequestInFlight,

    // Resposta não-2xx do backend; `message` é o campo `error` do corpo
    #[error("Erro do backend ({status}): {message}")]
    Backend { status: u16, message: String },

    // Falhas do provedor de identidade fora do protocolo JSON (endpoints OAuth2)
    #[error("Erro do provedor de identidade: {0}")]
    Provider(String),

    #[error("Erro de rede: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Erro de serialização: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro de armazenamento: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Texto exibido ao usuário na barra de status.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => {
                // Primeira mensagem por ordem de campo: o HashMap não tem ordem estável
                let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                fields
                    .into_iter()
                    .flat_map(|(_, errs)| errs.iter())
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "Um ou mais campos são inválidos.".to_string())
            }
            AppError::MissingPolygon => {
                "Nenhuma área foi demarcada. Desenhe um polígono primeiro.".to_string()
            }
            AppError::NotAuthenticated => {
                "Usuário não autenticado. Faça login primeiro.".to_string()
            }
            AppError::SessionExpired => {
                "Sessão expirada. Redirecionando para login...".to_string()
            }
            AppError::InvalidOAuthState => {
                "Resposta de login inválida. Tente entrar novamente.".to_string()
            }
            AppError::NoPendingConfirmation => "Erro: usuário não encontrado".to_string(),
            AppError::PropertyNotFound(_) => "Propriedade não encontrada.".to_string(),
            AppError::RequestInFlight => "Aguarde a conclusão da operação atual.".to_string(),
            // O backend fala por si: mensagem repassada sem alteração
            AppError::Backend { message, .. } => message.clone(),
            AppError::Provider(message) => message.clone(),
            AppError::Network(_) => CONNECTIVITY_MESSAGE.to_string(),
            e => {
                tracing::error!("🔥 Erro interno: {}", e);
                "Ocorreu um erro inesperado.".to_string()
            }
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::SessionExpired | AppError::NotAuthenticated)
    }
}
