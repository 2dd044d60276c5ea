// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;

use crate::{
    db::{FileTokenStore, HttpPropertyRepository, PropertyRepository, TokenStore},
    services::{auth::SessionManager, identity::IdentityClient, map_controller::MapController},
    ui::{MapView, PageView},
};

// Configuração do User Pool / Hosted UI do Cognito
#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub domain: String,
    // Endpoint do protocolo JSON (InitiateAuth, SignUp, ...)
    pub idp_endpoint: String,
    // Base do Hosted UI (/oauth2/authorize, /oauth2/token, /logout)
    pub hosted_ui_url: String,
    pub redirect_uri: String,
    pub logout_uri: String,
}

impl CognitoConfig {
    pub fn new(
        region: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        domain: impl Into<String>,
        app_origin: &str,
    ) -> Self {
        let region = region.into();
        let domain = domain.into();
        let origin = app_origin.trim_end_matches('/');

        Self {
            idp_endpoint: format!("https://cognito-idp.{region}.amazonaws.com/"),
            hosted_ui_url: format!("https://{domain}.auth.{region}.amazoncognito.com"),
            redirect_uri: format!("{origin}/callback.html"),
            logout_uri: origin.to_string(),
            region,
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            domain,
        }
    }

    // Aponta os dois endpoints para outra base (provedor local / testes)
    pub fn with_endpoints(
        mut self,
        idp_endpoint: impl Into<String>,
        hosted_ui_url: impl Into<String>,
    ) -> Self {
        self.idp_endpoint = idp_endpoint.into();
        self.hosted_ui_url = hosted_ui_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cognito: CognitoConfig,
    pub properties_api_url: String,
    pub session_store_path: PathBuf,
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} deve ser definida"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let region = env::var("COGNITO_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let user_pool_id = env::var("COGNITO_USER_POOL_ID").unwrap_or_default();
        let client_id = required("COGNITO_CLIENT_ID")?;
        let domain = required("COGNITO_DOMAIN")?;
        let app_origin =
            env::var("APP_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let mut cognito = CognitoConfig::new(region, user_pool_id, client_id, domain, &app_origin);
        if let Ok(endpoint) = env::var("COGNITO_IDP_ENDPOINT") {
            cognito.idp_endpoint = endpoint;
        }
        if let Ok(hosted_ui) = env::var("COGNITO_HOSTED_UI_URL") {
            cognito.hosted_ui_url = hosted_ui.trim_end_matches('/').to_string();
        }

        let properties_api_url = required("PROPERTIES_API_URL")?;
        let session_store_path = env::var("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".mapeamento/session.json"));

        Ok(Self {
            cognito,
            properties_api_url,
            session_store_path,
        })
    }
}

// O estado compartilhado: o gráfico de dependências já montado
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub identity: IdentityClient,
    pub token_store: Arc<dyn TokenStore>,
    pub property_repo: Arc<dyn PropertyRepository>,
}

impl AppState {
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let token_store = FileTokenStore::open(&config.session_store_path)
            .context("Falha ao abrir o armazenamento de sessão")?;
        Self::with_store(config, Arc::new(token_store))
    }

    pub fn with_store(config: AppConfig, token_store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        // Sem deadline explícito além do padrão do transporte; apenas o connect é limitado
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Falha ao criar o cliente HTTP")?;

        let identity = IdentityClient::new(http.clone(), config.cognito.clone());
        let property_repo = HttpPropertyRepository::new(http, config.properties_api_url.clone());

        tracing::info!("✅ Dependências montadas (API: {})", config.properties_api_url);

        Ok(Self {
            config,
            identity,
            token_store,
            property_repo: Arc::new(property_repo),
        })
    }

    /// Sessão restaurada a partir do armazenamento persistido.
    pub fn session_manager(&self) -> SessionManager {
        SessionManager::restore(self.identity.clone(), self.token_store.clone())
    }

    pub fn map_controller<M: MapView, P: PageView>(&self, map: M, page: P) -> MapController<M, P> {
        MapController::new(self.session_manager(), self.property_repo.clone(), map, page)
    }
}
