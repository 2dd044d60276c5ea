// src/handlers/auth.rs
//
// Handlers dos formulários de autenticação (login, cadastro, confirmação,
// logout). Todo resultado visível vai para a barra de status via `Feedback`.

use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    middleware::route_guard::DASHBOARD_PAGE,
    models::auth::{LoginPayload, ProviderError},
    services::auth::{SessionManager, SignInOutcome, SignOut, SignUpOutcome},
    ui::{Control, Feedback, StatusKind},
};

const NEW_PASSWORD_PROMPT: &str =
    "Digite uma nova senha (mín. 8 caracteres, com maiúscula, minúscula e número):";

fn report<F: Feedback>(ui: &mut F, error: AppError) -> AppError {
    ui.show_status(&error.user_message(), StatusKind::Error);
    error
}

// Erro de validação com mensagem fixa (campos obrigatórios do formulário)
fn validation_error(field: &'static str, message: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    let mut err = ValidationError::new("required");
    err.message = Some(message.into());
    errors.add(field, err);
    AppError::ValidationError(errors)
}

// No login o texto do provedor tem prioridade sobre o mapeamento
fn login_rejection(error: &ProviderError) -> AppError {
    let message = error
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .or_else(|| (!error.kind.is_empty()).then(|| error.short_kind().to_string()))
        .unwrap_or_else(|| "Erro no login. Verifique suas credenciais.".to_string());
    AppError::Provider(message)
}

// Handler de login
pub async fn login<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    identifier: &str,
    password: &str,
) -> Result<(), AppError> {
    let payload = LoginPayload {
        identifier: identifier.trim().to_string(),
        password: password.trim().to_string(),
    };
    if let Err(errors) = payload.validate() {
        return Err(report(ui, errors.into()));
    }

    ui.set_busy(Control::Login, true);
    let result = login_flow(session, ui, &payload).await;
    ui.set_busy(Control::Login, false);
    result
}

async fn login_flow<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    payload: &LoginPayload,
) -> Result<(), AppError> {
    let outcome = match session.sign_in(&payload.identifier, &payload.password).await {
        Ok(outcome) => outcome,
        Err(e) => return Err(report(ui, e)),
    };

    match outcome {
        SignInOutcome::Authenticated(_) => {
            ui.show_status("Login realizado com sucesso!", StatusKind::Success);
            Ok(())
        }
        SignInOutcome::Rejected(error) => Err(report(ui, login_rejection(&error))),
        SignInOutcome::NewPasswordRequired { session: challenge } => {
            let Some(new_password) = ui.prompt(NEW_PASSWORD_PROMPT) else {
                ui.show_status("Troca de senha cancelada.", StatusKind::Info);
                return Err(AppError::NotAuthenticated);
            };

            match session.respond_to_challenge(&challenge, new_password.trim()).await {
                Ok(SignInOutcome::Authenticated(_)) => {
                    ui.show_status("Senha alterada e login realizado!", StatusKind::Success);
                    Ok(())
                }
                Ok(SignInOutcome::Rejected(error)) => {
                    Err(report(ui, AppError::Provider(error.user_message())))
                }
                Ok(SignInOutcome::NewPasswordRequired { .. }) => Err(report(
                    ui,
                    AppError::Provider("Erro ao alterar senha.".to_string()),
                )),
                Err(e) => Err(report(ui, e)),
            }
        }
    }
}

// Handler de cadastro. Em caso de sucesso a página mostra o formulário de confirmação.
pub async fn signup<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    email: &str,
    password: &str,
    password_confirmation: &str,
) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() || password_confirmation.is_empty() {
        return Err(report(ui, validation_error("fields", "Preencha todos os campos.")));
    }

    ui.set_busy(Control::Signup, true);
    let result = session.sign_up(email, password, password_confirmation).await;
    ui.set_busy(Control::Signup, false);

    match result {
        Ok(SignUpOutcome::Registered(response)) if response.user_sub.is_some() => {
            tracing::info!("📝 Novo cadastro: {}", email);
            ui.show_status("Cadastro realizado! Verifique seu email.", StatusKind::Success);
            Ok(())
        }
        Ok(SignUpOutcome::Registered(_)) => Err(report(
            ui,
            AppError::Provider("Erro no cadastro".to_string()),
        )),
        Ok(SignUpOutcome::Rejected(error)) => {
            Err(report(ui, AppError::Provider(error.user_message())))
        }
        Err(e) => Err(report(ui, e)),
    }
}

// Handler de confirmação do código enviado por email
pub async fn confirm_signup<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    code: &str,
) -> Result<(), AppError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(report(
            ui,
            validation_error("code", "Digite o código de confirmação."),
        ));
    }

    ui.set_busy(Control::Confirm, true);
    let result = session.confirm_sign_up(code).await;
    ui.set_busy(Control::Confirm, false);

    match result {
        Ok(None) => {
            ui.show_status(
                "Email confirmado! Você já pode fazer login.",
                StatusKind::Success,
            );
            Ok(())
        }
        Ok(Some(error)) => Err(report(ui, AppError::Provider(error.user_message()))),
        Err(e) => Err(report(ui, e)),
    }
}

pub async fn resend_code<F: Feedback>(
    session: &SessionManager,
    ui: &mut F,
) -> Result<(), AppError> {
    ui.set_busy(Control::ResendCode, true);
    let result = session.resend_confirmation_code().await;
    ui.set_busy(Control::ResendCode, false);

    match result {
        Ok(None) => {
            ui.show_status("Código reenviado para seu email", StatusKind::Success);
            Ok(())
        }
        Ok(Some(error)) => Err(report(ui, AppError::Provider(error.user_message()))),
        Err(AppError::NoPendingConfirmation) => Err(report(
            ui,
            AppError::Provider("Erro ao reenviar código".to_string()),
        )),
        Err(e) => Err(report(ui, e)),
    }
}

// Login pelo Hosted UI (com `Some("Google")` vai direto para o SSO do Google)
pub fn hosted_ui_login<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    identity_provider: Option<&str>,
) -> Result<(), AppError> {
    let url = match session.begin_hosted_ui(identity_provider) {
        Ok(url) => url,
        Err(e) => return Err(report(ui, e)),
    };

    if let Some(provider) = identity_provider {
        ui.show_status(&format!("Redirecionando para {provider}..."), StatusKind::Info);
    }
    ui.redirect(url.as_str());
    Ok(())
}

// Página de callback do Hosted UI: troca o código e segue para o dashboard
pub async fn hosted_ui_callback<F: Feedback>(
    session: &mut SessionManager,
    ui: &mut F,
    code: &str,
    state: &str,
) -> Result<(), AppError> {
    match session.complete_hosted_ui(code, state).await {
        Ok(info) => {
            ui.show_status(
                &format!("Bem-vindo, {}!", info.name.as_deref().unwrap_or(&info.username)),
                StatusKind::Success,
            );
            ui.redirect(DASHBOARD_PAGE);
            Ok(())
        }
        Err(e) => Err(report(ui, e)),
    }
}

// Logout: encerra a sessão local e, se houver, a do Hosted UI
pub fn logout<F: Feedback>(session: &mut SessionManager, ui: &mut F) -> SignOut {
    let signed_out = session.sign_out();
    ui.show_status("Logout realizado com sucesso", StatusKind::Success);
    if let Some(url) = &signed_out.logout_url {
        ui.redirect(url.as_str());
    }
    signed_out
}
