use rocket::http::Status;
use rocket::response::Responder;
use rocket::{Request, Response};
use std::io::Cursor;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the session subsystem.
///
/// A missing, expired, or tampered token always surfaces as `Unauthorized`
/// with the same message so callers cannot distinguish "never existed" from
/// "expired". Everything else is an internal fault whose cause is retained
/// for logging only and never shown to the end user.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Your session has expired, please sign in again")]
    Unauthorized,
    #[error("Internal server error")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Internal server error")]
    Codec { message: String },
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn codec(message: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Codec {
            message: format!("{}: {}", message.into(), source),
        }
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Unauthorized => Status::Unauthorized,
            AppError::Io { .. } => Status::InternalServerError,
            AppError::Codec { .. } => Status::InternalServerError,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        error!(
            error = ?self,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let body = self.to_string();

        Response::build().status(status).sized_body(body.len(), Cursor::new(body)).ok()
    }
}
