use crate::error::app_error::AppError;
use crate::session::model::Session;
use crate::session::store::{RequestMeta, SessionStore};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use std::sync::Arc;

/// The session resolved from the request's `session` cookie.
///
/// Resolving implies the sliding refresh: by the time a handler sees this
/// value the session's expiry has already been extended.
#[derive(Debug)]
pub struct CurrentSession(pub Session);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentSession {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let token = match req.cookies().get("session") {
            Some(cookie) => cookie.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
        };

        let store = match req.rocket().state::<Arc<SessionStore>>() {
            Some(store) => store,
            None => return Outcome::Error((Status::InternalServerError, AppError::Unauthorized)),
        };

        match store.fetch(&token).await {
            Ok(session) => Outcome::Success(CurrentSession(session)),
            Err(e) => Outcome::Error((Status::from(&e), e)),
        }
    }
}

/// Pick the client address by the configured precedence: the socket address
/// when the connection exposes one, then the first `X-Forwarded-For` entry,
/// then the single-value proxy headers.
fn client_ip(req: &Request<'_>) -> Option<String> {
    if let Some(addr) = req.remote() {
        return Some(addr.ip().to_string());
    }

    if let Some(forwarded) = req.headers().get_one("x-forwarded-for") {
        let first = forwarded.split(',').next().map(str::trim).unwrap_or_default();
        if !first.is_empty() {
            return Some(first.to_string());
        }
    }

    for header in ["x-real-ip", "x-client-ip", "cf-connecting-ip"] {
        if let Some(value) = req.headers().get_one(header) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestMeta {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        Outcome::Success(RequestMeta {
            ip: client_ip(req),
            user_agent: req.headers().get_one("user-agent").map(str::to_string),
            referer: req.headers().get_one("referer").map(str::to_string),
        })
    }
}
