//! One-shot user messages carried across a redirect in a short-lived cookie.
//!
//! Form handlers answer with [`Redirect`]; the page that is landed on reads
//! the pending messages with [`take`] and drops the cookie with
//! [`removal_cookie`].

use actix_web::{
    HttpRequest, HttpResponse,
    cookie::{Cookie, SameSite},
    http::header,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const FLASH_COOKIE: &str = "autospa_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

impl FlashMessage {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

fn encode(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_vec(messages).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode(value: &str) -> Vec<FlashMessage> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Pending messages on this request; a garbled cookie reads as none.
pub fn take(req: &HttpRequest) -> Vec<FlashMessage> {
    req.cookie(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Messages a response is about to flash.
#[cfg(test)]
pub fn flashed_by(resp: &HttpResponse) -> Vec<FlashMessage> {
    resp.cookies()
        .find(|c| c.name() == FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default()
}

/// Page payload with any pending messages attached.
#[derive(Serialize)]
pub struct Page<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    pub messages: Vec<FlashMessage>,
}

/// `200 OK` JSON for a page-level read; consumes pending messages.
pub fn page<T: Serialize>(req: &HttpRequest, data: T) -> HttpResponse {
    let messages = take(req);
    let mut builder = HttpResponse::Ok();
    if !messages.is_empty() {
        builder.cookie(removal_cookie());
    }
    builder.json(Page { data, messages })
}

/// `302 Found` with flashed messages and any extra cookies.
pub struct Redirect {
    location: String,
    messages: Vec<FlashMessage>,
    cookies: Vec<Cookie<'static>>,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            messages: Vec::new(),
            cookies: Vec::new(),
        }
    }

    pub fn flash(mut self, level: Level, message: impl Into<String>) -> Self {
        self.messages.push(FlashMessage::new(level, message));
        self
    }

    pub fn cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn finish(self) -> HttpResponse {
        let mut builder = HttpResponse::Found();
        builder.insert_header((header::LOCATION, self.location));

        if !self.messages.is_empty() {
            builder.cookie(
                Cookie::build(FLASH_COOKIE, encode(&self.messages))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .finish(),
            );
        }
        for cookie in self.cookies {
            builder.cookie(cookie);
        }

        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test::TestRequest};

    #[test]
    fn redirect_carries_location_and_messages() {
        let resp = Redirect::to("/login")
            .flash(Level::Danger, "Invalid username or password.")
            .finish();

        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

        let cookie = resp.cookies().find(|c| c.name() == FLASH_COOKIE).unwrap();
        assert_eq!(
            decode(cookie.value()),
            vec![FlashMessage::new(Level::Danger, "Invalid username or password.")]
        );
    }

    #[test]
    fn redirect_without_messages_sets_no_flash_cookie() {
        let resp = Redirect::to("/").finish();
        assert!(resp.cookies().all(|c| c.name() != FLASH_COOKIE));
    }

    #[test]
    fn take_reads_pending_messages() {
        let pending = vec![
            FlashMessage::new(Level::Success, "User 'bob' created successfully!"),
            FlashMessage::new(Level::Info, "You have been logged out."),
        ];
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, encode(&pending)))
            .to_http_request();

        assert_eq!(take(&req), pending);
    }

    #[test]
    fn garbled_cookie_reads_as_empty() {
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "%%not-base64%%"))
            .to_http_request();
        assert!(take(&req).is_empty());
    }

    #[actix_web::test]
    async fn page_attaches_and_clears_messages() {
        let pending = vec![FlashMessage::new(Level::Warning, "New password cannot be empty.")];
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, encode(&pending)))
            .to_http_request();

        let resp = page(&req, serde_json::json!({ "users": [] }));
        assert_eq!(resp.status(), StatusCode::OK);
        let cleared = resp.cookies().find(|c| c.name() == FLASH_COOKIE).unwrap();
        assert_eq!(cleared.value(), "");

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["users"], serde_json::json!([]));
        assert_eq!(json["messages"][0]["level"], "warning");
    }
}
