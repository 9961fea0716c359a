use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::auth::Identity,
    error::AppError,
    model::{
        chat::{ChatMessage, Conversation},
        user::ChatUser,
    },
    store::notifications::UnreadCounter,
};

/// Everyone the caller can message
#[utoipa::path(
    get,
    path = "/api/chat/users",
    responses((status = 200, description = "Other users by name", body = [ChatUser])),
    tag = "Chat"
)]
pub async fn users(user: Identity, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let users = sqlx::query_as::<_, ChatUser>(
        "SELECT id, userName AS username FROM users WHERE id != ? ORDER BY userName ASC",
    )
    .bind(user.user_id)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

/// Conversations with last activity and unread count, newest first
#[utoipa::path(
    get,
    path = "/api/chat/conversations",
    responses((status = 200, description = "Conversation summaries", body = [Conversation])),
    tag = "Chat"
)]
pub async fn conversations(user: Identity, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let me = user.user_id;
    let conversations = sqlx::query_as::<_, Conversation>(
        r#"
        SELECT other_user.id,
               other_user.userName AS username,
               MAX(cm.timestamp) AS last_message_time,
               CAST(SUM(CASE WHEN cm.recipient_id = ? AND cm.is_read = 0 THEN 1 ELSE 0 END) AS SIGNED) AS unread_count
        FROM chat_messages cm
        JOIN users other_user ON (
            (cm.sender_id = ? AND other_user.id = cm.recipient_id) OR
            (cm.recipient_id = ? AND other_user.id = cm.sender_id)
        )
        WHERE cm.sender_id = ? OR cm.recipient_id = ?
        GROUP BY other_user.id, other_user.userName
        ORDER BY last_message_time DESC
        "#,
    )
    .bind(me)
    .bind(me)
    .bind(me)
    .bind(me)
    .bind(me)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(conversations))
}

/// Conversation with one user, oldest first. Marks their messages as read.
#[utoipa::path(
    get,
    path = "/api/chat/messages/{other_user_id}",
    params(("other_user_id" = i64, Path, description = "Counterpart user id")),
    responses((status = 200, description = "Messages in both directions", body = [ChatMessage])),
    tag = "Chat"
)]
pub async fn messages(
    user: Identity,
    path: web::Path<i64>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let me = user.user_id;
    let other = path.into_inner();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE chat_messages SET is_read = 1 WHERE sender_id = ? AND recipient_id = ? AND is_read = 0",
    )
    .bind(other)
    .bind(me)
    .execute(&mut *tx)
    .await?;

    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT cm.message_id, cm.sender_id, cm.recipient_id, cm.message_text, cm.timestamp,
               cm.stockNumber AS stock_number, sender.userName AS sender_username
        FROM chat_messages cm
        JOIN users sender ON cm.sender_id = sender.id
        WHERE (cm.sender_id = ? AND cm.recipient_id = ?)
           OR (cm.sender_id = ? AND cm.recipient_id = ?)
        ORDER BY cm.timestamp ASC
        "#,
    )
    .bind(me)
    .bind(other)
    .bind(other)
    .bind(me)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[schema(example = 7)]
    pub recipient_id: Option<i64>,
    #[serde(default)]
    #[schema(example = "Can you pull A1234 into bay 3?")]
    pub message_text: String,
    /// Unit the message is about; blank means none
    #[serde(default, rename = "stockNumber")]
    #[schema(example = "A1234")]
    pub stock_number: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct OutgoingMessage<'a> {
    recipient_id: i64,
    text: &'a str,
    stock_number: Option<&'a str>,
}

impl SendMessageRequest {
    fn validate(&self) -> Result<OutgoingMessage<'_>, AppError> {
        let text = self.message_text.trim();
        match self.recipient_id {
            Some(recipient_id) if recipient_id > 0 && !text.is_empty() => Ok(OutgoingMessage {
                recipient_id,
                text,
                stock_number: self.stock_number.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            }),
            _ => Err(AppError::bad_request("Recipient ID and message text are required")),
        }
    }
}

/// Send a chat message
#[utoipa::path(
    post,
    path = "/api/chat/send",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = Object, example = json!({
            "success": true, "message": "Message sent"
        })),
        (status = 400, description = "Missing recipient or text"),
        (status = 404, description = "Unknown recipient")
    ),
    tag = "Chat"
)]
pub async fn send(
    user: Identity,
    body: web::Json<SendMessageRequest>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let outgoing = body.validate()?;
    let pool = pool.get_ref();

    let recipient = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
        .bind(outgoing.recipient_id)
        .fetch_optional(pool)
        .await?;
    if recipient.is_none() {
        return Err(AppError::not_found("Recipient not found"));
    }

    sqlx::query(
        "INSERT INTO chat_messages (sender_id, recipient_id, message_text, stockNumber) VALUES (?, ?, ?, ?)",
    )
    .bind(user.user_id)
    .bind(outgoing.recipient_id)
    .bind(outgoing.text)
    .bind(outgoing.stock_number)
    .execute(pool)
    .await?;

    info!(from = user.user_id, to = outgoing.recipient_id, "Chat message sent");
    Ok(HttpResponse::Created().json(json!({ "success": true, "message": "Message sent" })))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadResponse {
    pub unread: i64,
}

/// Unread message count for the caller
#[utoipa::path(
    get,
    path = "/api/chat/unread",
    responses(
        (status = 200, description = "Unread count", body = UnreadResponse),
        (status = 500, description = "Store unavailable")
    ),
    tag = "Chat"
)]
pub async fn unread(
    user: Identity,
    counter: web::Data<dyn UnreadCounter>,
) -> Result<HttpResponse, AppError> {
    let unread = counter.unread_count(user.user_id).await.map_err(|e| {
        error!(error = %e, user_id = user.user_id, "Unread count failed");
        AppError::Database
    })?;

    Ok(HttpResponse::Ok().json(UnreadResponse { unread }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::session::{SESSION_COOKIE, issue_session},
        config::Config,
        model::role::Role,
        store::fakes::{FailingUnreadCounter, FixedUnreadCounter},
    };
    use actix_web::{App, cookie::Cookie, http::StatusCode, test, web::Data};
    use std::sync::Arc;

    fn session() -> Cookie<'static> {
        let identity = Identity {
            user_id: 5,
            username: "sam".into(),
            role: Role::Employee,
        };
        let token = issue_session(&identity, &Config::for_tests().session_secret, 600).unwrap();
        Cookie::new(SESSION_COOKIE, token)
    }

    macro_rules! unread_app {
        ($counter:expr) => {{
            let counter: Arc<dyn UnreadCounter> = Arc::new($counter);
            test::init_service(
                App::new()
                    .app_data(Data::new(Config::for_tests()))
                    .app_data(Data::from(counter))
                    .route("/api/chat/unread", web::get().to(unread)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn unread_reports_count() {
        let app = unread_app!(FixedUnreadCounter(4));
        let req = test::TestRequest::get()
            .uri("/api/chat/unread")
            .cookie(session())
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "unread": 4 }));
    }

    #[actix_web::test]
    async fn unread_store_failure_is_500() {
        let app = unread_app!(FailingUnreadCounter);
        let req = test::TestRequest::get()
            .uri("/api/chat/unread")
            .cookie(session())
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn unread_without_session_redirects() {
        let app = unread_app!(FixedUnreadCounter(4));
        let req = test::TestRequest::get().uri("/api/chat/unread").to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    fn request(value: serde_json::Value) -> SendMessageRequest {
        serde_json::from_value(value).unwrap()
    }

    #[::core::prelude::v1::test]
    fn send_requires_recipient_and_text() {
        for body in [
            json!({ "message_text": "hi" }),
            json!({ "recipient_id": 7, "message_text": "   " }),
            json!({ "recipient_id": 0, "message_text": "hi" }),
        ] {
            let err = request(body).validate().unwrap_err();
            assert_eq!(err.to_string(), "Recipient ID and message text are required");
        }
    }

    #[::core::prelude::v1::test]
    fn send_trims_text_and_blank_stock_number() {
        let req = request(json!({ "recipient_id": 7, "message_text": " hi ", "stockNumber": "  " }));
        assert_eq!(
            req.validate().unwrap(),
            OutgoingMessage {
                recipient_id: 7,
                text: "hi",
                stock_number: None,
            }
        );

        let req = request(json!({ "recipient_id": 7, "message_text": "ready?", "stockNumber": " A1234 " }));
        assert_eq!(req.validate().unwrap().stock_number, Some("A1234"));
    }
}
