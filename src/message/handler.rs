pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Path, Query, State},
        http::StatusCode,
    };
    use axum_extra::extract::WithRejection;
    use serde::Deserialize;

    use crate::error::Error;
    use crate::message::model::{MessageDto, MessagePage, UnreadCount};
    use crate::message::{self, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
    use crate::{auth, conversation, event};

    #[derive(Deserialize)]
    pub struct PageParams {
        page: Option<i64>,
        page_size: Option<i64>,
    }

    pub async fn find_page(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        event_service: State<event::Service>,
        WithRejection(Path(conversation_id), _): WithRejection<Path<conversation::Id>, Error>,
        WithRejection(Query(params), _): WithRejection<Query<PageParams>, Error>,
    ) -> crate::Result<Json<MessagePage>> {
        let page = message_service
            .list_page(
                &conversation_id,
                auth_user.id(),
                params.page.unwrap_or(DEFAULT_PAGE),
                params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            )
            .await?;

        if page.newly_seen() > 0 {
            event::service::notify_messages_seen(&event_service, &conversation_id, auth_user.id())
                .await;
        }

        Ok(Json(page))
    }

    #[derive(Deserialize)]
    pub struct CreateParams {
        content: String,
    }

    pub async fn create(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
        event_service: State<event::Service>,
        WithRejection(Path(conversation_id), _): WithRejection<Path<conversation::Id>, Error>,
        WithRejection(Json(params), _): WithRejection<Json<CreateParams>, Error>,
    ) -> crate::Result<(StatusCode, Json<MessageDto>)> {
        let msg = message_service
            .append(&conversation_id, auth_user.id(), &params.content)
            .await?;

        event::service::notify_new_message(&event_service, &msg).await;

        Ok((StatusCode::CREATED, Json(msg)))
    }

    pub async fn unread_count(
        Extension(auth_user): Extension<auth::User>,
        message_service: State<message::Service>,
    ) -> crate::Result<Json<UnreadCount>> {
        let count = message_service.unread_count_for(auth_user.id()).await?;
        Ok(Json(UnreadCount::new(count)))
    }
}
