pub(super) mod api {
    use axum::{Extension, Json, extract::State};
    use axum_extra::extract::WithRejection;
    use serde::Deserialize;

    use crate::conversation::model::{Conversation, ConversationDto};
    use crate::conversation::{self, ListingId};
    use crate::{auth, user};

    #[derive(Deserialize)]
    pub struct CreateParams {
        participant_id: Option<user::Id>,
        listing_id: Option<ListingId>,
    }

    pub async fn get_or_create(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
        WithRejection(Json(params), _): WithRejection<Json<CreateParams>, crate::error::Error>,
    ) -> crate::Result<Json<Conversation>> {
        let c = conversation_service
            .get_or_create(
                auth_user.id(),
                params.participant_id.as_ref(),
                params.listing_id.as_ref(),
            )
            .await?;

        Ok(Json(c))
    }

    pub async fn find_all(
        Extension(auth_user): Extension<auth::User>,
        conversation_service: State<conversation::Service>,
    ) -> crate::Result<Json<Vec<ConversationDto>>> {
        let conversations = conversation_service.find_all(auth_user.id()).await?;
        Ok(Json(conversations))
    }
}
