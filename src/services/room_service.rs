//! Room identity and creation, plus room listing.

use chrono::Utc;
use futures::future::try_join_all;

use crate::error::{AppError, AppResult};
use crate::models::room::{Room, RoomDetails, UserRoomView};
use crate::services::membership::MembershipLookup;
use crate::services::read_cursor_service::ReadCursorService;
use crate::storage::ChatStore;

pub struct RoomService;

impl RoomService {
    /// Canonical room id for a pair within a team. Argument order never
    /// changes the result: the pair is sorted ascending first.
    pub fn room_id_for(team_id: &str, user_a: &str, user_b: &str) -> String {
        let (first, second) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        format!("room_{team_id}_{first}_{second}")
    }

    /// Create the room if it does not exist yet, returning its id either way.
    ///
    /// Creation is an insert-if-absent: under concurrent first-contact
    /// exactly one caller wins; losers observe the conditional-write
    /// conflict and proceed with the same id. The winner verifies the
    /// counterpart's team membership before materializing the two view
    /// rows. The room row is not rolled back if that verification fails.
    pub async fn ensure_room(
        store: &dyn ChatStore,
        membership: &dyn MembershipLookup,
        team_id: &str,
        user_id: &str,
        receiver_id: &str,
        cookie_header: &str,
    ) -> AppResult<String> {
        let (first, second) = if user_id <= receiver_id {
            (user_id, receiver_id)
        } else {
            (receiver_id, user_id)
        };
        let room_id = Self::room_id_for(team_id, first, second);

        let room = Room {
            team_id: team_id.to_string(),
            room_id: room_id.clone(),
            user_a: first.to_string(),
            user_b: second.to_string(),
            created_at: Utc::now(),
        };

        match store.insert_room_if_absent(&room).await {
            Ok(()) => {
                let profile = membership
                    .member_profile(team_id, receiver_id, cookie_header)
                    .await?;
                if profile.is_none() {
                    return Err(AppError::BadRequest(format!(
                        "could not verify participant team membership ({receiver_id})"
                    )));
                }

                let now = Utc::now();
                let view_for = |owner: &str, participant: &str| UserRoomView {
                    team_id: team_id.to_string(),
                    user_id: owner.to_string(),
                    room_id: room_id.clone(),
                    participant_id: participant.to_string(),
                    last_message: None,
                    last_message_type: None,
                    last_message_timestamp: None,
                    last_read: None,
                    created_at: now,
                };

                let view_first = view_for(first, second);
                let view_second = view_for(second, first);
                let (a, b) = futures::join!(
                    store.upsert_view(&view_first),
                    store.upsert_view(&view_second),
                );
                for result in [a, b] {
                    if let Err(e) = result {
                        tracing::error!(%room_id, error = %e, "room view write failed");
                    }
                }

                tracing::info!(%room_id, %team_id, "chat room created");
            }
            // Lost the creation race: the room already exists with this id.
            Err(AppError::Conflict) => {}
            Err(e) => return Err(e),
        }

        Ok(room_id)
    }

    /// Room listing for a user: each view row joined with the participant's
    /// profile and the unread count, fetched concurrently per room.
    pub async fn list_rooms(
        store: &dyn ChatStore,
        membership: &dyn MembershipLookup,
        team_id: &str,
        user_id: &str,
        cookie_header: &str,
        room_id: Option<&str>,
    ) -> AppResult<Vec<RoomDetails>> {
        let views = match room_id {
            Some(rid) => store
                .get_view(user_id, rid)
                .await?
                .into_iter()
                .filter(|v| v.team_id == team_id)
                .collect(),
            None => store.list_views(team_id, user_id).await?,
        };

        let details = views
            .into_iter()
            .map(|view| Self::room_details(store, membership, cookie_header, view));
        try_join_all(details).await
    }

    async fn room_details(
        store: &dyn ChatStore,
        membership: &dyn MembershipLookup,
        cookie_header: &str,
        view: UserRoomView,
    ) -> AppResult<RoomDetails> {
        let (profile, unread) = futures::join!(
            membership.member_profile(&view.team_id, &view.participant_id, cookie_header),
            ReadCursorService::unread_count(store, &view.team_id, &view.room_id, &view.user_id),
        );

        let profile = profile?.ok_or_else(|| {
            AppError::BadRequest(format!(
                "participant info not found ({})",
                view.participant_id
            ))
        })?;

        Ok(RoomDetails {
            room_id: view.room_id,
            participant_id: view.participant_id,
            participant_name: profile.display_name,
            is_participant_online: profile.online,
            participant_profile_pic: profile.profile_picture_url,
            last_message: view.last_message,
            last_message_type: view.last_message_type,
            unread_messages_count: unread?,
            created_at: view.created_at,
        })
    }
}
