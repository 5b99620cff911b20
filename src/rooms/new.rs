use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{ApiClient, Result, Session};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
struct NewRoomRequest<'a> {
    name: &'a str,
}

impl ApiClient {
    pub async fn rooms(&self, session: &Session) -> Result<Vec<Room>> {
        let request = Self::authorized(self.get("/rooms"), session)?;
        let rooms: Option<Vec<Room>> = Self::json_response(request.send().await?).await?;
        Ok(rooms.unwrap_or_default())
    }

    pub async fn create_room(&self, session: &Session, name: &str) -> Result<Room> {
        let request = Self::authorized(self.post("/rooms"), session)?;
        let response = request.json(&NewRoomRequest { name }).send().await?;
        let room: Room = Self::json_response(response).await?;

        tracing::info!(room_id = %room.id, name = %room.name, "room created");
        Ok(room)
    }
}
