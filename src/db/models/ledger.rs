use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rewards::UserId;

/// Where a point-earning event came from. Stored as the `point_source`
/// Postgres enum; the JSON literals match the column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PointSource {
    Checkin,
    Streak,
    Badge,
    Community,
    Chat,
    Bonus,
}

/// Base points_history table model. Rows are append-only — nothing in the
/// service mutates or deletes one once written.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointsHistoryEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub points: i64,
    pub reason: String,
    pub source: PointSource,
    pub created_at: NaiveDateTime,
}

impl PointSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointSource::Checkin => "checkin",
            PointSource::Streak => "streak",
            PointSource::Badge => "badge",
            PointSource::Community => "community",
            PointSource::Chat => "chat",
            PointSource::Bonus => "bonus",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_source_json_literals() {
        let src: PointSource = serde_json::from_str("\"checkin\"").unwrap();
        assert_eq!(src, PointSource::Checkin);
        assert_eq!(serde_json::to_string(&PointSource::Bonus).unwrap(), "\"bonus\"");

        // unknown literals must be rejected at the boundary
        assert!(serde_json::from_str::<PointSource>("\"lottery\"").is_err());
    }
}
