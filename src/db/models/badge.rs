use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Informational grouping only — the unlock rule is always the points
/// threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "badge_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Consistency,
    Milestone,
    Social,
    Wellness,
    Special,
}

/// Base badges catalog model — immutable reference data
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub points_required: i64,
}

/// Flattened user_badges × badges row, as returned by the earned-badge
/// join query. user_badges is unique on (user_id, badge_id) — a badge is
/// held at most once.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EarnedBadgeRow {
    pub id: Uuid,
    pub earned_at: NaiveDateTime,
    pub badge_id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: BadgeCategory,
    pub points_required: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarnedBadge {
    pub id: Uuid,
    pub badge: Badge,
    pub earned_at: NaiveDateTime,
}

impl EarnedBadgeRow {
    pub fn into_earned(self) -> EarnedBadge {
        EarnedBadge {
            id: self.id,
            earned_at: self.earned_at,
            badge: Badge {
                id: self.badge_id,
                name: self.name,
                description: self.description,
                icon: self.icon,
                category: self.category,
                points_required: self.points_required,
            },
        }
    }
}
