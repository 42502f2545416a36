//! Vote entity (one user's up/down vote on a post or a comment).
//!
//! The target is stored as a `(target_kind, target_id)` pair so that a row
//! always points at exactly one post or one comment. The unique index on
//! `(username, target_kind, target_id)` is what keeps racing inserts from
//! producing a second row for the same voter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which table `target_id` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[sea_orm(string_value = "post")]
    Post,
    #[sea_orm(string_value = "comment")]
    Comment,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The voter
    #[sea_orm(indexed)]
    pub username: String,

    pub target_kind: TargetKind,

    /// Post ID or comment ID, depending on `target_kind`
    #[sea_orm(indexed)]
    pub target_id: String,

    /// -1 or 1; a cleared vote is deleted rather than stored as 0
    pub value: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Username",
        to = "super::user::Column::Username",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
