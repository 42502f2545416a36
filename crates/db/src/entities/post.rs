//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_serializing)]
    pub id: String,

    /// Public identifier used in URLs
    #[sea_orm(indexed)]
    pub identifier: String,

    #[sea_orm(indexed)]
    pub slug: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub body: Option<String>,

    pub sub_name: String,

    /// Author
    pub username: String,

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

    #[sea_orm(
        belongs_to = "super::sub::Entity",
        from = "Column::SubName",
        to = "super::sub::Column::Name",
        on_delete = "Cascade"
    )]
    Sub,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::sub::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sub.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
