//! Create post table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Post::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Post::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Post::Identifier).string_len(16).not_null())
                    .col(ColumnDef::new(Post::Slug).string_len(256).not_null())
                    .col(ColumnDef::new(Post::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Post::Body).text())
                    .col(ColumnDef::new(Post::SubName).string_len(64).not_null())
                    .col(ColumnDef::new(Post::Username).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Post::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Post::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_user")
                            .from(Post::Table, Post::Username)
                            .to(User::Table, User::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_sub")
                            .from(Post::Table, Post::SubName)
                            .to(Sub::Table, Sub::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (identifier, slug) - post lookup from URLs
        manager
            .create_index(
                Index::create()
                    .name("idx_post_identifier_slug")
                    .table(Post::Table)
                    .col(Post::Identifier)
                    .col(Post::Slug)
                    .to_owned(),
            )
            .await?;

        // Index: sub_name (for listing a sub's posts)
        manager
            .create_index(
                Index::create()
                    .name("idx_post_sub_name")
                    .table(Post::Table)
                    .col(Post::SubName)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (newest-first listings)
        manager
            .create_index(
                Index::create()
                    .name("idx_post_created_at")
                    .table(Post::Table)
                    .col(Post::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Post::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
    Identifier,
    Slug,
    Title,
    Body,
    SubName,
    Username,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Username,
}

#[derive(Iden)]
enum Sub {
    Table,
    Name,
}
