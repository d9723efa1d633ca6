use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::WorkspaceId).uuid().not_null())
                    .col(ColumnDef::new(Posts::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Posts::Content).text().not_null())
                    .col(ColumnDef::new(Posts::Platforms).json_binary().not_null())
                    .col(ColumnDef::new(Posts::MediaUrl).string())
                    .col(ColumnDef::new(Posts::Status).string().not_null())
                    .col(ColumnDef::new(Posts::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::FailedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::Error).text())
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing is always workspace-scoped, newest first.
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_workspace_created")
                    .table(Posts::Table)
                    .col(Posts::WorkspaceId)
                    .col(Posts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_status")
                    .table(Posts::Table)
                    .col(Posts::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    WorkspaceId,
    AuthorId,
    Content,
    Platforms,
    MediaUrl,
    Status,
    ScheduledAt,
    PublishedAt,
    FailedAt,
    Error,
    CreatedAt,
    UpdatedAt,
}
