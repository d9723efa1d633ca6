use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostPlatformResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostPlatformResults::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PostPlatformResults::PostId).uuid().not_null())
                    .col(
                        ColumnDef::new(PostPlatformResults::Platform)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PostPlatformResults::Success)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PostPlatformResults::PlatformPostId).string())
                    .col(ColumnDef::new(PostPlatformResults::Error).text())
                    .col(
                        ColumnDef::new(PostPlatformResults::AttemptedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_platform_results_post")
                            .from(PostPlatformResults::Table, PostPlatformResults::PostId)
                            .to(Posts::Table, Posts::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_post_platform_results_post")
                    .table(PostPlatformResults::Table)
                    .col(PostPlatformResults::PostId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostPlatformResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PostPlatformResults {
    Table,
    Id,
    PostId,
    Platform,
    Success,
    PlatformPostId,
    Error,
    AttemptedAt,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
}
