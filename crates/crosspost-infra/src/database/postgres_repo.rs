//! PostgreSQL post repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DbConn, DbErr, EntityTrait, LoaderTrait, ModelTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crosspost_core::domain::{PlatformPublishResult, Post, PostStatus};
use crosspost_core::error::RepoError;
use crosspost_core::ports::PostRepository;

use super::entity::{post, post_result};

/// PostgreSQL post repository.
pub struct PostgresPostRepository {
    db: DbConn,
}

impl PostgresPostRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

fn query_err(e: DbErr) -> RepoError {
    let detail = e.to_string();
    if detail.contains("duplicate") || detail.contains("unique") {
        RepoError::Constraint(detail)
    } else {
        RepoError::Query(detail)
    }
}

fn to_domain(model: post::Model, mut results: Vec<post_result::Model>) -> Result<Post, RepoError> {
    results.sort_by_key(|r| r.attempted_at);

    let platform_names: Vec<String> =
        serde_json::from_value(model.platforms).map_err(|e| RepoError::Query(e.to_string()))?;
    let platforms = platform_names
        .iter()
        .map(|name| name.parse())
        .collect::<Result<Vec<_>, String>>()
        .map_err(RepoError::Query)?;
    let status: PostStatus = model.status.parse().map_err(RepoError::Query)?;

    let results = results
        .into_iter()
        .map(|r| {
            Ok(PlatformPublishResult {
                platform: r.platform.parse().map_err(RepoError::Query)?,
                success: r.success,
                platform_post_id: r.platform_post_id,
                error: r.error,
                attempted_at: r.attempted_at.into(),
            })
        })
        .collect::<Result<Vec<_>, RepoError>>()?;

    Ok(Post {
        id: model.id,
        workspace_id: model.workspace_id,
        author_id: model.author_id,
        content: model.content,
        platforms,
        media_url: model.media_url,
        status,
        scheduled_at: model.scheduled_at.map(Into::into),
        published_at: model.published_at.map(Into::into),
        failed_at: model.failed_at.map(Into::into),
        error: model.error,
        results,
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    })
}

fn post_active_model(p: &Post) -> post::ActiveModel {
    let platform_names: Vec<&str> = p.platforms.iter().map(|p| p.as_str()).collect();
    post::ActiveModel {
        id: Set(p.id),
        workspace_id: Set(p.workspace_id),
        author_id: Set(p.author_id),
        content: Set(p.content.clone()),
        platforms: Set(serde_json::json!(platform_names)),
        media_url: Set(p.media_url.clone()),
        status: Set(p.status.to_string()),
        scheduled_at: Set(p.scheduled_at.map(Into::into)),
        published_at: Set(p.published_at.map(Into::into)),
        failed_at: Set(p.failed_at.map(Into::into)),
        error: Set(p.error.clone()),
        created_at: Set(p.created_at.into()),
        updated_at: Set(p.updated_at.into()),
    }
}

fn result_active_model(post_id: Uuid, r: &PlatformPublishResult) -> post_result::ActiveModel {
    post_result::ActiveModel {
        id: Set(Uuid::new_v4()),
        post_id: Set(post_id),
        platform: Set(r.platform.to_string()),
        success: Set(r.success),
        platform_post_id: Set(r.platform_post_id.clone()),
        error: Set(r.error.clone()),
        attempted_at: Set(r.attempted_at.into()),
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let Some(model) = post::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_err)?
        else {
            return Ok(None);
        };

        let results = model
            .find_related(post_result::Entity)
            .order_by_asc(post_result::Column::AttemptedAt)
            .all(&self.db)
            .await
            .map_err(query_err)?;

        to_domain(model, results).map(Some)
    }

    async fn list_by_workspace(
        &self,
        workspace_id: Uuid,
        status: Option<PostStatus>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, RepoError> {
        let mut query = post::Entity::find().filter(post::Column::WorkspaceId.eq(workspace_id));
        if let Some(status) = status {
            query = query.filter(post::Column::Status.eq(status.to_string()));
        }

        let models = query
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await
            .map_err(query_err)?;

        let related = models
            .load_many(post_result::Entity, &self.db)
            .await
            .map_err(query_err)?;

        models
            .into_iter()
            .zip(related)
            .map(|(model, results)| to_domain(model, results))
            .collect()
    }

    async fn save(&self, saved: Post) -> Result<Post, RepoError> {
        let txn = self.db.begin().await.map_err(query_err)?;

        post::Entity::insert(post_active_model(&saved))
            .on_conflict(
                OnConflict::column(post::Column::Id)
                    .update_columns([
                        post::Column::Content,
                        post::Column::Platforms,
                        post::Column::MediaUrl,
                        post::Column::Status,
                        post::Column::ScheduledAt,
                        post::Column::PublishedAt,
                        post::Column::FailedAt,
                        post::Column::Error,
                        post::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await
            .map_err(query_err)?;

        // Results are append-only in the domain; replacing the rows keeps
        // the write idempotent without tracking which entries are new.
        post_result::Entity::delete_many()
            .filter(post_result::Column::PostId.eq(saved.id))
            .exec(&txn)
            .await
            .map_err(query_err)?;
        if !saved.results.is_empty() {
            post_result::Entity::insert_many(
                saved
                    .results
                    .iter()
                    .map(|r| result_active_model(saved.id, r)),
            )
            .exec(&txn)
            .await
            .map_err(query_err)?;
        }

        txn.commit().await.map_err(query_err)?;
        Ok(saved)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = post::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(query_err)?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: PostStatus,
        next: PostStatus,
    ) -> Result<Post, RepoError> {
        // Conditional UPDATE keyed on the expected status - the atomic CAS
        // that serializes user edits against worker completions.
        let result = post::Entity::update_many()
            .col_expr(post::Column::Status, Expr::value(next.to_string()))
            .col_expr(
                post::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::Status.eq(expected.to_string()))
            .exec(&self.db)
            .await
            .map_err(query_err)?;

        if result.rows_affected == 0 {
            return match post::Entity::find_by_id(id)
                .one(&self.db)
                .await
                .map_err(query_err)?
            {
                None => Err(RepoError::NotFound),
                Some(model) => Err(RepoError::Conflict(format!(
                    "status is {}, expected {expected}",
                    model.status
                ))),
            };
        }

        self.find_by_id(id).await?.ok_or(RepoError::NotFound)
    }
}
