use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
use uuid::Uuid;

use crosspost_core::domain::{Platform, PostStatus};
use crosspost_core::error::RepoError;
use crosspost_core::ports::PostRepository;

use super::entity::{post, post_result};
use super::postgres_repo::PostgresPostRepository;

fn post_model(id: Uuid, status: &str) -> post::Model {
    let now = Utc::now();
    post::Model {
        id,
        workspace_id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        content: "release notes".to_owned(),
        platforms: serde_json::json!(["facebook", "twitter"]),
        media_url: None,
        status: status.to_owned(),
        scheduled_at: None,
        published_at: None,
        failed_at: None,
        error: None,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

#[tokio::test]
async fn find_by_id_maps_entity_and_results_to_domain() {
    let post_id = Uuid::new_v4();
    let model = post_model(post_id, "published");
    let result_row = post_result::Model {
        id: Uuid::new_v4(),
        post_id,
        platform: "facebook".to_owned(),
        success: true,
        platform_post_id: Some("fb_77".to_owned()),
        error: None,
        attempted_at: Utc::now().into(),
    };

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results(vec![vec![model]])
        .append_query_results(vec![vec![result_row]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let found = repo.find_by_id(post_id).await.unwrap().unwrap();

    assert_eq!(found.id, post_id);
    assert_eq!(found.status, PostStatus::Published);
    assert_eq!(
        found.platforms,
        vec![Platform::Facebook, Platform::Twitter]
    );
    assert_eq!(found.results.len(), 1);
    assert_eq!(found.results[0].platform_post_id.as_deref(), Some("fb_77"));
}

#[tokio::test]
async fn transition_succeeds_when_the_row_matched() {
    let post_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results(vec![vec![post_model(post_id, "publishing")]])
        .append_query_results(vec![Vec::<post_result::Model>::new()])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let updated = repo
        .transition(post_id, PostStatus::Scheduled, PostStatus::Publishing)
        .await
        .unwrap();
    assert_eq!(updated.status, PostStatus::Publishing);
}

#[tokio::test]
async fn transition_conflicts_when_status_moved_underneath() {
    let post_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results(vec![MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .append_query_results(vec![vec![post_model(post_id, "published")]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let result = repo
        .transition(post_id, PostStatus::Publishing, PostStatus::Failed)
        .await;
    assert!(matches!(result, Err(RepoError::Conflict(_))));
}
