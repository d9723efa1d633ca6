//! Post handlers - create, edit, schedule, publish and inspect posts.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crosspost_core::domain::{Platform, Post, PostStatus};
use crosspost_core::scheduler::{NewPost, PostPatch};
use crosspost_shared::ApiResponse;
use crosspost_shared::dto::{
    CreatePostRequest, JobAccepted, ListPostsQuery, PlatformResultResponse, PostResponse,
    PostStatusResponse, SchedulePostRequest, UpdatePostRequest,
};

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::workspace::WorkspaceContext;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// GET /api/posts
pub async fn list_posts(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    query: web::Query<ListPostsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PostStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let posts = state
        .scheduler
        .list_posts(workspace.id, status, limit, offset)
        .await?;
    let responses: Vec<PostResponse> = posts.iter().map(to_response).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(responses)))
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let platforms = parse_platforms(&req.platforms)?;

    let post = state
        .scheduler
        .create_post(NewPost {
            workspace_id: workspace.id,
            author_id: workspace.author_id,
            content: req.content,
            platforms,
            media_url: req.media_url,
            scheduled_at: req.scheduled_at,
        })
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(to_response(&post))))
}

/// GET /api/posts/{id}
pub async fn get_post(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_owned(&state, &workspace, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(to_response(&post))))
}

/// PATCH /api/posts/{id}
pub async fn update_post(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_owned(&state, &workspace, id).await?;

    let req = body.into_inner();
    let post = state
        .scheduler
        .update_post(
            id,
            PostPatch {
                content: req.content,
                media_url: req.media_url,
                scheduled_at: req.scheduled_at,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(to_response(&post))))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_owned(&state, &workspace, id).await?;

    state.scheduler.delete_post(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/posts/{id}/publish
pub async fn publish_now(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_owned(&state, &workspace, id).await?;

    let job_id = state.scheduler.publish_now(id).await?;
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(JobAccepted {
        job_id: job_id.to_string(),
    })))
}

/// POST /api/posts/{id}/schedule
pub async fn schedule_post(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
    body: web::Json<SchedulePostRequest>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_owned(&state, &workspace, id).await?;

    let job_id = state
        .scheduler
        .schedule(id, body.into_inner().scheduled_at)
        .await?;
    Ok(HttpResponse::Accepted().json(ApiResponse::ok(JobAccepted {
        job_id: job_id.to_string(),
    })))
}

/// DELETE /api/posts/{id}/schedule
pub async fn cancel_schedule(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    load_owned(&state, &workspace, id).await?;

    let post = state.scheduler.cancel_schedule(id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        to_response(&post),
        "Schedule cancelled",
    )))
}

/// GET /api/posts/{id}/status
pub async fn post_status(
    state: web::Data<AppState>,
    workspace: WorkspaceContext,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let post = load_owned(&state, &workspace, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(PostStatusResponse {
        id: post.id.to_string(),
        status: post.status.to_string(),
        results: post.results.iter().map(result_to_response).collect(),
    })))
}

/// Load a post and hide it from other workspaces.
async fn load_owned(
    state: &AppState,
    workspace: &WorkspaceContext,
    id: Uuid,
) -> AppResult<Post> {
    let post = state.scheduler.get_post(id).await?;
    if post.workspace_id != workspace.id {
        return Err(AppError::NotFound(format!("Post {} not found", id)));
    }
    Ok(post)
}

fn parse_platforms(names: &[String]) -> AppResult<Vec<Platform>> {
    names
        .iter()
        .map(|name| name.parse::<Platform>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::BadRequest)
}

fn to_response(post: &Post) -> PostResponse {
    PostResponse {
        id: post.id.to_string(),
        workspace_id: post.workspace_id.to_string(),
        author_id: post.author_id.to_string(),
        content: post.content.clone(),
        platforms: post.platforms.iter().map(ToString::to_string).collect(),
        media_url: post.media_url.clone(),
        status: post.status.to_string(),
        scheduled_at: post.scheduled_at,
        published_at: post.published_at,
        failed_at: post.failed_at,
        error: post.error.clone(),
        results: post.results.iter().map(result_to_response).collect(),
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

fn result_to_response(
    result: &crosspost_core::domain::PlatformPublishResult,
) -> PlatformResultResponse {
    PlatformResultResponse {
        platform: result.platform.to_string(),
        success: result.success,
        platform_post_id: result.platform_post_id.clone(),
        error: result.error.clone(),
        attempted_at: result.attempted_at,
    }
}
