use crate::application::post_admin::requested_id;
use crate::application::{
    ActionResult, BlogServices, ListingDataProvider, MassSelection, Message, Session,
    COMMENTS_RESOURCE, POSTS_RESOURCE,
};
use crate::data::Collection;
use crate::domain::coerce::coerce_id;
use crate::domain::{comment, post, Comment, DomainError, Post, Row, SearchCriteria};
use crate::infrastructure::jwt::AdminIdentity;
use actix_web::http::header;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

type Params = HashMap<String, String>;

const POST_GRID_FILTERS: &[&str] = &["title", "author", "content", "is_active"];
const COMMENT_GRID_FILTERS: &[&str] = &["post_id", "author", "is_active"];

// Страница админки: заголовок, накопленные сообщения и данные
#[derive(Serialize)]
struct PageResponse<T: Serialize> {
    title: &'static str,
    messages: Vec<Message>,
    data: T,
}

// Проверка токена и ресурса доступа
fn authorize(req: &HttpRequest, resource: &str) -> Result<AdminIdentity, DomainError> {
    let identity = req
        .extensions()
        .get::<AdminIdentity>()
        .cloned()
        .ok_or(DomainError::Unauthorized(
            "Admin not authenticated".to_string(),
        ))?;

    if !identity.is_allowed(resource) {
        tracing::warn!("Admin {} lacks resource {}", identity.username, resource);
        return Err(DomainError::Forbidden);
    }
    Ok(identity)
}

fn admin_session(
    req: &HttpRequest,
    services: &BlogServices,
    resource: &str,
) -> Result<Session, DomainError> {
    let identity = authorize(req, resource)?;
    Ok(services.sessions.session(identity.username))
}

// Преобразование DomainError в HttpResponse
fn error_to_response(err: DomainError) -> HttpResponse {
    let status_code = err.to_status_code();
    let message = err.to_string();

    match status_code {
        400 => HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
        401 => HttpResponse::Unauthorized().json(serde_json::json!({ "error": message })),
        403 => HttpResponse::Forbidden().json(serde_json::json!({ "error": message })),
        404 => HttpResponse::NotFound().json(serde_json::json!({ "error": message })),
        _ => {
            tracing::error!("Request failed: {}", message);
            HttpResponse::InternalServerError()
                .json(serde_json::json!({ "error": "Internal server error" }))
        }
    }
}

fn page<T: Serialize>(title: &'static str, session: &Session, data: T) -> HttpResponse {
    HttpResponse::Ok().json(PageResponse {
        title,
        messages: session.take_messages(),
        data,
    })
}

fn redirect(location: String) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn to_row(params: Params) -> Row {
    params
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

// ============== Admin: Posts ==============

pub async fn post_index(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let mut listing = services.post_admin.listing();
    listing.apply_request(&query, POST_GRID_FILTERS);

    match listing.get_data().await {
        Ok(data) => page("Posts", &session, data),
        Err(err) => error_to_response(err.into()),
    }
}

pub async fn post_new(req: HttpRequest, services: web::Data<BlogServices>) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let mut form = services.post_admin.form(None, &session);
    match form.get_data().await {
        Ok(data) => page("New Post", &session, data),
        Err(err) => error_to_response(err.into()),
    }
}

pub async fn post_edit(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let raw_id = query.get(post::fields::POST_ID).map(String::as_str);
    tracing::info!("Opening post editor for post_id={:?}", raw_id);

    match services.post_admin.edit(raw_id, &session).await {
        Ok(ActionResult::Redirect(location)) => redirect(location),
        Ok(ActionResult::Page { title }) => {
            let post_id = requested_id(raw_id).map(coerce_id);
            let mut form = services.post_admin.form(post_id, &session);
            match form.get_data().await {
                Ok(data) => page(title, &session, data),
                Err(err) => error_to_response(err.into()),
            }
        }
        Err(err) => error_to_response(err),
    }
}

pub async fn post_save(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
    form: web::Form<Params>,
) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let mut data = to_row(form.into_inner());
    if let Some(back) = query.get("back") {
        data.entry("back").or_insert_with(|| Value::String(back.clone()));
    }

    tracing::info!("Saving post form for admin {}", session.id());
    match services.post_admin.save(data, &session).await {
        ActionResult::Redirect(location) => redirect(location),
        ActionResult::Page { title } => page(title, &session, Value::Null),
    }
}

pub async fn post_delete(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let raw_id = query.get(post::fields::POST_ID).map(String::as_str);
    tracing::info!("Deleting post post_id={:?}", raw_id);

    match services.post_admin.delete(raw_id, &session).await {
        ActionResult::Redirect(location) => redirect(location),
        ActionResult::Page { title } => page(title, &session, Value::Null),
    }
}

pub async fn post_mass_delete(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
    form: Option<web::Form<Params>>,
) -> impl Responder {
    let session = match admin_session(&req, &services, POSTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let mut params = query.into_inner();
    if let Some(form) = form {
        params.extend(form.into_inner());
    }
    let selection = MassSelection::from_params(
        params.get("selected").map(String::as_str),
        params.get("excluded").map(String::as_str),
    );

    match services.post_admin.mass_delete(selection, &session).await {
        ActionResult::Redirect(location) => redirect(location),
        ActionResult::Page { title } => page(title, &session, Value::Null),
    }
}

// ============== Admin: Comments ==============

pub async fn comment_index(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    query: web::Query<Params>,
) -> impl Responder {
    let session = match admin_session(&req, &services, COMMENTS_RESOURCE) {
        Ok(session) => session,
        Err(err) => return error_to_response(err),
    };

    let mut listing = ListingDataProvider::<Comment>::new(Collection::new(services.storage.clone()));
    listing.apply_request(&query, COMMENT_GRID_FILTERS);

    match listing.get_data().await {
        Ok(data) => page("Comments", &session, data),
        Err(err) => error_to_response(err.into()),
    }
}

// ============== REST: Posts ==============

pub async fn search_posts(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    criteria: web::Json<SearchCriteria>,
) -> impl Responder {
    if let Err(err) = authorize(&req, POSTS_RESOURCE) {
        return error_to_response(err);
    }

    match services.posts.get_list(&criteria).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_post(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    body: web::Json<Row>,
) -> impl Responder {
    if let Err(err) = authorize(&req, POSTS_RESOURCE) {
        return error_to_response(err);
    }

    let mut data = body.into_inner();
    data.remove(post::fields::POST_ID);

    let post = match Post::from_form(&data) {
        Ok(post) => post,
        Err(err) => return error_to_response(err.into()),
    };

    match services.posts.save(post).await {
        Ok(post) => HttpResponse::Created().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_post(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(err) = authorize(&req, POSTS_RESOURCE) {
        return error_to_response(err);
    }

    let post_id = coerce_id(&path);
    tracing::debug!("Getting post with id={}", post_id);

    match services.posts.get_by_id(post_id).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

async fn apply_post_update(
    services: &BlogServices,
    post_id: i64,
    mut data: Row,
) -> Result<Post, DomainError> {
    let mut post = services.posts.get_by_id(post_id).await?;
    data.remove(post::fields::POST_ID);
    post.apply_form(&data)?;
    services.posts.save(post).await
}

pub async fn update_post(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
    body: web::Json<Row>,
) -> impl Responder {
    if let Err(err) = authorize(&req, POSTS_RESOURCE) {
        return error_to_response(err);
    }

    let post_id = coerce_id(&path);
    tracing::info!("Updating post id={}", post_id);

    match apply_post_update(&services, post_id, body.into_inner()).await {
        Ok(post) => HttpResponse::Ok().json(post),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_post(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(err) = authorize(&req, POSTS_RESOURCE) {
        return error_to_response(err);
    }

    let post_id = coerce_id(&path);
    tracing::info!("Deleting post id={}", post_id);

    match services.posts.delete_by_id(post_id).await {
        Ok(deleted) => HttpResponse::Ok().json(deleted),
        Err(err) => error_to_response(err),
    }
}

pub async fn post_comments(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(err) = authorize(&req, COMMENTS_RESOURCE) {
        return error_to_response(err);
    }

    match services.comments.get_by_post_id(coerce_id(&path)).await {
        Ok(comments) => HttpResponse::Ok().json(comments),
        Err(err) => error_to_response(err),
    }
}

// ============== REST: Comments ==============

pub async fn search_comments(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    criteria: web::Json<SearchCriteria>,
) -> impl Responder {
    if let Err(err) = authorize(&req, COMMENTS_RESOURCE) {
        return error_to_response(err);
    }

    match services.comments.get_list(&criteria).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(err) => error_to_response(err),
    }
}

pub async fn create_comment(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    body: web::Json<Row>,
) -> impl Responder {
    if let Err(err) = authorize(&req, COMMENTS_RESOURCE) {
        return error_to_response(err);
    }

    let mut data = body.into_inner();
    data.remove(comment::fields::COMMENT_ID);

    let comment: Comment = match serde_json::from_value(Value::Object(data)) {
        Ok(comment) => comment,
        Err(err) => return error_to_response(DomainError::ValidationError(err.to_string())),
    };

    match services.comments.save(comment).await {
        Ok(comment) => HttpResponse::Created().json(comment),
        Err(err) => error_to_response(err),
    }
}

pub async fn get_comment(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(err) = authorize(&req, COMMENTS_RESOURCE) {
        return error_to_response(err);
    }

    match services.comments.get_by_id(coerce_id(&path)).await {
        Ok(comment) => HttpResponse::Ok().json(comment),
        Err(err) => error_to_response(err),
    }
}

pub async fn delete_comment(
    req: HttpRequest,
    services: web::Data<BlogServices>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(err) = authorize(&req, COMMENTS_RESOURCE) {
        return error_to_response(err);
    }

    let comment_id = coerce_id(&path);
    tracing::info!("Deleting comment id={}", comment_id);

    match services.comments.delete_by_id(comment_id).await {
        Ok(deleted) => HttpResponse::Ok().json(deleted),
        Err(err) => error_to_response(err),
    }
}
