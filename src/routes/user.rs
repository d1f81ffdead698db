use crate::auth::CurrentUser;
use crate::auth::password::Argon2Hasher;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::scope::{Deadline, PgScope};
use crate::database::unit_of_work::UnitOfWork;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginatedResponse;
use crate::models::user::{CreateUserRequest, UpdateUserRequest, UserListQuery, UserResponse};
use crate::service::user::UserService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put, routes};
use sqlx::PgPool;
use validator::Validate;

/// List users, filtered by any user or audit field, paginated and ordered
#[get("/?<query..>")]
pub async fn list_users(
    repo: &State<PostgresRepository>,
    uow: &State<UnitOfWork<PgPool>>,
    hasher: &State<Argon2Hasher>,
    current_user: CurrentUser,
    deadline: Deadline,
    query: UserListQuery,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let (filter, pagination) = query.into_parts();
    let mut scope = PgScope::new(Some(current_user.identity()), deadline);

    let service = UserService::new(repo.inner(), uow.inner(), hasher.inner());
    let page = deadline.bound(service.list(&mut scope, &filter, &pagination)).await?;
    Ok(Json(page))
}

#[get("/<id>")]
pub async fn get_user(
    repo: &State<PostgresRepository>,
    uow: &State<UnitOfWork<PgPool>>,
    hasher: &State<Argon2Hasher>,
    current_user: CurrentUser,
    deadline: Deadline,
    id: i64,
) -> Result<Json<UserResponse>, AppError> {
    let mut scope = PgScope::new(Some(current_user.identity()), deadline);

    let service = UserService::new(repo.inner(), uow.inner(), hasher.inner());
    let user = deadline.bound(service.get(&mut scope, id)).await?;
    Ok(Json(user))
}

#[post("/", data = "<payload>")]
pub async fn create_user(
    repo: &State<PostgresRepository>,
    uow: &State<UnitOfWork<PgPool>>,
    hasher: &State<Argon2Hasher>,
    current_user: CurrentUser,
    deadline: Deadline,
    payload: Json<CreateUserRequest>,
) -> Result<(Status, Json<UserResponse>), AppError> {
    payload.validate()?;
    let mut scope = PgScope::new(Some(current_user.identity()), deadline);

    let service = UserService::new(repo.inner(), uow.inner(), hasher.inner());
    let user = deadline.bound(service.create(&mut scope, &payload)).await?;
    Ok((Status::Created, Json(user)))
}

#[put("/<id>", data = "<payload>")]
pub async fn put_user(
    repo: &State<PostgresRepository>,
    uow: &State<UnitOfWork<PgPool>>,
    hasher: &State<Argon2Hasher>,
    current_user: CurrentUser,
    deadline: Deadline,
    id: i64,
    payload: Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;
    let mut scope = PgScope::new(Some(current_user.identity()), deadline);

    let service = UserService::new(repo.inner(), uow.inner(), hasher.inner());
    let user = deadline.bound(service.update(&mut scope, id, &payload)).await?;
    Ok(Json(user))
}

#[delete("/<id>")]
pub async fn delete_user(
    repo: &State<PostgresRepository>,
    uow: &State<UnitOfWork<PgPool>>,
    hasher: &State<Argon2Hasher>,
    current_user: CurrentUser,
    deadline: Deadline,
    id: i64,
) -> Result<Status, AppError> {
    let mut scope = PgScope::new(Some(current_user.identity()), deadline);

    let service = UserService::new(repo.inner(), uow.inner(), hasher.inner());
    deadline.bound(service.delete(&mut scope, id)).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list_users, get_user, create_user, put_user, delete_user]
}

#[cfg(test)]
mod tests {
    use crate::{Config, build_rocket};
    use rocket::http::{Header, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::Value;

    #[rocket::async_test]
    #[ignore = "requires database and redis"]
    async fn listing_users_requires_a_bearer_token() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

        let response = client.get("/api/users?page=1").dispatch().await;

        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    #[ignore = "requires database and redis"]
    async fn forged_bearer_token_is_rejected_with_reason() {
        let client = Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance");

        let response = client
            .get("/api/users/1")
            .header(Header::new("Authorization", "Bearer forged.token.value"))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
        let body: Value = serde_json::from_str(&response.into_string().await.expect("body")).expect("json");
        assert_eq!(body["error"], "invalid_access_token");
    }
}
