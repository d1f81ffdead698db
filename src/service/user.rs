use crate::auth::password::CredentialHasher;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::scope::PgScope;
use crate::database::unit_of_work::UnitOfWork;
use crate::database::user::UserRepository;
use crate::error::app_error::AppError;
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::user::{CreateUserRequest, NewUser, UpdateUserRequest, User, UserFilter, UserResponse};
use futures_util::FutureExt;
use sqlx::PgPool;
use tracing::info;

pub struct UserService<'a> {
    repo: &'a PostgresRepository,
    uow: &'a UnitOfWork<PgPool>,
    hasher: &'a dyn CredentialHasher,
}

impl<'a> UserService<'a> {
    pub fn new(repo: &'a PostgresRepository, uow: &'a UnitOfWork<PgPool>, hasher: &'a dyn CredentialHasher) -> Self {
        Self { repo, uow, hasher }
    }

    pub async fn list(&self, scope: &mut PgScope, filter: &UserFilter, pagination: &PaginationParams) -> Result<PaginatedResponse<UserResponse>, AppError> {
        let (users, total) = self.repo.find_users(scope, filter, pagination).await?;
        let data = users.iter().map(UserResponse::from).collect();
        Ok(PaginatedResponse::new(data, pagination.page(), pagination.page_size(), total))
    }

    pub async fn get(&self, scope: &mut PgScope, id: i64) -> Result<UserResponse, AppError> {
        self.repo
            .find_user_by_id(scope, id)
            .await?
            .map(|user| UserResponse::from(&user))
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn create(&self, scope: &mut PgScope, request: &CreateUserRequest) -> Result<UserResponse, AppError> {
        let new_user = NewUser {
            username: request.username.trim().to_string(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            password_hash: self.hasher.hash_password(&request.password)?,
            role_id: request.role_id,
            is_active: request.is_active,
            created_by: scope.identity().map(|identity| identity.id),
        };

        let repo = self.repo.clone();
        let created = self
            .uow
            .with_transaction(scope, move |scope| {
                async move {
                    if repo.find_user_by_username_or_email(scope, &new_user.username, &new_user.email).await?.is_some() {
                        return Err(AppError::UserAlreadyExists(new_user.username.clone()));
                    }
                    repo.create_user(scope, &new_user).await
                }
                .boxed()
            })
            .await?;

        info!(user_id = created.id, "user created");
        Ok(UserResponse::from(&created))
    }

    pub async fn update(&self, scope: &mut PgScope, id: i64, request: &UpdateUserRequest) -> Result<UserResponse, AppError> {
        let password_hash = match request.password.as_deref() {
            Some(password) => Some(self.hasher.hash_password(password)?),
            None => None,
        };
        let modified_by = scope.identity().map(|identity| identity.id);
        let request = request.clone();

        let repo = self.repo.clone();
        let updated = self
            .uow
            .with_transaction(scope, move |scope| {
                async move {
                    let mut user = repo
                        .find_user_by_id(scope, id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

                    apply_update(&mut user, &request, password_hash, modified_by);

                    if let Some(existing) = repo.find_user_by_username_or_email(scope, &user.username, &user.email).await?
                        && existing.id != user.id
                    {
                        return Err(AppError::UserAlreadyExists(user.username.clone()));
                    }

                    repo.update_user(scope, &user).await
                }
                .boxed()
            })
            .await?;

        info!(user_id = updated.id, "user updated");
        Ok(UserResponse::from(&updated))
    }

    pub async fn delete(&self, scope: &mut PgScope, id: i64) -> Result<(), AppError> {
        let repo = self.repo.clone();
        self.uow
            .with_transaction(scope, move |scope| {
                async move {
                    if repo.delete_user(scope, id).await? {
                        Ok(())
                    } else {
                        Err(AppError::NotFound("User not found".to_string()))
                    }
                }
                .boxed()
            })
            .await?;

        info!(user_id = id, "user deleted");
        Ok(())
    }
}

fn apply_update(user: &mut User, request: &UpdateUserRequest, password_hash: Option<String>, modified_by: Option<i64>) {
    if let Some(username) = &request.username {
        user.username = username.trim().to_string();
    }
    if let Some(name) = &request.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = &request.email {
        user.email = email.trim().to_lowercase();
    }
    if let Some(role_id) = request.role_id {
        user.role_id = role_id;
    }
    if let Some(is_active) = request.is_active {
        user.is_active = is_active;
    }
    if let Some(hash) = password_hash {
        user.password_hash = hash;
    }
    user.modified_by = modified_by;
}
