use crate::auth::token::Identity;
use crate::error::app_error::AppError;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::time::Instant;

pub type PgTransaction = sqlx::Transaction<'static, Postgres>;
pub type PgScope = RequestScope<PgTransaction>;

/// Point in time after which a request's remaining I/O is abandoned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(duration: Duration) -> Self {
        Self(Some(Instant::now() + duration))
    }

    /// Runs `fut` to completion or until the deadline, whichever comes first.
    /// On expiry the future is dropped, which rolls back any transaction it owned.
    pub async fn bound<T, F>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| AppError::RequestTimeout)?,
            None => fut.await,
        }
    }
}

/// Per-request state threaded through services and repositories.
///
/// Holds at most one open transaction. Dropping a scope that still owns a
/// transaction rolls it back, so an abandoned request never commits.
#[derive(Debug)]
pub struct RequestScope<T> {
    identity: Option<Identity>,
    transaction: Option<T>,
    rollback_only: bool,
    deadline: Deadline,
}

impl<T> RequestScope<T> {
    pub fn new(identity: Option<Identity>, deadline: Deadline) -> Self {
        Self {
            identity,
            transaction: None,
            rollback_only: false,
            deadline,
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    pub(crate) fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub(crate) fn attach(&mut self, transaction: T) {
        self.transaction = Some(transaction);
        self.rollback_only = false;
    }

    pub(crate) fn detach(&mut self) -> Option<T> {
        self.transaction.take()
    }

    pub fn transaction_mut(&mut self) -> Option<&mut T> {
        self.transaction.as_mut()
    }
}

impl PgScope {
    /// The scope's open transaction, or a fresh pooled connection outside one.
    pub async fn connection<'a>(&'a mut self, pool: &PgPool) -> Result<ScopedConnection<'a>, AppError> {
        let deadline = self.deadline;
        match self.transaction.as_mut() {
            Some(tx) => Ok(ScopedConnection::Transaction(&mut **tx)),
            None => {
                let conn = deadline.bound(async { pool.acquire().await.map_err(AppError::from) }).await?;
                Ok(ScopedConnection::Pooled(conn))
            }
        }
    }
}

pub enum ScopedConnection<'a> {
    Transaction(&'a mut PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl Deref for ScopedConnection<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            ScopedConnection::Transaction(conn) => conn,
            ScopedConnection::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for ScopedConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            ScopedConnection::Transaction(conn) => conn,
            ScopedConnection::Pooled(conn) => conn,
        }
    }
}
