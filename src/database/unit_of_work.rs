use crate::database::scope::{PgTransaction, RequestScope};
use crate::error::app_error::AppError;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use sqlx::PgPool;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use tracing::{debug, error, warn};

/// Source of transactions for a [`UnitOfWork`].
#[async_trait::async_trait]
pub trait TransactionProvider: Send + Sync {
    type Transaction: Send;

    async fn begin_transaction(&self) -> Result<Self::Transaction, AppError>;
    async fn commit_transaction(&self, transaction: Self::Transaction) -> Result<(), AppError>;
    async fn rollback_transaction(&self, transaction: Self::Transaction) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl TransactionProvider for PgPool {
    type Transaction = PgTransaction;

    async fn begin_transaction(&self) -> Result<PgTransaction, AppError> {
        sqlx::Pool::begin(self).await.map_err(|e| AppError::transaction("Failed to begin transaction", e))
    }

    async fn commit_transaction(&self, transaction: PgTransaction) -> Result<(), AppError> {
        transaction.commit().await.map_err(|e| AppError::transaction("Failed to commit transaction", e))
    }

    async fn rollback_transaction(&self, transaction: PgTransaction) -> Result<(), AppError> {
        transaction.rollback().await.map_err(|e| AppError::transaction("Failed to roll back transaction", e))
    }
}

/// Runs business logic atomically inside a request scope.
///
/// The outermost call owns the transaction and performs exactly one commit or
/// rollback. Nested calls on the same scope reuse the open transaction; a
/// failing nested call poisons the scope so the outer call cannot commit even
/// if it swallows the error.
#[derive(Debug, Clone)]
pub struct UnitOfWork<P> {
    provider: P,
}

impl<P: TransactionProvider> UnitOfWork<P> {
    pub fn new(provider: P) -> Self {
        install_panic_trace_hook();
        Self { provider }
    }

    pub async fn with_transaction<R, F>(&self, scope: &mut RequestScope<P::Transaction>, work: F) -> Result<R, AppError>
    where
        R: Send,
        F: for<'s> FnOnce(&'s mut RequestScope<P::Transaction>) -> BoxFuture<'s, Result<R, AppError>> + Send,
    {
        if scope.in_transaction() {
            let result = work(scope).await;
            if result.is_err() {
                scope.mark_rollback_only();
            }
            return result;
        }

        let transaction = scope.deadline().bound(self.provider.begin_transaction()).await?;
        scope.attach(transaction);
        debug!("transaction started");

        // The closure itself runs inside the caught future so a panic raised
        // before it hands back its future is caught too.
        let outcome = {
            let guarded = async { work(&mut *scope).await };
            AssertUnwindSafe(guarded).catch_unwind().await
        };
        let rollback_only = scope.is_rollback_only();
        let Some(transaction) = scope.detach() else {
            return Err(AppError::transaction_message("Transaction handle was released inside the unit of work"));
        };

        match outcome {
            Err(payload) => {
                let message = format!("panic happened because: {}", panic_message(payload.as_ref()));
                let backtrace = take_panic_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());
                self.rollback(transaction).await;
                error!(fault = %message, backtrace = %backtrace, "unit of work panicked, transaction rolled back");
                Err(AppError::UnrecoverableFault { message, backtrace })
            }
            Ok(Err(e)) => {
                self.rollback(transaction).await;
                Err(e)
            }
            Ok(Ok(_)) if rollback_only => {
                self.rollback(transaction).await;
                Err(AppError::transaction_message("Transaction was marked rollback-only by a nested unit of work"))
            }
            Ok(Ok(value)) => {
                self.provider.commit_transaction(transaction).await?;
                debug!("transaction committed");
                Ok(value)
            }
        }
    }

    async fn rollback(&self, transaction: P::Transaction) {
        match self.provider.rollback_transaction(transaction).await {
            Ok(()) => debug!("transaction rolled back"),
            Err(e) => warn!(error = ?e, "rollback failed, connection will be discarded"),
        }
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_TRACE_HOOK: Once = Once::new();

/// Chains a panic hook that keeps the backtrace of the latest panic on its
/// thread, captured while the panicking frames are still on the stack.
fn install_panic_trace_hook() {
    PANIC_TRACE_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            PANIC_TRACE.with(|trace| *trace.borrow_mut() = Some(Backtrace::force_capture().to_string()));
            previous(info);
        }));
    });
}

/// A panic is caught on the thread that polled the panicking future, so the
/// trace recorded there belongs to it.
fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|trace| trace.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
