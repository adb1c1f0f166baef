use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::AnyError;

/// Boxed future returned by a job action
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), AnyError>> + Send + 'static>>;

/// Shared async action; the token is cancelled when the scheduler stops
pub type JobFn = Arc<dyn Fn(CancellationToken) -> JobFuture + Send + Sync>;

/// Adapt an async closure into a [`JobFn`]
pub fn job_fn<F, Fut>(f: F) -> JobFn
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AnyError>> + Send + 'static,
{
    Arc::new(move |token| -> JobFuture { Box::pin(f(token)) })
}

/// A named recurring task
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub interval: Duration,
    pub action: Option<JobFn>,
}

#[bon::bon]
impl Job {
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        interval: Duration,
        action: Option<JobFn>,
    ) -> Self {
        Self {
            name,
            interval,
            action,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("action", &self.action.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
