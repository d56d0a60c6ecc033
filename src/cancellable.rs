//! # Cancellable Computation Chain
//!
//! A short pipeline of dependent asynchronous steps that can be aborted before it
//! completes. A chain starts from a seed step and is extended with [`Chain::then`];
//! each step receives the previous step's value.
//!
//! ## Cancellation
//!
//! All steps of a chain share one [`CancellationToken`]. The token is checked:
//!
//! - before a step is started, so a cancelled chain never runs another step;
//! - while a step is pending, so cancelling never waits on a step that does not
//!   settle (the pending step future is dropped);
//! - right after a step settles, before its value is handed on.
//!
//! Whichever check observes the token first resolves the chain to
//! [`EngineError::Cancelled`]. Cancelling is idempotent.
//!
//! ## Sharing
//!
//! [`Chain::share`] turns a chain into a [`Cancellable`]: a cloneable handle that any
//! number of callers can await. The steps run once, driven by whichever clone is
//! polled, and every clone resolves to the same outcome.
//!
//! ## Example
//!
//! ```rust
//! use flowweave::Chain;
//!
//! # futures::executor::block_on(async {
//! let chain = Chain::new(|| async { Ok(1) })
//!   .then(|n| async move { Ok(n + 1) })
//!   .then(|n| async move { Ok(n * 2) });
//!
//! assert_eq!(chain.await.unwrap(), 4);
//! # });
//! ```

use crate::error::EngineError;
use futures::future::{BoxFuture, FutureExt, Shared};
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Requests cancellation of a chain.
#[derive(Clone, Debug)]
pub struct CancelHandle {
  token: CancellationToken,
}

impl CancelHandle {
  /// Requests cancellation. Calls after the first have no further effect.
  pub fn cancel(&self) {
    if !self.token.is_cancelled() {
      debug!("cancelling computation chain");
      self.token.cancel();
    }
  }

  /// Returns true once cancellation has been requested.
  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }
}

/// A sequential pipeline of asynchronous steps that can be cancelled.
///
/// Chains are lazy: no step runs until the chain (or its [`Cancellable`]) is polled.
#[must_use = "chains do nothing unless awaited"]
pub struct Chain<T> {
  token: CancellationToken,
  future: BoxFuture<'static, Result<T, EngineError>>,
}

impl<T: Send + 'static> Chain<T> {
  /// Starts a chain whose first step is `seed`.
  pub fn new<F, Fut>(seed: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
  {
    let token = CancellationToken::new();
    let future = settle(token.clone(), seed).boxed();
    Self { token, future }
  }

  /// Appends a step that transforms the previous step's value.
  ///
  /// `step` starts only after the previous step has settled with a value and passed
  /// the cancellation check.
  pub fn then<U, F, Fut>(self, step: F) -> Chain<U>
  where
    U: Send + 'static,
    F: FnOnce(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<U, EngineError>> + Send + 'static,
  {
    let Self { token, future } = self;
    let next = {
      let token = token.clone();
      async move {
        let value = future.await?;
        settle(token, move || step(value)).await
      }
      .boxed()
    };
    Chain {
      token,
      future: next,
    }
  }

  /// Returns a handle that cancels this chain.
  pub fn handle(&self) -> CancelHandle {
    CancelHandle {
      token: self.token.clone(),
    }
  }

  /// Requests cancellation of this chain.
  pub fn cancel(&self) {
    self.handle().cancel();
  }

  /// Converts the chain into a cloneable, shareable [`Cancellable`].
  pub fn share(self) -> Cancellable<T>
  where
    T: Clone + Sync,
  {
    Cancellable {
      token: self.token,
      future: self.future.shared(),
    }
  }
}

impl<T> Future for Chain<T> {
  type Output = Result<T, EngineError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.future.as_mut().poll(cx)
  }
}

/// A shared, cancellable computation.
///
/// Clones refer to the same underlying chain: they observe the same outcome and
/// cancelling any clone cancels all of them.
#[pin_project]
#[must_use = "cancellables do nothing unless awaited"]
pub struct Cancellable<T>
where
  T: Clone,
{
  token: CancellationToken,
  #[pin]
  future: Shared<BoxFuture<'static, Result<T, EngineError>>>,
}

impl<T: Clone> Cancellable<T> {
  /// Requests cancellation. Calls after the first have no further effect.
  pub fn cancel(&self) {
    self.handle().cancel();
  }

  /// Returns true once cancellation has been requested.
  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  /// Returns a handle that cancels this computation.
  pub fn handle(&self) -> CancelHandle {
    CancelHandle {
      token: self.token.clone(),
    }
  }

  /// Returns the outcome if the computation has already settled.
  pub fn peek(&self) -> Option<Result<T, EngineError>> {
    self.future.peek().cloned()
  }
}

impl<T: Clone> Clone for Cancellable<T> {
  fn clone(&self) -> Self {
    Self {
      token: self.token.clone(),
      future: self.future.clone(),
    }
  }
}

impl<T: Clone> Future for Cancellable<T> {
  type Output = Result<T, EngineError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.project().future.poll(cx)
  }
}

/// Runs one step under `token`, committing its value only if the chain is still live.
async fn settle<T, F, Fut>(token: CancellationToken, step: F) -> Result<T, EngineError>
where
  F: FnOnce() -> Fut,
  Fut: Future<Output = Result<T, EngineError>>,
{
  if token.is_cancelled() {
    return Err(EngineError::Cancelled);
  }
  let pending = step();
  let value = tokio::select! {
    biased;
    _ = token.cancelled() => return Err(EngineError::Cancelled),
    value = pending => value?,
  };
  if token.is_cancelled() {
    debug!("computation chain cancelled after a step settled");
    return Err(EngineError::Cancelled);
  }
  Ok(value)
}
