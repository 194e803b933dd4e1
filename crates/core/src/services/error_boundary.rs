use std::panic::{self, AssertUnwindSafe};

use log::error;

use crate::errors::CoreError;

/// Outcome of rendering through an [`ErrorBoundary`].
#[derive(Debug, Clone, PartialEq)]
pub enum Boundary<T> {
    Rendered(T),
    /// The subtree failed (now or earlier); show the recovery screen.
    Fallback { message: String },
}

/// Top-level catch for render failures.
///
/// An `Err` or a panic from the render closure trips the boundary. Once
/// tripped it keeps returning the fallback without calling the closure
/// again; only [`reset`](Self::reset), the "reload" action, clears it.
#[derive(Debug, Clone, Default)]
pub struct ErrorBoundary {
    failure: Option<String>,
}

impl ErrorBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_error(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn render<T>(&mut self, render: impl FnOnce() -> Result<T, CoreError>) -> Boundary<T> {
        if let Some(message) = &self.failure {
            return Boundary::Fallback {
                message: message.clone(),
            };
        }

        let message = match panic::catch_unwind(AssertUnwindSafe(render)) {
            Ok(Ok(view)) => return Boundary::Rendered(view),
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        error!("Uncaught render error: {message}");
        self.failure = Some(message.clone());
        Boundary::Fallback { message }
    }

    pub fn reset(&mut self) {
        self.failure = None;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("Render panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("Render panicked: {s}")
    } else {
        "Render panicked".to_string()
    }
}
