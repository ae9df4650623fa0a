//! Completion hook for a stream.

use super::{Frame, Pulled, Stream, StreamError};

type Callback = Box<dyn FnOnce() + Send>;

/// Runs a callback once, on the pull where the child reports exhaustion.
///
/// If the wrapper is dropped before its child ends (for example after a
/// stream error removed it from the mixer), the callback runs on drop so
/// nobody waiting on it hangs.
pub struct OnEnd<S> {
    child: S,
    callback: Option<Callback>,
}

impl<S: Stream> OnEnd<S> {
    pub fn new(child: S, callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            child,
            callback: Some(Box::new(callback)),
        }
    }

    /// Whether the callback has already run.
    pub fn fired(&self) -> bool {
        self.callback.is_none()
    }

    fn fire(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl<S: Stream> Stream for OnEnd<S> {
    fn stream(&mut self, buf: &mut [Frame]) -> Result<Pulled, StreamError> {
        let pulled = self.child.stream(buf)?;
        if !pulled.more {
            self.fire();
        }
        Ok(pulled)
    }
}

impl<S> Drop for OnEnd<S> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}
