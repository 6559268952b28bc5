use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, SmgError};

/// Cooperative interruption shared between the exploration framework and the
/// graph algorithms.
///
/// Clones share the same flag. The algorithms call [`InterruptFlag::check`]
/// before visiting each object and abort with [`SmgError::Interrupted`]; no
/// partially built graph ever escapes.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_requested() {
            Err(SmgError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_shared() {
        let flag = InterruptFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.request();
        assert!(flag.is_requested());
        assert_eq!(flag.check(), Err(SmgError::Interrupted));
    }
}
