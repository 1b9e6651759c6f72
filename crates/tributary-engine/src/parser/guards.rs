//! Parser guards to prevent infinite loops and stack overflow

use std::fmt;

/// Maximum iterations for any parser loop before giving up on the file
const MAX_LOOP_ITERATIONS: usize = 1_000_000;

/// Maximum nesting depth of namespaces and type bodies
pub const MAX_PARSE_DEPTH: usize = 64;

/// A guard tripped; the file is abandoned with an error diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitExceeded {
    pub message: String,
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Guard against loops that stop making progress
///
/// Tracks iterations and the token position seen at the last check. A loop
/// that checks twice at the same position has stalled.
///
/// # Example
///
/// ```ignore
/// let mut guard = LoopGuard::new("member list");
/// while !self.at_end() {
///     guard.check(self.pos)?;
///     // ... parse one member ...
/// }
/// ```
pub struct LoopGuard {
    name: &'static str,
    count: usize,
    max: usize,
    last_position: Option<usize>,
}

impl LoopGuard {
    /// Create a new loop guard with default limit
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self::with_limit(name, MAX_LOOP_ITERATIONS)
    }

    /// Create a loop guard with custom limit
    #[inline]
    pub fn with_limit(name: &'static str, max: usize) -> Self {
        Self {
            name,
            count: 0,
            max,
            last_position: None,
        }
    }

    /// Check progress and iteration count
    #[inline]
    pub fn check(&mut self, position: usize) -> Result<(), LimitExceeded> {
        self.count += 1;
        if self.count > self.max {
            return Err(LimitExceeded {
                message: format!("Loop '{}' exceeded {} iterations", self.name, self.max),
            });
        }
        if self.last_position == Some(position) {
            return Err(LimitExceeded {
                message: format!("Parser made no progress in '{}'", self.name),
            });
        }
        self.last_position = Some(position);
        Ok(())
    }
}

/// Recursion depth of namespace and type bodies
///
/// Callers pair every successful `enter` with a `leave`.
#[derive(Debug, Default)]
pub struct DepthCounter {
    depth: usize,
}

impl DepthCounter {
    #[inline]
    pub fn enter(&mut self, name: &'static str) -> Result<(), LimitExceeded> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(LimitExceeded {
                message: format!(
                    "Maximum nesting depth ({}) exceeded in {}",
                    MAX_PARSE_DEPTH, name
                ),
            });
        }
        self.depth += 1;
        Ok(())
    }

    #[inline]
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_guard_under_limit() {
        let mut guard = LoopGuard::with_limit("test", 10);
        for pos in 0..10 {
            assert!(guard.check(pos).is_ok());
        }
        assert!(guard.check(10).is_err());
    }

    #[test]
    fn test_loop_guard_detects_stall() {
        let mut guard = LoopGuard::new("test");
        assert!(guard.check(3).is_ok());
        let err = guard.check(3).unwrap_err();
        assert!(err.message.contains("no progress"));
    }

    #[test]
    fn test_depth_counter_enter_leave() {
        let mut counter = DepthCounter::default();
        counter.enter("test").unwrap();
        counter.enter("test").unwrap();
        assert_eq!(counter.depth(), 2);
        counter.leave();
        counter.leave();
        counter.leave();
        assert_eq!(counter.depth(), 0);
    }

    #[test]
    fn test_depth_counter_limit() {
        let mut counter = DepthCounter::default();
        for _ in 0..MAX_PARSE_DEPTH {
            counter.enter("test").unwrap();
        }
        assert!(counter.enter("test").is_err());
        assert_eq!(counter.depth(), MAX_PARSE_DEPTH);
    }
}
