/// What a worker does with a batch whose encoding failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and drop the batch. Its records stay pending until the next resume.
    #[default]
    LogAndDrop,

    /// Re-run the batch on the same worker, up to `max_attempts` attempts in total
    Retry { max_attempts: u32 },
}

impl FailurePolicy {
    /// `retries` extra attempts after the first one
    pub fn from_retries(retries: u32) -> Self {
        if retries == 0 {
            Self::LogAndDrop
        } else {
            Self::Retry {
                max_attempts: retries.saturating_add(1),
            }
        }
    }

    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::LogAndDrop => 1,
            Self::Retry { max_attempts } => (*max_attempts).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_attempt() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::LogAndDrop);
        assert_eq!(FailurePolicy::default().max_attempts(), 1);
    }

    #[test]
    fn test_from_retries() {
        assert_eq!(FailurePolicy::from_retries(0), FailurePolicy::LogAndDrop);
        assert_eq!(FailurePolicy::from_retries(2).max_attempts(), 3);
        assert_eq!(FailurePolicy::Retry { max_attempts: 0 }.max_attempts(), 1);
    }
}
