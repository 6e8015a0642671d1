use std::fmt::{Display, Formatter, Result as FormatResult};

use crate::error::HandoffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    RecoverIdentifier,
    SealIdentifier,
    SealFlag,
    StageIdentifier,
    StageCampaign,
    Assemble,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.write_str(match self {
            Step::Validate => "validate",
            Step::RecoverIdentifier => "recover identifier",
            Step::SealIdentifier => "seal identifier",
            Step::SealFlag => "seal flag",
            Step::StageIdentifier => "stage identifier",
            Step::StageCampaign => "stage campaign",
            Step::Assemble => "assemble",
        })
    }
}

/// Result of one handoff step.
///
/// `Recoverable` failures drop the optional piece the step would have produced;
/// `Fatal` ends the request.
#[derive(Debug)]
pub enum StepOutcome<T> {
    Completed(T),
    Skipped,
    Recoverable(HandoffError),
    Fatal(HandoffError),
}

impl<T> StepOutcome<T> {
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StepOutcome::Recoverable(_))
    }

    pub fn map<U, F>(self, f: F) -> StepOutcome<U> where F: FnOnce(T) -> U {
        match self {
            StepOutcome::Completed(value) => StepOutcome::Completed(f(value)),
            StepOutcome::Skipped => StepOutcome::Skipped,
            StepOutcome::Recoverable(err) => StepOutcome::Recoverable(err),
            StepOutcome::Fatal(err) => StepOutcome::Fatal(err),
        }
    }

    /// Logs the outcome and reduces it to what the next step needs.
    pub fn settle(self, step: Step) -> Result<Option<T>, HandoffError> {
        match self {
            StepOutcome::Completed(value) => {
                debug!("Step {} completed", step);
                Ok(Some(value))
            },
            StepOutcome::Skipped => {
                debug!("Step {} skipped", step);
                Ok(None)
            },
            StepOutcome::Recoverable(err) => {
                warn!("Step {} failed, continuing without it: {}", step, err);
                Ok(None)
            },
            StepOutcome::Fatal(err) => {
                error!("Step {} failed: {}", step, err);
                Err(err)
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use crate::ciphers::errors::SealError;
    use crate::staging::StorageError;

    #[test]
    fn settling() {
        assert_eq!(StepOutcome::Completed(1).settle(Step::Assemble).ok(), Some(Some(1)));
        assert_eq!(StepOutcome::<u8>::Skipped.settle(Step::StageCampaign).ok(), Some(None));

        let outcome = StepOutcome::<u8>::Recoverable(StorageError::Timeout.into());
        assert!(outcome.is_recoverable());
        assert_eq!(outcome.settle(Step::StageIdentifier).ok(), Some(None));

        let outcome = StepOutcome::<u8>::Fatal(SealError::Cipher.into());
        assert!(!outcome.is_recoverable());
        assert!(matches!(outcome.settle(Step::SealFlag), Err(HandoffError::Crypto(_))));
    }

    #[test]
    fn mapping() {
        assert!(matches!(StepOutcome::Completed(2).map(|value| value * 2), StepOutcome::Completed(4)));
        assert!(matches!(StepOutcome::<u8>::Skipped.map(|value| value * 2), StepOutcome::Skipped));
    }
}
