use crate::error::{ProvisioningError, Result};
use std::fmt;

/// Outcome of a subject-level operation.
///
/// Failures are reported here instead of being raised past the service.
#[must_use]
#[derive(Debug)]
pub enum OperationResult {
    Ok,
    Error(ProvisioningError),
}

impl OperationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, OperationResult::Ok)
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    pub fn is_fatal(&self) -> bool {
        self.error().is_some_and(ProvisioningError::is_fatal)
    }

    pub fn error(&self) -> Option<&ProvisioningError> {
        match self {
            OperationResult::Ok => None,
            OperationResult::Error(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            OperationResult::Ok => Ok(()),
            OperationResult::Error(err) => Err(err),
        }
    }
}

impl<E: Into<ProvisioningError>> From<std::result::Result<(), E>> for OperationResult {
    fn from(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => OperationResult::Ok,
            Err(err) => OperationResult::Error(err.into()),
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationResult::Ok => write!(f, "ok"),
            OperationResult::Error(err) => write!(f, "{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::BackendError;

    #[test]
    fn test_from_result() {
        let ok: OperationResult = Ok::<(), ProvisioningError>(()).into();
        assert!(ok.is_ok());
        assert!(ok.error().is_none());

        let failed: OperationResult = Err::<(), _>(BackendError::Connection("down".into())).into();
        assert!(failed.is_error());
        assert!(!failed.is_fatal());
        assert_eq!(failed.to_string(), "Backend error: Connection error: down");
        assert!(matches!(
            failed.into_result(),
            Err(ProvisioningError::Backend(_))
        ));
    }
}
