use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::domain::ports::ProviderError;

/// Error codes worth retrying.
///
/// `InvalidClientTokenId` and `SignatureDoesNotMatch` show up while a freshly
/// created key is still propagating through IAM.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "ServiceFailure",
    "ServiceUnavailable",
    "InternalFailure",
    "RequestExpired",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
];

pub fn is_transient_code(code: &str) -> bool {
    TRANSIENT_CODES.contains(&code)
}

/// Map an SDK error onto the provider error taxonomy.
pub fn classify<E, R>(operation: &'static str, err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ProviderError::transient(operation, "NetworkFailure", message)
        }
        _ => {
            let code = err.code().unwrap_or("Unknown");
            if is_transient_code(code) {
                ProviderError::transient(operation, code, message)
            } else {
                ProviderError::rejected(operation, code, message)
            }
        }
    }
}
