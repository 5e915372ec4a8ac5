//! gRPC 错误处理
//!
//! `FlareError` 与 `tonic::Status` 之间的转换。Status 的 message 携带错误的 JSON
//! 传输格式，对端可以用 [`from_status`] 还原出结构化错误。

use super::{ErrorCategory, ErrorCode, FlareError, scope};
use tonic::{Code, Status};

fn status_code(err: &FlareError) -> Code {
    match err.error_code() {
        Some(ErrorCode::Cancelled) => Code::Cancelled,
        Some(ErrorCode::Timeout) => Code::DeadlineExceeded,
        Some(ErrorCode::NoBackendAvailable) | Some(ErrorCode::DialFailed) => Code::Unavailable,
        Some(ErrorCode::DuplicateEndpoint) => Code::AlreadyExists,
        Some(code) => match code.category() {
            ErrorCategory::Configuration => Code::FailedPrecondition,
            ErrorCategory::Registration | ErrorCategory::Balance => Code::Unavailable,
            ErrorCategory::Lifecycle | ErrorCategory::General => Code::Internal,
        },
        None => Code::Unknown,
    }
}

impl From<FlareError> for Status {
    fn from(err: FlareError) -> Self {
        Status::new(status_code(&err), err.to_json())
    }
}

/// 从 `tonic::Status` 还原错误
///
/// message 是结构化错误的传输格式时原样还原，否则按状态码构建新的错误。
pub fn from_status(status: &Status) -> FlareError {
    if let Some(err) = FlareError::from_json(status.message().as_bytes()) {
        return err;
    }
    let code = match status.code() {
        Code::Cancelled => ErrorCode::Cancelled,
        Code::DeadlineExceeded => ErrorCode::Timeout,
        Code::Unavailable => ErrorCode::NoBackendAvailable,
        Code::Internal => ErrorCode::Internal,
        _ => ErrorCode::Unknown,
    };
    FlareError::new(code, scope::GRPC, status.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_carries_structured_error() {
        let err = FlareError::new(ErrorCode::DialFailed, "dialer", "connection refused");
        let status: Status = err.clone().into();
        assert_eq!(status.code(), Code::Unavailable);
        assert_eq!(from_status(&status), err);
    }

    #[test]
    fn plain_status_maps_by_code() {
        let status = Status::deadline_exceeded("too slow");
        let err = from_status(&status);
        assert!(err.is(ErrorCode::Timeout));
        assert_eq!(err.message(), "too slow");
    }
}
