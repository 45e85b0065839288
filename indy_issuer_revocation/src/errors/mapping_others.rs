use crate::errors::error::{RevocationError, RevocationErrorKind};

impl From<serde_json::Error> for RevocationError {
    fn from(err: serde_json::Error) -> Self {
        RevocationError::from_msg(
            RevocationErrorKind::InvalidJson,
            format!("Invalid json: {}", err),
        )
    }
}

impl From<url::ParseError> for RevocationError {
    fn from(err: url::ParseError) -> Self {
        RevocationError::from_msg(RevocationErrorKind::InvalidUrl, format!("Invalid url: {}", err))
    }
}

impl From<std::io::Error> for RevocationError {
    fn from(err: std::io::Error) -> Self {
        RevocationError::from_msg(RevocationErrorKind::IOError, format!("IO error: {}", err))
    }
}
