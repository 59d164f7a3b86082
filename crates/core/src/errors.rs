use thiserror::Error;

use crate::pricing::PriceRejection;
use crate::settings::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Price(#[from] PriceRejection),
    #[error("invalid value for `{field}`: {message}")]
    InvalidSetting { field: &'static str, message: String },
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to hand back to a browser.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::Internal { .. } => "Internal error",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Price(rejection) => Self::BadRequest {
                message: rejection.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::InvalidSetting { field, message } => Self::BadRequest {
                message: format!("{field}: {message}"),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Malformed(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Store(error) => Self::Internal {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::errors::{ApplicationError, InterfaceError};
    use crate::pricing::PriceRejection;
    use crate::settings::StoreError;

    #[test]
    fn price_rejection_maps_to_bad_request_with_reason() {
        let interface = ApplicationError::from(PriceRejection::BelowMinimum {
            proposed: Decimal::new(300, 2),
            minimum: Decimal::new(500, 2),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "The price must be at least 5.00.");
    }

    #[test]
    fn store_failure_maps_to_internal_without_leaking_detail() {
        let interface = ApplicationError::from(StoreError::Unavailable("db lock".to_owned()))
            .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "Internal error");
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn invalid_setting_names_the_field() {
        let interface = ApplicationError::InvalidSetting {
            field: "min_amount",
            message: "must not be negative".to_owned(),
        }
        .into_interface("req-3");

        assert_eq!(interface.user_message(), "min_amount: must not be negative");
    }
}
