use std::fmt::{Debug, Formatter};

use pwm_group_core::error::GroupBuildError;

pub struct BusError {
    pub message: String,
}

impl Debug for BusError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        fmt.write_str(&self.message)
    }
}

impl From<&str> for BusError {
    fn from(s: &str) -> Self {
        Self {
            message: s.to_string(),
        }
    }
}

impl From<String> for BusError {
    fn from(s: String) -> Self {
        Self { message: s }
    }
}

impl From<rppal::i2c::Error> for BusError {
    fn from(err: rppal::i2c::Error) -> Self {
        Self {
            message: format!("RpiI2cBuildError - Cause: {}", err),
        }
    }
}

impl From<BusError> for GroupBuildError {
    fn from(err: BusError) -> Self {
        GroupBuildError::from_string(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_into_build_error() {
        let err: BusError = rppal::i2c::Error::FeatureNotSupported.into();
        assert!(err.message.starts_with("RpiI2cBuildError - Cause: "));
        let build_err: GroupBuildError = BusError::from("no bus").into();
        assert_eq!(build_err.to_messages(), vec!["no bus"]);
    }
}
