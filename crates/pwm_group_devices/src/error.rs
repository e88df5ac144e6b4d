use pwm_group_core::error::GroupBuildError;

#[derive(Debug)]
pub struct DeviceConfigError {
    pub message: String,
}

impl DeviceConfigError {
    pub fn new(s: String) -> Self {
        Self { message: s }
    }
}

impl From<&str> for DeviceConfigError {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<DeviceConfigError> for GroupBuildError {
    fn from(err: DeviceConfigError) -> Self {
        GroupBuildError::from_string(err.message)
    }
}
