//!A mod for the error types
use std::fmt::{self, Debug, Display};

///Error returned while constructing or configuring a group of chips.
pub enum GroupBuildError {
    Message(String),
    Messages(Vec<String>),
}

impl GroupBuildError {
    pub fn from_string(msg: String) -> Self {
        GroupBuildError::Message(msg)
    }
    pub fn from_errs(errs: Vec<GroupBuildError>) -> Self {
        let mut messages = Vec::with_capacity(errs.len());
        for err in errs {
            match err {
                Self::Message(msg) => messages.push(msg),
                Self::Messages(mut msgs) => messages.append(&mut msgs),
            }
        }
        Self::Messages(messages)
    }
    pub fn message(msg: &str) -> Self {
        GroupBuildError::Message(msg.to_string())
    }
    pub fn messages(msgs: &[String]) -> Self {
        GroupBuildError::Messages(msgs.to_vec())
    }

    ///All messages carried by this error, in order.
    pub fn to_messages(&self) -> Vec<&str> {
        match self {
            Self::Message(msg) => vec![msg.as_str()],
            Self::Messages(msgs) => msgs.iter().map(|m| m.as_str()).collect(),
        }
    }
}

impl Debug for GroupBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_fmt(format_args!("GroupBuildError: {}", message)),
            Self::Messages(messages) => f.write_fmt(format_args!(
                "GroupBuildError (multiple): \n{}",
                messages.join("\n")
            )),
        }
    }
}

impl Display for GroupBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_messages().join("; "))
    }
}

impl std::error::Error for GroupBuildError {}

///Error returned by routed and broadcast operations on a `ChannelRouter`.
///
/// `E` is the error type of the underlying chip.
pub enum GroupError<E> {
    ///The global channel index is not below `chip_count * channels_per_chip`.
    ChannelOutOfRange { channel: u16, total: u16 },
    ///The chip id does not name one of the owned chips.
    ChipOutOfRange { chip: usize, count: usize },
    ///The owning chip reported an error.
    Chip { chip: usize, source: E },
}

impl<E> GroupError<E> {
    ///Index of the chip that failed, if the failure came from a chip.
    pub fn chip(&self) -> Option<usize> {
        match self {
            Self::Chip { chip, .. } => Some(*chip),
            _ => None,
        }
    }
}

impl<E: Debug> Debug for GroupError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChannelOutOfRange { channel, total } => f.write_fmt(format_args!(
                "GroupError: channel {} is out of range, group has {} channels",
                channel, total
            )),
            Self::ChipOutOfRange { chip, count } => f.write_fmt(format_args!(
                "GroupError: chip {} is out of range, group has {} chips",
                chip, count
            )),
            Self::Chip { chip, source } => {
                f.write_fmt(format_args!("GroupError: chip {} failed: {:?}", chip, source))
            }
        }
    }
}

impl<E: Debug> Display for GroupError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl<E: Debug> std::error::Error for GroupError<E> {}

impl<E: Debug> From<GroupError<E>> for GroupBuildError {
    fn from(err: GroupError<E>) -> Self {
        GroupBuildError::from_string(format!("{:?}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errs_flattens_messages() {
        let err = GroupBuildError::from_errs(vec![
            GroupBuildError::message("one"),
            GroupBuildError::messages(&["two".to_string(), "three".to_string()]),
        ]);
        assert_eq!(err.to_messages(), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_group_error_reports_chip() {
        let err: GroupError<&str> = GroupError::Chip { chip: 2, source: "nack" };
        assert_eq!(err.chip(), Some(2));
        assert_eq!(format!("{}", err), "GroupError: chip 2 failed: \"nack\"");

        let err: GroupError<&str> = GroupError::ChannelOutOfRange { channel: 48, total: 48 };
        assert_eq!(err.chip(), None);
    }
}
