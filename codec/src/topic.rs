// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Maximum number of hierarchy levels accepted in a topic name or filter.
pub const TOPIC_LEVEL_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    EmptyTopic,

    /// Longer than 65535 bytes.
    TooManyData,

    /// More than [`TOPIC_LEVEL_LIMIT`] hierarchy levels.
    TooManyLevels,

    /// Wildcard characters placed in violation of MQTT chapter 4.7.
    InvalidWildcard,

    /// Wildcard character appears in a topic name.
    ContainsWildcard,
}

fn check_common(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::EmptyTopic);
    }
    if topic.len() > u16::MAX as usize {
        return Err(TopicError::TooManyData);
    }
    if topic.split('/').count() > TOPIC_LEVEL_LIMIT {
        return Err(TopicError::TooManyLevels);
    }
    Ok(())
}

/// Check topic name used in PUBLISH packets and will messages.
///
/// Wildcards are forbidden anywhere in a topic name [MQTT-3.3.2-2].
///
/// # Errors
///
/// Returns error if `topic` is empty, too long, too deep or contains
/// `+` or `#`.
pub fn validate_pub_topic(topic: &str) -> Result<(), TopicError> {
    check_common(topic)?;

    if topic.bytes().any(|b| b == b'+' || b == b'#') {
        return Err(TopicError::ContainsWildcard);
    }
    Ok(())
}

/// Check topic filter used in SUBSCRIBE/UNSUBSCRIBE packets.
///
/// `+` must occupy an entire level and `#` must be the last character of the
/// filter, occupying an entire level [MQTT-4.7.1-2], [MQTT-4.7.1-3].
///
/// # Errors
///
/// Returns error if `filter` is empty, too long, too deep or places a
/// wildcard character inside a level.
pub fn validate_sub_topic(filter: &str) -> Result<(), TopicError> {
    check_common(filter)?;

    let bytes = filter.as_bytes();
    for (index, b) in bytes.iter().enumerate() {
        match b {
            b'#' => {
                if index != bytes.len() - 1 {
                    return Err(TopicError::InvalidWildcard);
                }
                if index > 0 && bytes[index - 1] != b'/' {
                    return Err(TopicError::InvalidWildcard);
                }
            }
            b'+' => {
                if index > 0 && bytes[index - 1] != b'/' {
                    return Err(TopicError::InvalidWildcard);
                }
                if index + 1 < bytes.len() && bytes[index + 1] != b'/' {
                    return Err(TopicError::InvalidWildcard);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// One level of a parsed topic filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum FilterPart {
    /// Empty level, as in `a//b`.
    #[default]
    Empty,

    /// Literal level text.
    Normal(String),

    /// `+`, matches exactly one level.
    SingleWildcard,

    /// `#`, matches any number of trailing levels including none.
    MultiWildcard,
}

impl FilterPart {
    fn parse(s: &str) -> Self {
        match s {
            "" => Self::Empty,
            "+" => Self::SingleWildcard,
            "#" => Self::MultiWildcard,
            _ => Self::Normal(s.to_string()),
        }
    }
}

/// A validated topic filter with wildcard matching.
#[derive(Debug, Clone, Default, Eq, PartialOrd, Ord, Hash)]
pub struct TopicFilter {
    filter: String,
    parts: Vec<FilterPart>,
}

impl PartialEq for TopicFilter {
    fn eq(&self, other: &Self) -> bool {
        self.filter.eq(&other.filter)
    }
}

impl TopicFilter {
    /// Parse and validate a topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if `filter` violates the subscription filter rules.
    pub fn parse(filter: &str) -> Result<Self, TopicError> {
        validate_sub_topic(filter)?;
        let parts = filter.split('/').map(FilterPart::parse).collect();
        Ok(Self {
            filter: filter.to_string(),
            parts,
        })
    }

    /// Get the filter string.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Check whether `topic` matches this filter.
    ///
    /// `+` matches exactly one level, `#` matches any number of trailing
    /// levels. Topics starting with `$` are never matched by a filter whose
    /// first level is a wildcard [MQTT-4.7.2-1].
    #[must_use]
    pub fn is_match(&self, topic: &str) -> bool {
        if topic.starts_with('$')
            && matches!(
                self.parts.first(),
                Some(FilterPart::SingleWildcard | FilterPart::MultiWildcard)
            )
        {
            return false;
        }

        let mut parts = self.parts.iter();
        let mut levels = topic.split('/');

        loop {
            match (parts.next(), levels.next()) {
                (Some(FilterPart::MultiWildcard), _) => return true,
                (Some(FilterPart::SingleWildcard), Some(_)) => {}
                (Some(FilterPart::Normal(p)), Some(level)) => {
                    if p != level {
                        return false;
                    }
                }
                (Some(FilterPart::Empty), Some(level)) => {
                    if !level.is_empty() {
                        return false;
                    }
                }
                // `a/#` also matches the parent level `a` [MQTT-4.7.1-2].
                (Some(FilterPart::MultiWildcard), None) => return true,
                (Some(_), None) | (None, Some(_)) => return false,
                (None, None) => return true,
            }
        }
    }
}

/// Topic name carried in PUBLISH packets and will messages.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubTopic(String);

impl PubTopic {
    /// Validate and wrap a topic name.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is not a valid topic name.
    pub fn new(topic: &str) -> Result<Self, TopicError> {
        validate_pub_topic(topic)?;
        Ok(Self(topic.to_string()))
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for PubTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl DecodePacket for PubTopic {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let s = ba.read_string(len as usize)?;
        validate_pub_topic(&s)?;
        Ok(Self(s))
    }
}

impl EncodePacket for PubTopic {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(self.0.as_bytes())?;
        Ok(self.bytes())
    }
}

/// Topic filter carried in SUBSCRIBE/UNSUBSCRIBE packets.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubTopic(String);

impl SubTopic {
    /// Validate and wrap a topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if `filter` is not a valid topic filter.
    pub fn new(filter: &str) -> Result<Self, TopicError> {
        validate_sub_topic(filter)?;
        Ok(Self(filter.to_string()))
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for SubTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl DecodePacket for SubTopic {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let s = ba.read_string(len as usize)?;
        validate_sub_topic(&s)?;
        Ok(Self(s))
    }
}

impl EncodePacket for SubTopic {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(self.0.as_bytes())?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pub_topic() {
        assert!(validate_pub_topic("sport/tennis/player1").is_ok());
        assert!(validate_pub_topic("/").is_ok());
        assert_eq!(validate_pub_topic(""), Err(TopicError::EmptyTopic));
        assert_eq!(
            validate_pub_topic("sport/#"),
            Err(TopicError::ContainsWildcard)
        );
        assert_eq!(
            validate_pub_topic("sport/+/x"),
            Err(TopicError::ContainsWildcard)
        );

        let deep = vec!["x"; TOPIC_LEVEL_LIMIT + 1].join("/");
        assert_eq!(validate_pub_topic(&deep), Err(TopicError::TooManyLevels));
    }

    #[test]
    fn test_validate_sub_topic() {
        assert!(validate_sub_topic("#").is_ok());
        assert!(validate_sub_topic("+").is_ok());
        assert!(validate_sub_topic("sport/tennis/player/#").is_ok());
        assert!(validate_sub_topic("sport/+/player/ranking").is_ok());

        assert_eq!(
            validate_sub_topic("sport/tennis#"),
            Err(TopicError::InvalidWildcard)
        );
        assert_eq!(
            validate_sub_topic("sport/#/ranking"),
            Err(TopicError::InvalidWildcard)
        );
        assert_eq!(
            validate_sub_topic("sport+"),
            Err(TopicError::InvalidWildcard)
        );
        assert_eq!(
            validate_sub_topic("+sport"),
            Err(TopicError::InvalidWildcard)
        );
    }

    #[test]
    fn test_filter_match() {
        let f = TopicFilter::parse("sport/tennis/+").unwrap();
        assert!(f.is_match("sport/tennis/player1"));
        assert!(!f.is_match("sport/tennis/player1/ranking"));
        assert!(!f.is_match("sport/tennis"));

        let f = TopicFilter::parse("sport/#").unwrap();
        assert!(f.is_match("sport"));
        assert!(f.is_match("sport/tennis/player1"));
        assert!(!f.is_match("hockey/player1"));

        let f = TopicFilter::parse("#").unwrap();
        assert!(f.is_match("a/b/c"));

        let f = TopicFilter::parse("+/+").unwrap();
        assert!(f.is_match("/finance"));
        assert!(!f.is_match("finance"));
    }

    #[test]
    fn test_filter_match_dollar_topics() {
        let f = TopicFilter::parse("#").unwrap();
        assert!(!f.is_match("$SYS/uptime"));

        let f = TopicFilter::parse("+/monitor/Clients").unwrap();
        assert!(!f.is_match("$SYS/monitor/Clients"));

        let f = TopicFilter::parse("$SYS/#").unwrap();
        assert!(f.is_match("$SYS/uptime"));
    }
}
