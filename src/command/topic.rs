//! Command topic layout and parsing
//!
//! Command topics look like `<namespace>/<claimant>/<verb>`, e.g.
//! `SIOT/99101608/LED`. Replies go to `<namespace>/<claimant>/response`.

use super::error::TopicError;
use crate::config::{ACTUATOR_NAME, MAX_TOPIC_LEN, TOPIC_NAMESPACE};

pub const DELIMITER: u8 = b'/';
pub const RESPONSE_SEGMENT: &str = "response";
const WILDCARD: &str = "+";

/// Claimant and verb borrowed out of an inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTopic<'a> {
    pub claimant: &'a str,
    pub verb: &'a str,
}

/// Namespace and actuator name that all command and reply topics are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    namespace: String,
    actuator: String,
}

impl Default for TopicLayout {
    fn default() -> Self {
        Self::new(TOPIC_NAMESPACE, ACTUATOR_NAME)
    }
}

impl TopicLayout {
    pub fn new(namespace: impl Into<String>, actuator: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            actuator: actuator.into(),
        }
    }

    pub fn actuator(&self) -> &str {
        &self.actuator
    }

    /// `<namespace>/+/<actuator>`, matching commands from any claimant
    pub fn subscription_filter(&self) -> String {
        format!("{}/{}/{}", self.namespace, WILDCARD, self.actuator)
    }

    /// `<namespace>/<claimant>/response`
    pub fn reply_topic(&self, claimant: &str) -> String {
        format!("{}/{}/{}", self.namespace, claimant, RESPONSE_SEGMENT)
    }

    /// Extracts claimant and verb from a raw topic.
    ///
    /// The topic is treated as a bounded byte slice. Nothing is copied and no
    /// terminator is assumed. Exactly three non-empty segments are accepted and
    /// the first one must equal this layout's namespace.
    pub fn parse<'a>(&self, topic: &'a [u8]) -> Result<CommandTopic<'a>, TopicError> {
        if topic.len() > MAX_TOPIC_LEN {
            return Err(TopicError::TooLong {
                len: topic.len(),
                max: MAX_TOPIC_LEN,
            });
        }
        if topic.is_empty() {
            return Err(TopicError::Malformed { segments: 0 });
        }

        let segments: Vec<&[u8]> = topic.split(|byte| *byte == DELIMITER).collect();
        let [namespace, claimant, verb] = segments.as_slice() else {
            return Err(TopicError::Malformed {
                segments: segments.len(),
            });
        };

        if *namespace != self.namespace.as_bytes() {
            return Err(TopicError::UnexpectedNamespace {
                found: String::from_utf8_lossy(namespace).into_owned(),
            });
        }
        if let Some(index) = segments.iter().position(|segment| segment.is_empty()) {
            return Err(TopicError::EmptySegment { index });
        }

        Ok(CommandTopic {
            claimant: std::str::from_utf8(*claimant).map_err(|_| TopicError::NotUtf8)?,
            verb: std::str::from_utf8(*verb).map_err(|_| TopicError::NotUtf8)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_claimant_and_verb() {
        let layout = TopicLayout::default();
        let parsed = layout.parse(b"SIOT/99101608/LED").unwrap();

        assert_eq!(
            parsed,
            CommandTopic {
                claimant: "99101608",
                verb: "LED"
            }
        );
    }

    #[test]
    fn two_segments_are_malformed() {
        let layout = TopicLayout::default();
        assert_eq!(
            layout.parse(b"SIOT/LED"),
            Err(TopicError::Malformed { segments: 2 })
        );
    }

    #[test]
    fn short_and_empty_topics_are_malformed() {
        let layout = TopicLayout::default();
        assert_eq!(layout.parse(b""), Err(TopicError::Malformed { segments: 0 }));
        assert_eq!(layout.parse(b"SIOT"), Err(TopicError::Malformed { segments: 1 }));
        assert_eq!(
            layout.parse(b"SIOT/99101608/LED/extra"),
            Err(TopicError::Malformed { segments: 4 })
        );
    }

    #[test]
    fn empty_claimant_or_verb_is_rejected() {
        let layout = TopicLayout::default();
        assert_eq!(
            layout.parse(b"SIOT//LED"),
            Err(TopicError::EmptySegment { index: 1 })
        );
        assert_eq!(
            layout.parse(b"SIOT/99101608/"),
            Err(TopicError::EmptySegment { index: 2 })
        );
    }

    #[test]
    fn namespace_must_match() {
        let layout = TopicLayout::default();
        assert_eq!(
            layout.parse(b"siot/99101608/LED"),
            Err(TopicError::UnexpectedNamespace {
                found: "siot".to_string()
            })
        );
    }

    #[test]
    fn oversized_and_non_utf8_topics_are_rejected() {
        let layout = TopicLayout::default();
        let long = format!("SIOT/{}/LED", "9".repeat(MAX_TOPIC_LEN));
        assert!(matches!(
            layout.parse(long.as_bytes()),
            Err(TopicError::TooLong { .. })
        ));
        assert_eq!(layout.parse(b"SIOT/\xff\xfe/LED"), Err(TopicError::NotUtf8));
    }

    #[test]
    fn builds_filter_and_reply_topics() {
        let layout = TopicLayout::default();
        assert_eq!(layout.subscription_filter(), "SIOT/+/LED");
        assert_eq!(layout.reply_topic("12345678"), "SIOT/12345678/response");
    }
}
