//! Canned assistant replies.
//!
//! An ordered list of keyword groups; the first group with a keyword that
//! occurs in the lower-cased input wins.

/// Greeting placed at the top of every fresh transcript
pub const WELCOME_MESSAGE: &str = "Hi! I'm the iSpy assistant. Ask me about battery health, \
storage, security or performance, or describe an issue you're seeing with your device.";

pub const BATTERY_RESPONSE: &str = "Battery drain usually comes from background activity. \
Check Settings > Battery for apps with high background usage, turn on Optimized Battery \
Charging, and lower screen brightness. If Maximum Capacity is below 80%, consider a battery \
replacement. You can also run the Battery Health module for a fresh score.";

pub const STORAGE_RESPONSE: &str = "To free up storage, open Settings > General > iPhone \
Storage and review the largest apps. Offload apps you rarely use, clear old message \
attachments, and enable Optimize iPhone Storage for Photos. The Storage Analysis module \
shows how close you are to the limit.";

pub const SECURITY_RESPONSE: &str = "For better security, make sure a passcode and Face ID \
or Touch ID are enabled, keep iOS up to date, and review which apps have access to your \
location, camera and microphone. The Security Analysis module checks passcode and \
activation lock status.";

pub const PERFORMANCE_RESPONSE: &str = "If the device feels slow, restart it first, then \
close apps you aren't using and check that at least 10% of storage is free. Turning off \
Background App Refresh for heavy apps helps too. Run the Performance Profiler module to \
look for bottlenecks.";

pub const ISSUE_RESPONSE: &str = "Sorry you're running into trouble. A full diagnostic is a \
good first step: it scans every module and highlights critical issues. Tell me more about \
when the problem happens and I'll point you to the right check.";

pub const FALLBACK_RESPONSE: &str = "I'm not sure I understood. Could you tell me a bit more? \
I can help with battery, storage, security and performance questions, or walk you through \
a specific issue.";

/// Topic of a matched keyword group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Battery,
    Storage,
    Security,
    Performance,
    Issue,
}

#[derive(Debug, Clone)]
pub struct ResponseRule {
    pub topic: Topic,
    pub keywords: &'static [&'static str],
    pub response: &'static str,
}

/// Ordered (keywords, response) table with a fallback
#[derive(Debug, Clone)]
pub struct ResponseTable {
    rules: Vec<ResponseRule>,
    fallback: &'static str,
}

impl ResponseTable {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                ResponseRule {
                    topic: Topic::Battery,
                    keywords: &["battery"],
                    response: BATTERY_RESPONSE,
                },
                ResponseRule {
                    topic: Topic::Storage,
                    keywords: &["storage"],
                    response: STORAGE_RESPONSE,
                },
                ResponseRule {
                    topic: Topic::Security,
                    keywords: &["security"],
                    response: SECURITY_RESPONSE,
                },
                ResponseRule {
                    topic: Topic::Performance,
                    keywords: &["performance"],
                    response: PERFORMANCE_RESPONSE,
                },
                ResponseRule {
                    topic: Topic::Issue,
                    keywords: &["issue", "problem"],
                    response: ISSUE_RESPONSE,
                },
            ],
            fallback: FALLBACK_RESPONSE,
        }
    }

    /// First matching topic in table order
    pub fn match_topic(&self, input: &str) -> Option<Topic> {
        self.matching_rule(input).map(|rule| rule.topic)
    }

    pub fn reply_for(&self, input: &str) -> &'static str {
        self.matching_rule(input)
            .map(|rule| rule.response)
            .unwrap_or(self.fallback)
    }

    fn matching_rule(&self, input: &str) -> Option<&ResponseRule> {
        let lowered = input.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
    }
}

impl Default for ResponseTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_reply() {
        let table = ResponseTable::standard();
        assert_eq!(table.reply_for("My battery drains fast"), BATTERY_RESPONSE);
    }

    #[test]
    fn test_fallback() {
        let table = ResponseTable::standard();
        assert_eq!(table.reply_for("xyz unrelated text"), FALLBACK_RESPONSE);
        assert_eq!(table.match_topic("xyz unrelated text"), None);
    }

    #[test]
    fn test_case_insensitive() {
        let table = ResponseTable::standard();
        assert_eq!(table.match_topic("STORAGE is FULL"), Some(Topic::Storage));
    }

    #[test]
    fn test_first_group_wins() {
        let table = ResponseTable::standard();
        // performance appears before battery in the text, battery is first in the table
        assert_eq!(
            table.match_topic("performance is bad and battery too"),
            Some(Topic::Battery)
        );
        assert_eq!(
            table.match_topic("security problem"),
            Some(Topic::Security)
        );
    }

    #[test]
    fn test_issue_keywords() {
        let table = ResponseTable::standard();
        assert_eq!(table.match_topic("I have a problem"), Some(Topic::Issue));
        assert_eq!(table.match_topic("weird issue after update"), Some(Topic::Issue));
    }
}
