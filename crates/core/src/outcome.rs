use serde::{Deserialize, Serialize};

/// Severity of the issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

/// Type of issue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Invalid,
    Required,
    Login,
    Forbidden,
    NotFound,
    Conflict,
    BusinessRule,
    Exception,
    Transient,
    Throttled,
    Informational,
}

/// A single issue reported in an outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeIssue {
    pub severity: IssueSeverity,
    pub code: IssueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Uniform body returned by every failing (and some informational) API call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub resource_type: String,
    pub issue: Vec<OutcomeIssue>,
}

impl Outcome {
    fn single(severity: IssueSeverity, code: IssueType, message: &str) -> Self {
        Self {
            resource_type: "Outcome".to_string(),
            issue: vec![OutcomeIssue {
                severity,
                code,
                diagnostics: Some(message.to_string()),
            }],
        }
    }

    /// Error outcome with an explicit issue type
    pub fn error(code: IssueType, message: &str) -> Self {
        Self::single(IssueSeverity::Error, code, message)
    }

    pub fn invalid(message: &str) -> Self {
        Self::error(IssueType::Invalid, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::error(IssueType::Login, message)
    }

    /// First diagnostics string, if any
    pub fn message(&self) -> Option<&str> {
        self.issue.first().and_then(|i| i.diagnostics.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_issue_codes_in_kebab_case() {
        let outcome = Outcome::error(IssueType::BusinessRule, "handover note too short");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["resourceType"], "Outcome");
        assert_eq!(json["issue"][0]["severity"], "error");
        assert_eq!(json["issue"][0]["code"], "business-rule");
        assert_eq!(json["issue"][0]["diagnostics"], "handover note too short");
    }

    #[test]
    fn unauthorized_uses_login_code() {
        let outcome = Outcome::unauthorized("Missing or invalid API key");
        assert_eq!(outcome.issue[0].code, IssueType::Login);
        assert_eq!(outcome.issue[0].severity, IssueSeverity::Error);
        assert_eq!(outcome.message(), Some("Missing or invalid API key"));
    }
}
