use crate::llm::chat::GatewayError;

pub const QUOTA_MARKER: &str = "[Temporarily mocked due to billing/quota issue]";
pub const CREDENTIALS_MARKER: &str = "[AI unavailable: invalid API key or model]";
pub const RATE_LIMIT_MARKER: &str = "[AI unavailable: rate limit exceeded, please retry shortly]";
pub const OTHER_MARKER: &str = "[AI unavailable]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Quota,
    Credentials,
    RateLimited,
    Other,
}

impl FailureCategory {
    pub fn marker(&self) -> &'static str {
        match self {
            FailureCategory::Quota => QUOTA_MARKER,
            FailureCategory::Credentials => CREDENTIALS_MARKER,
            FailureCategory::RateLimited => RATE_LIMIT_MARKER,
            FailureCategory::Other => OTHER_MARKER,
        }
    }
}

const QUOTA_CODES: &[&str] = &[
    "insufficient_quota",
    "billing_hard_limit_reached",
    "billing_not_active",
    "access_terminated",
];
const CREDENTIAL_CODES: &[&str] = &[
    "invalid_api_key",
    "invalid_organization",
    "model_not_found",
    "invalid_model",
    "authentication_error",
    "permission_error",
];
const RATE_CODES: &[&str] = &["rate_limit_exceeded", "requests", "tokens"];

fn matches_any(value: Option<&str>, codes: &[&str]) -> bool {
    value.is_some_and(|v| codes.contains(&v))
}

/// Last resort: keyword search over a free-form error description.
fn classify_text(description: &str) -> FailureCategory {
    let text = description.to_lowercase();
    if text.contains("quota") || text.contains("billing") || text.contains("insufficient") {
        FailureCategory::Quota
    } else if text.contains("rate") || text.contains("too many requests") {
        FailureCategory::RateLimited
    } else if
        text.contains("api key") ||
        text.contains("api_key") ||
        text.contains("unauthorized") ||
        text.contains("model")
    {
        FailureCategory::Credentials
    } else {
        FailureCategory::Other
    }
}

pub fn classify(err: &GatewayError) -> FailureCategory {
    match err {
        GatewayError::Api { status, kind, code, message } => {
            let (kind, code) = (kind.as_deref(), code.as_deref());
            if matches_any(code, QUOTA_CODES) || matches_any(kind, QUOTA_CODES) || *status == 402 {
                FailureCategory::Quota
            } else if matches_any(code, CREDENTIAL_CODES) || matches_any(kind, CREDENTIAL_CODES) {
                FailureCategory::Credentials
            } else if matches_any(code, RATE_CODES) || *status == 429 {
                // 429 also carries quota exhaustion, which the codes above catch.
                FailureCategory::RateLimited
            } else if matches!(status, 401 | 403 | 404) {
                FailureCategory::Credentials
            } else {
                classify_text(message)
            }
        }
        GatewayError::Transport(description) |
        GatewayError::InvalidResponse(description) |
        GatewayError::Config(description) => classify_text(description),
    }
}

/// Assistant text recorded in place of a real completion.
pub fn synthetic_reply(err: &GatewayError) -> String {
    match classify(err) {
        FailureCategory::Other => format!("{} {}", OTHER_MARKER, err),
        category => category.marker().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: Option<&str>, message: &str) -> GatewayError {
        GatewayError::Api {
            status,
            kind: None,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn quota_exhaustion_on_429_is_not_a_rate_limit() {
        let err = api(429, Some("insufficient_quota"), "You exceeded your current quota");
        assert_eq!(classify(&err), FailureCategory::Quota);
        assert_eq!(synthetic_reply(&err), QUOTA_MARKER);
    }

    #[test]
    fn structured_codes_take_precedence_over_text() {
        assert_eq!(
            classify(&api(404, Some("model_not_found"), "rate of something")),
            FailureCategory::Credentials
        );
        assert_eq!(classify(&api(429, None, "slow down")), FailureCategory::RateLimited);
        assert_eq!(classify(&api(401, None, "nope")), FailureCategory::Credentials);
    }

    #[test]
    fn description_mentioning_rate_is_classified_as_rate_limit() {
        let err = GatewayError::Transport("Rate limit reached for requests".into());
        assert_eq!(classify(&err), FailureCategory::RateLimited);
        assert!(synthetic_reply(&err).contains(RATE_LIMIT_MARKER));
    }

    #[test]
    fn unclassified_errors_keep_verbatim_text() {
        let err = api(500, None, "upstream exploded");
        assert_eq!(classify(&err), FailureCategory::Other);
        let reply = synthetic_reply(&err);
        assert!(reply.starts_with(OTHER_MARKER));
        assert!(reply.contains("upstream exploded"));
    }

    #[test]
    fn unstructured_errors_fall_back_to_keywords() {
        let err = GatewayError::Transport("proxy refused: Unauthorized".into());
        assert_eq!(classify(&err), FailureCategory::Credentials);
        let err = GatewayError::InvalidResponse("billing account suspended".into());
        assert_eq!(classify(&err), FailureCategory::Quota);
    }
}
