//! Error-page redirects for authentication failures.
//!
//! Every auth failure surfaces as a redirect to `/auth/error` carrying
//! `error` and `description` query parameters. Descriptions have control
//! characters stripped before transmission; raw internal errors never reach
//! the end user verbatim.

use url::form_urlencoded;

/// Exceptions thrown during sign-in/token processing.
pub const ERROR_CODE_AUTH_FAILED: &str = "APP_AUTH_0001";
/// Remote failures reported by the identity provider round-trip.
pub const ERROR_CODE_REMOTE_FAILURE: &str = "APP_AUTH_0002";

/// Strip control characters from a message before it is transmitted.
#[must_use]
pub fn sanitize_description(description: &str) -> String {
    description.chars().filter(|c| !c.is_control()).collect()
}

/// Location of the error page for a failure, with the description sanitized
/// and URL-encoded.
#[must_use]
pub fn error_location(error: &str, description: &str) -> String {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", error)
        .append_pair("description", &sanitize_description(description))
        .finish();
    format!("/auth/error?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters() {
        assert_eq!(
            sanitize_description("bad\r\nthing\thappened\u{7}"),
            "badthinghappened"
        );
    }

    #[test]
    fn keeps_plain_text_untouched() {
        assert_eq!(sanitize_description("plain message"), "plain message");
    }

    #[test]
    fn error_location_encodes_description() {
        let location = error_location(ERROR_CODE_AUTH_FAILED, "signature validation failed: a&b");
        assert_eq!(
            location,
            "/auth/error?error=APP_AUTH_0001&description=signature+validation+failed%3A+a%26b"
        );
    }
}
