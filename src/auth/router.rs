//! Scheme selection for inbound requests.
//!
//! Runs on every request, authenticated or not, so it only inspects the
//! request and never mutates it. Order: default, then the first matching
//! scheme cookie, then an explicit `handler` query parameter which overrides
//! a stale cookie.

use super::SchemeId;

/// Pick the sign-in scheme for a request from its cookie names and the
/// optional `handler` query parameter.
#[must_use]
pub fn select<'a, I>(cookie_names: I, handler: Option<&str>) -> SchemeId
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scheme = SchemeId::Default;

    // Check the scheme from the cookies (if present). This check is required
    // for the sign-in postback and sign-out flows.
    for name in cookie_names {
        if name == SchemeId::FraudProtection.cookie_name() {
            scheme = SchemeId::FraudProtection;
            break;
        } else if name == SchemeId::EmailOtp.cookie_name() {
            scheme = SchemeId::EmailOtp;
            break;
        }
    }

    // An explicit sign-in request wins over a stale cookie.
    if let Some(forced) = handler.and_then(SchemeId::from_handler) {
        scheme = forced;
    }

    scheme
}

/// Cookie names from a `Cookie` header value, e.g. `a=1; b=2` yields `a`, `b`.
pub fn cookie_names(header: &str) -> impl Iterator<Item = &str> {
    header
        .split(';')
        .filter_map(|pair| pair.split('=').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_cookies_or_handler() {
        assert_eq!(select([], None), SchemeId::Default);
    }

    #[test]
    fn fraud_protection_cookie_selects_fraud_protection() {
        let cookies = ["grovemart.FraudProtection.session"];
        assert_eq!(select(cookies, None), SchemeId::FraudProtection);
    }

    #[test]
    fn email_otp_cookie_selects_email_otp() {
        let cookies = ["other", "grovemart.EmailOtp.session"];
        assert_eq!(select(cookies, None), SchemeId::EmailOtp);
    }

    #[test]
    fn first_matching_cookie_wins() {
        let cookies = [
            "grovemart.FraudProtection.session",
            "grovemart.EmailOtp.session",
        ];
        assert_eq!(select(cookies, None), SchemeId::FraudProtection);
    }

    #[test]
    fn handler_overrides_cookies() {
        let cookies = ["grovemart.FraudProtection.session"];
        assert_eq!(select(cookies, Some("EmailOtp")), SchemeId::EmailOtp);
    }

    #[test]
    fn unknown_handler_is_ignored() {
        let cookies = ["grovemart.FraudProtection.session"];
        assert_eq!(select(cookies, Some("bogus")), SchemeId::FraudProtection);
        assert_eq!(select([], Some("bogus")), SchemeId::Default);
    }

    #[test]
    fn unrelated_cookies_keep_default() {
        let cookies = ["theme", "grovemart.OpenIdConnect.session"];
        assert_eq!(select(cookies, None), SchemeId::Default);
    }

    #[test]
    fn parses_cookie_header_names() {
        let names: Vec<_> = cookie_names("a=1; grovemart.EmailOtp.session=tok; b=2").collect();
        assert_eq!(names, vec!["a", "grovemart.EmailOtp.session", "b"]);
    }
}
