// ABOUTME: Builders for the session and OAuth state cookies
// ABOUTME: HttpOnly, SameSite=Lax cookies scoped to the whole site

use crate::constants::cookies::{OAUTH_STATE_COOKIE, SESSION_COOKIE};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

fn base_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(secure);
    cookie
}

/// Cookie carrying the session token
#[must_use]
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    base_cookie(SESSION_COOKIE, token, secure)
}

/// Cookie binding an `OAuth` flow to the browser that started it
#[must_use]
pub fn state_cookie(state: String, secure: bool) -> Cookie<'static> {
    base_cookie(OAUTH_STATE_COOKIE, state, secure)
}

/// Value of a cookie in the jar
#[must_use]
pub fn get_cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_owned())
}

/// Jar with the named cookie expired
#[must_use]
pub fn remove_cookie(jar: CookieJar, name: &'static str) -> CookieJar {
    let mut cookie = Cookie::from(name);
    cookie.set_path("/");
    jar.remove(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("token".into(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_remove_cookie_drops_value() {
        let jar = CookieJar::new().add(state_cookie("abc".into(), false));
        assert_eq!(get_cookie_value(&jar, OAUTH_STATE_COOKIE).as_deref(), Some("abc"));

        let jar = remove_cookie(jar, OAUTH_STATE_COOKIE);
        assert!(get_cookie_value(&jar, OAUTH_STATE_COOKIE).is_none());
    }
}
