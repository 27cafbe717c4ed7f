use std::time::Duration;

use crate::config::CookieConfig;

pub fn build_session_cookie(config: &CookieConfig, value: &str, max_age: Duration) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        config.name,
        value,
        max_age.as_secs()
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn build_clear_cookie(config: &CookieConfig) -> String {
    let mut cookie = format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", config.name);
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn extract_cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}
