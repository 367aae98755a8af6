use axum::extract::{Query, RawForm, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::app::{AppState, Failure, forms, render};
use crate::error::{Error, Result, ValidationErrors};
use crate::model::Actor;

pub const LOGIN_PATH: &str = "/accounts/login";
const SESSION_COOKIE: &str = "session";

/// Resolve the request's actor from the session cookie. Missing, unknown
/// or expired sessions are simply anonymous.
pub async fn current_actor(state: &AppState, headers: &HeaderMap) -> Result<Actor> {
    let Some(token) = cookie_token(headers) else {
        return Ok(Actor::Anonymous);
    };
    Ok(match state.identity.session_user(&token).await? {
        Some(user) => Actor::Authenticated(user),
        None => Actor::Anonymous,
    })
}

/// Redirect to the login page, preserving the originally requested
/// destination for the post-login return.
pub(crate) fn login_redirect(next: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    Redirect::to(&format!("{LOGIN_PATH}?{query}")).into_response()
}

/// Accept only site-local paths as post-login targets; anything with a
/// scheme or host (including scheme-relative `//host`) is discarded.
fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.is_empty() || !next.starts_with('/') || next.starts_with("//") {
        return None;
    }
    if url::Url::parse(next).is_ok() {
        return None;
    }
    Some(next.to_owned())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_owned())
    })
}

fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0")
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Response {
    render::login_page(query.next.as_deref().unwrap_or(""), None).into_response()
}

pub async fn login(State(state): State<AppState>, RawForm(body): RawForm) -> Response {
    let form = forms::login(&body);

    let user = match state
        .identity
        .verify_credentials(form.username.trim(), &form.password)
        .await
    {
        Ok(user) => user,
        Err(err) => return Failure::new(err, LOGIN_PATH).into_response(),
    };

    let Some(user) = user else {
        return render::login_page(
            form.next.as_deref().unwrap_or(""),
            Some("invalid username or password"),
        )
        .into_response();
    };

    let token = match state.identity.create_session(user.id).await {
        Ok(token) => token,
        Err(err) => return Failure::new(err, LOGIN_PATH).into_response(),
    };

    let target = safe_next(form.next.as_deref()).unwrap_or_else(|| "/".to_owned());
    with_cookie(
        Redirect::to(&target).into_response(),
        &session_cookie(&token),
    )
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookie_token(&headers)
        && let Err(err) = state.identity.delete_session(&token).await
    {
        return Failure::new(err, "/").into_response();
    }
    with_cookie(render::logout_page().into_response(), &clear_session_cookie())
}

pub async fn register_form() -> Response {
    render::register_page("", &ValidationErrors::new()).into_response()
}

pub async fn register(State(state): State<AppState>, RawForm(body): RawForm) -> Response {
    let form = forms::register(&body);
    let username = form.username.trim();

    let mut errors = ValidationErrors::new();
    if username.is_empty() {
        errors.add_field("username", "this field is required");
    } else if username.chars().count() > 150 {
        errors.add_field("username", "keep the username under 151 characters");
    }
    if form.password1.chars().count() < 8 {
        errors.add_field("password1", "password must be at least 8 characters");
    }
    if form.password1 != form.password2 {
        errors.add_field("password2", "the two password fields do not match");
    }
    if !errors.is_empty() {
        return render::register_page(username, &errors).into_response();
    }

    let user = match state.identity.create_user(username, &form.password1).await {
        Ok(user) => user,
        Err(Error::Validation(errors)) => {
            return render::register_page(username, &errors).into_response();
        }
        Err(err) => return Failure::new(err, "/accounts/register").into_response(),
    };

    // A fresh account is signed in right away.
    match state.identity.create_session(user.id).await {
        Ok(token) => with_cookie(Redirect::to("/").into_response(), &session_cookie(&token)),
        Err(err) => Failure::new(err, "/accounts/register").into_response(),
    }
}

pub async fn password_change_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let actor = match current_actor(&state, &headers).await {
        Ok(actor) => actor,
        Err(err) => return Failure::new(err, "/accounts/password-change").into_response(),
    };
    if !actor.is_authenticated() {
        return login_redirect("/accounts/password-change");
    }
    render::password_change_page(&ValidationErrors::new()).into_response()
}

/// A successful change also ends the session: the user signs back in with
/// the new password.
pub async fn password_change(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Response {
    let actor = match current_actor(&state, &headers).await {
        Ok(actor) => actor,
        Err(err) => return Failure::new(err, "/accounts/password-change").into_response(),
    };
    let Some(user) = actor.user() else {
        return login_redirect("/accounts/password-change");
    };

    let form = forms::password_change(&body);
    let mut errors = ValidationErrors::new();

    match state
        .identity
        .verify_credentials(&user.username, &form.old_password)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => errors.add_field("old_password", "your old password was entered incorrectly"),
        Err(err) => return Failure::new(err, "/accounts/password-change").into_response(),
    }
    if form.new_password1.chars().count() < 8 {
        errors.add_field("new_password1", "password must be at least 8 characters");
    }
    if form.new_password1 != form.new_password2 {
        errors.add_field("new_password2", "the two password fields do not match");
    }
    if !errors.is_empty() {
        return render::password_change_page(&errors).into_response();
    }

    if let Err(err) = state.identity.set_password(user.id, &form.new_password1).await {
        return Failure::new(err, "/accounts/password-change").into_response();
    }
    if let Some(token) = cookie_token(&headers)
        && let Err(err) = state.identity.delete_session(&token).await
    {
        return Failure::new(err, "/accounts/password-change").into_response();
    }

    with_cookie(
        render::password_change_done_page().into_response(),
        &clear_session_cookie(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_accepts_local_paths() {
        assert_eq!(safe_next(Some("/books/3")), Some("/books/3".to_owned()));
        assert_eq!(safe_next(Some("/")), Some("/".to_owned()));
    }

    #[test]
    fn safe_next_rejects_foreign_targets() {
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("javascript:alert(1)")), None);
        assert_eq!(safe_next(Some("books/3")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn cookie_token_finds_the_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; lang=en"),
        );
        assert_eq!(cookie_token(&headers), Some("abc123".to_owned()));
    }

    #[test]
    fn cookie_token_ignores_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sessions=wrong; other=1"),
        );
        assert_eq!(cookie_token(&headers), None);
    }
}
