//! Hand-parsed urlencoded form bodies. Multi-select fields arrive as
//! repeated keys (`authors=1&authors=2`), which is why these go through
//! `form_urlencoded` pair iteration instead of a struct deserializer.

use crate::model::{BookDraft, ChapterDraft};

pub fn book_draft(body: &[u8]) -> BookDraft {
    let mut draft = BookDraft::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "title" => draft.title = value.into_owned(),
            "description" => draft.description = value.into_owned(),
            "cover" => {
                let value = value.trim();
                if !value.is_empty() {
                    draft.cover = Some(value.to_owned());
                }
            }
            // Unparseable ids are dropped; validation then reports the
            // selection as missing or invalid.
            "authors" => {
                if let Ok(id) = value.trim().parse() {
                    draft.author_ids.push(id);
                }
            }
            "categories" => {
                if let Ok(id) = value.trim().parse() {
                    draft.category_ids.push(id);
                }
            }
            _ => {}
        }
    }
    draft
}

pub fn chapter_draft(body: &[u8]) -> ChapterDraft {
    let mut draft = ChapterDraft::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "title" => draft.title = value.into_owned(),
            "content" => draft.content = value.into_owned(),
            _ => {}
        }
    }
    draft
}

pub fn author_name(body: &[u8]) -> String {
    field(body, "name")
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

pub fn login(body: &[u8]) -> LoginForm {
    let mut form = LoginForm::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "username" => form.username = value.into_owned(),
            "password" => form.password = value.into_owned(),
            "next" => form.next = Some(value.into_owned()),
            _ => {}
        }
    }
    form
}

#[derive(Debug, Default)]
pub struct RegisterForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

pub fn register(body: &[u8]) -> RegisterForm {
    let mut form = RegisterForm::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "username" => form.username = value.into_owned(),
            "password1" => form.password1 = value.into_owned(),
            "password2" => form.password2 = value.into_owned(),
            _ => {}
        }
    }
    form
}

#[derive(Debug, Default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

pub fn password_change(body: &[u8]) -> PasswordChangeForm {
    let mut form = PasswordChangeForm::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "old_password" => form.old_password = value.into_owned(),
            "new_password1" => form.new_password1 = value.into_owned(),
            "new_password2" => form.new_password2 = value.into_owned(),
            _ => {}
        }
    }
    form
}

fn field(body: &[u8], name: &str) -> String {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_draft_collects_repeated_select_keys() {
        let draft =
            book_draft(b"title=Dune&description=Sand&authors=1&authors=2&categories=7");
        assert_eq!(draft.title, "Dune");
        assert_eq!(draft.description, "Sand");
        assert_eq!(draft.author_ids, vec![1, 2]);
        assert_eq!(draft.category_ids, vec![7]);
        assert_eq!(draft.cover, None);
    }

    #[test]
    fn book_draft_decodes_percent_escapes() {
        let draft = book_draft("title=Test%20%26%20co&description=a%2Bb".as_bytes());
        assert_eq!(draft.title, "Test & co");
        assert_eq!(draft.description, "a+b");
    }

    #[test]
    fn book_draft_drops_unparseable_ids() {
        let draft = book_draft(b"title=t&description=d&authors=abc&categories=");
        assert!(draft.author_ids.is_empty());
        assert!(draft.category_ids.is_empty());
    }

    #[test]
    fn plus_decodes_to_space() {
        let draft = chapter_draft(b"title=First+chapter&content=Some+text");
        assert_eq!(draft.title, "First chapter");
        assert_eq!(draft.content, "Some text");
    }

    #[test]
    fn login_keeps_next_verbatim() {
        let form = login(b"username=alice&password=secret123&next=%2Fbooks%2Fadd");
        assert_eq!(form.username, "alice");
        assert_eq!(form.next.as_deref(), Some("/books/add"));
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let form = register(b"username=bob");
        assert_eq!(form.username, "bob");
        assert!(form.password1.is_empty());
        assert!(form.password2.is_empty());
    }
}
