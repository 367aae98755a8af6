//! Inline HTML rendering. Pages are deliberately plain; the catalog's
//! result objects are the contract, not the markup.

use axum::response::Html;

use crate::catalog::BookDetail;
use crate::error::ValidationErrors;
use crate::model::{Actor, Author, Book, BookDraft, Category, Chapter, ChapterDraft};

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn page(title: &str, actor: &Actor, body: &str) -> Html<String> {
    let account = match actor.user() {
        Some(user) => format!(
            r#"<span>{}</span> <a href="/profile">favorites</a> <a href="/accounts/password-change">password</a> <a href="/accounts/logout">log out</a>"#,
            escape(&user.username)
        ),
        None => r#"<a href="/accounts/login">log in</a> <a href="/accounts/register">register</a>"#
            .to_owned(),
    };

    Html(format!(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>{title} - book tracker</title></head>
  <body>
    <nav>
      <a href="/">all books</a>
      <a href="/?mine=true">my books</a>
      <a href="/books/add">add book</a>
      <form action="/search" method="get"><input type="text" name="q" placeholder="search"><button>search</button></form>
      {account}
    </nav>
    <main>
{body}
    </main>
  </body>
</html>
"#,
        title = escape(title),
    ))
}

fn form_errors(errors: &ValidationErrors) -> String {
    if errors.form.is_empty() {
        return String::new();
    }
    let items: String = errors
        .form
        .iter()
        .map(|msg| format!("<li>{}</li>", escape(msg)))
        .collect();
    format!(r#"<ul class="errorlist">{items}</ul>"#)
}

fn field_errors(errors: &ValidationErrors, field: &str) -> String {
    let items: String = errors
        .field_messages(field)
        .map(|msg| format!("<li>{}</li>", escape(msg)))
        .collect();
    if items.is_empty() {
        String::new()
    } else {
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }
}

fn options(choices: &[(i64, &str)], selected: &[i64]) -> String {
    choices
        .iter()
        .map(|(id, name)| {
            let marker = if selected.contains(id) { " selected" } else { "" };
            format!(r#"<option value="{id}"{marker}>{}</option>"#, escape(name))
        })
        .collect()
}

fn book_item(book: &Book) -> String {
    let authors: Vec<String> = book.authors.iter().map(|a| escape(&a.name)).collect();
    format!(
        r#"<li><a href="/books/{}">{}</a> — {}</li>"#,
        book.id,
        escape(&book.title),
        authors.join(", ")
    )
}

pub fn book_list_page(actor: &Actor, books: &[Book], show_mine: bool) -> Html<String> {
    let heading = if show_mine { "My books" } else { "All books" };
    let items: String = books.iter().map(|book| book_item(book)).collect();
    let body = format!("<h1>{heading}</h1>\n<ul class=\"books\">{items}</ul>");
    page(heading, actor, &body)
}

pub fn book_detail_page(actor: &Actor, detail: &BookDetail, can_edit: bool) -> Html<String> {
    let book = &detail.book;
    let authors: Vec<String> = book.authors.iter().map(|a| escape(&a.name)).collect();
    let categories: Vec<String> = book.categories.iter().map(|c| escape(&c.name)).collect();

    let mut body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p>authors: {}</p>\n<p>categories: {}</p>\n",
        escape(&book.title),
        escape(&book.description),
        authors.join(", "),
        categories.join(", "),
    );
    if let Some(cover) = &book.cover {
        body.push_str(&format!(
            r#"<p><img src="/media/{}" alt="cover"></p>"#,
            escape(cover)
        ));
        body.push('\n');
    }

    if actor.is_authenticated() {
        if detail.is_favorite {
            body.push_str(&format!(
                r#"<p><a href="/books/{}/unfavorite">remove from favorites</a></p>"#,
                book.id
            ));
        } else {
            body.push_str(&format!(
                r#"<p><a href="/books/{}/favorite">add to favorites</a></p>"#,
                book.id
            ));
        }
        body.push('\n');
    }
    if can_edit {
        body.push_str(&format!(
            r#"<p><a href="/books/{id}/edit">edit</a> <a href="/books/{id}/delete">delete</a> <a href="/books/{id}/add-chapter">add chapter</a></p>"#,
            id = book.id
        ));
        body.push('\n');
    }

    body.push_str("<h2>Chapters</h2>\n<ul class=\"chapters\">");
    for chapter in &detail.chapters {
        body.push_str(&format!(
            "<li><h3>{}</h3><p>{}</p>",
            escape(&chapter.title),
            escape(&chapter.content)
        ));
        if can_edit {
            body.push_str(&format!(
                r#" <a href="/chapters/{id}/edit">edit</a> <a href="/chapters/{id}/delete">delete</a>"#,
                id = chapter.id
            ));
        }
        body.push_str("</li>");
    }
    body.push_str("</ul>");

    page(&book.title, actor, &body)
}

pub fn book_form_page(
    actor: &Actor,
    heading: &str,
    action: &str,
    draft: &BookDraft,
    authors: &[Author],
    categories: &[Category],
    errors: &ValidationErrors,
) -> Html<String> {
    let author_choices: Vec<(i64, &str)> =
        authors.iter().map(|a| (a.id, a.name.as_str())).collect();
    let category_choices: Vec<(i64, &str)> =
        categories.iter().map(|c| (c.id, c.name.as_str())).collect();

    let body = format!(
        r#"<h1>{heading}</h1>
{form_errors}
<form method="post" action="{action}">
  <p><label>title <input type="text" name="title" value="{title}"></label>{title_errors}</p>
  <p><label>description <textarea name="description">{description}</textarea></label>{description_errors}</p>
  <p><label>cover reference <input type="text" name="cover" value="{cover}"></label></p>
  <p><label>authors <select name="authors" multiple>{author_options}</select></label>
     <a href="/authors/add" target="_blank">add author</a>{author_errors}</p>
  <p><label>categories <select name="categories" multiple>{category_options}</select></label>{category_errors}</p>
  <p><button type="submit">save</button></p>
</form>"#,
        heading = escape(heading),
        form_errors = form_errors(errors),
        action = escape(action),
        title = escape(&draft.title),
        title_errors = field_errors(errors, "title"),
        description = escape(&draft.description),
        description_errors = field_errors(errors, "description"),
        cover = escape(draft.cover.as_deref().unwrap_or("")),
        author_options = options(&author_choices, &draft.author_ids),
        author_errors = field_errors(errors, "authors"),
        category_options = options(&category_choices, &draft.category_ids),
        category_errors = field_errors(errors, "categories"),
    );
    page(heading, actor, &body)
}

pub fn book_confirm_delete_page(actor: &Actor, book: &Book) -> Html<String> {
    let body = format!(
        r#"<h1>Delete book</h1>
<p>Are you sure you want to delete "{title}"? Its chapters will be deleted with it.</p>
<form method="post" action="/books/{id}/delete">
  <button type="submit">delete</button> <a href="/books/{id}">cancel</a>
</form>"#,
        title = escape(&book.title),
        id = book.id,
    );
    page("Delete book", actor, &body)
}

pub fn chapter_form_page(
    actor: &Actor,
    book: &Book,
    action: &str,
    draft: &ChapterDraft,
    errors: &ValidationErrors,
) -> Html<String> {
    let body = format!(
        r#"<h1>Chapter of "{book_title}"</h1>
{form_errors}
<form method="post" action="{action}">
  <p><label>title <input type="text" name="title" value="{title}"></label>{title_errors}</p>
  <p><label>content <textarea name="content">{content}</textarea></label>{content_errors}</p>
  <p><button type="submit">save</button> <a href="/books/{book_id}">cancel</a></p>
</form>"#,
        book_title = escape(&book.title),
        form_errors = form_errors(errors),
        action = escape(action),
        title = escape(&draft.title),
        title_errors = field_errors(errors, "title"),
        content = escape(&draft.content),
        content_errors = field_errors(errors, "content"),
        book_id = book.id,
    );
    page("Chapter", actor, &body)
}

pub fn chapter_confirm_delete_page(actor: &Actor, chapter: &Chapter) -> Html<String> {
    let body = format!(
        r#"<h1>Delete chapter</h1>
<p>Are you sure you want to delete "{title}"?</p>
<form method="post" action="/chapters/{id}/delete">
  <button type="submit">delete</button> <a href="/books/{book_id}">cancel</a>
</form>"#,
        title = escape(&chapter.title),
        id = chapter.id,
        book_id = chapter.book_id,
    );
    page("Delete chapter", actor, &body)
}

pub fn access_denied_page(actor: &Actor, message: &str) -> Html<String> {
    let body = format!(
        "<h1>Access denied</h1>\n<p>{}</p>\n<p><a href=\"/\">back to the catalog</a></p>",
        escape(message)
    );
    page("Access denied", actor, &body)
}

pub fn search_page(actor: &Actor, query: &str, results: &[Book]) -> Html<String> {
    let items: String = results.iter().map(|book| book_item(book)).collect();
    let summary = if query.trim().is_empty() {
        "<p>Type a query to search titles, descriptions, authors and chapters.</p>".to_owned()
    } else {
        format!(
            "<p>{} result(s) for \"{}\"</p>",
            results.len(),
            escape(query)
        )
    };
    let body = format!(
        r#"<h1>Search</h1>
<form method="get" action="/search"><input type="text" name="q" value="{q}"><button>search</button></form>
{summary}
<ul class="results">{items}</ul>"#,
        q = escape(query),
    );
    page("Search", actor, &body)
}

pub fn profile_page(actor: &Actor, username: &str, favorites: &[Book]) -> Html<String> {
    let items: String = favorites.iter().map(|book| book_item(book)).collect();
    let body = format!(
        "<h1>{}'s favorites</h1>\n<ul class=\"favorites\">{items}</ul>",
        escape(username),
    );
    page("Favorites", actor, &body)
}

pub fn author_form_page(actor: &Actor, name: &str, errors: &ValidationErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Add author</h1>
<form method="post" action="/authors/add">
  <p><label>name <input type="text" name="name" value="{name}"></label>{name_errors}</p>
  <p><button type="submit">save</button></p>
</form>"#,
        name = escape(name),
        name_errors = field_errors(errors, "name"),
    );
    page("Add author", actor, &body)
}

/// The add-author flow opens in a popup; closing it hands control back to
/// the book form underneath.
pub fn author_added_page() -> Html<String> {
    Html("<script>window.close();</script>".to_owned())
}

pub fn login_page(next: &str, error: Option<&str>) -> Html<String> {
    let error_html = match error {
        Some(message) => format!(r#"<ul class="errorlist"><li>{}</li></ul>"#, escape(message)),
        None => String::new(),
    };
    let body = format!(
        r#"<h1>Log in</h1>
{error_html}
<form method="post" action="/accounts/login">
  <input type="hidden" name="next" value="{next}">
  <p><label>username <input type="text" name="username"></label></p>
  <p><label>password <input type="password" name="password"></label></p>
  <p><button type="submit">log in</button></p>
</form>
<p><a href="/accounts/register">register</a></p>"#,
        next = escape(next),
    );
    page("Log in", &Actor::Anonymous, &body)
}

pub fn register_page(username: &str, errors: &ValidationErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Register</h1>
{form_errors}
<form method="post" action="/accounts/register">
  <p><label>username <input type="text" name="username" value="{username}"></label>{username_errors}</p>
  <p><label>password <input type="password" name="password1"></label>{password1_errors}</p>
  <p><label>password (again) <input type="password" name="password2"></label>{password2_errors}</p>
  <p><button type="submit">register</button></p>
</form>"#,
        form_errors = form_errors(errors),
        username = escape(username),
        username_errors = field_errors(errors, "username"),
        password1_errors = field_errors(errors, "password1"),
        password2_errors = field_errors(errors, "password2"),
    );
    page("Register", &Actor::Anonymous, &body)
}

pub fn logout_page() -> Html<String> {
    page(
        "Logged out",
        &Actor::Anonymous,
        "<h1>Logged out</h1>\n<p>You have been logged out. <a href=\"/accounts/login\">log in again</a></p>",
    )
}

pub fn password_change_page(errors: &ValidationErrors) -> Html<String> {
    let body = format!(
        r#"<h1>Change password</h1>
<form method="post" action="/accounts/password-change">
  <p><label>old password <input type="password" name="old_password"></label>{old_errors}</p>
  <p><label>new password <input type="password" name="new_password1"></label>{new1_errors}</p>
  <p><label>new password (again) <input type="password" name="new_password2"></label>{new2_errors}</p>
  <p><button type="submit">change</button></p>
</form>"#,
        old_errors = field_errors(errors, "old_password"),
        new1_errors = field_errors(errors, "new_password1"),
        new2_errors = field_errors(errors, "new_password2"),
    );
    page("Change password", &Actor::Anonymous, &body)
}

pub fn password_change_done_page() -> Html<String> {
    page(
        "Password changed",
        &Actor::Anonymous,
        "<h1>Password changed</h1>\n<p>You have been logged out. <a href=\"/accounts/login\">log in</a> with your new password.</p>",
    )
}

pub fn not_found_page(what: &str) -> Html<String> {
    let body = format!(
        "<h1>Not found</h1>\n<p>No such {}.</p>\n<p><a href=\"/\">back to the catalog</a></p>",
        escape(what)
    );
    page("Not found", &Actor::Anonymous, &body)
}

pub fn validation_page(errors: &ValidationErrors) -> Html<String> {
    let body = format!(
        "<h1>Invalid input</h1>\n<p>{}</p>",
        escape(&errors.to_string())
    );
    page("Invalid input", &Actor::Anonymous, &body)
}

pub fn server_error_page() -> Html<String> {
    page(
        "Server error",
        &Actor::Anonymous,
        "<h1>Something went wrong</h1>\n<p>The request could not be completed. Please try again.</p>",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_html_metacharacters() {
        assert_eq!(
            escape(r#"<b>&"quote"&#x27;</b>"#),
            "&lt;b&gt;&amp;&quot;quote&quot;&amp;#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn options_mark_selected_choices() {
        let rendered = options(&[(1, "One"), (2, "Two")], &[2]);
        assert!(rendered.contains(r#"<option value="1">One</option>"#));
        assert!(rendered.contains(r#"<option value="2" selected>Two</option>"#));
    }

    #[test]
    fn book_titles_are_escaped_in_listings() {
        let book = Book {
            id: 1,
            title: "<script>".to_owned(),
            description: String::new(),
            cover: None,
            owner_id: None,
            authors: Vec::new(),
            categories: Vec::new(),
        };
        let Html(rendered) = book_list_page(&Actor::Anonymous, &[book], false);
        assert!(rendered.contains("&lt;script&gt;"));
        assert!(!rendered.contains("<script>"));
    }
}
