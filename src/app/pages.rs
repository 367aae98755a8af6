use axum::extract::{Path, Query, RawForm, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::app::{AppState, Failure, auth, forms, render};
use crate::error::{Error, ValidationErrors};
use crate::model::{Actor, Book, BookDraft, ChapterDraft};
use crate::policy;

const ADD_BOOK_PATH: &str = "/books/add";
const CHAPTER_DENIED_MESSAGE: &str = "You cannot add a chapter to a book you do not own.";

async fn actor_or(state: &AppState, headers: &HeaderMap, next: &str) -> Result<Actor, Failure> {
    auth::current_actor(state, headers)
        .await
        .map_err(|err| Failure::new(err, next))
}

fn draft_of(book: &Book) -> BookDraft {
    BookDraft {
        title: book.title.clone(),
        description: book.description.clone(),
        cover: book.cover.clone(),
        author_ids: book.authors.iter().map(|a| a.id).collect(),
        category_ids: book.categories.iter().map(|c| c.id).collect(),
    }
}

// ---- listing, detail, search ----

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    mine: Option<String>,
}

pub async fn book_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let actor = actor_or(&state, &headers, "/").await?;
    let mine = query.mine.as_deref() == Some("true") && actor.is_authenticated();
    let books = state
        .catalog
        .list_books(&actor, mine)
        .await
        .map_err(|err| Failure::new(err, "/"))?;
    Ok(render::book_list_page(&actor, &books, mine).into_response())
}

pub async fn book_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}");
    let actor = actor_or(&state, &headers, &path).await?;
    let detail = state
        .catalog
        .book_detail(&actor, id)
        .await
        .map_err(|err| Failure::new(err, path))?;
    let can_edit = policy::can_mutate_book(&actor, &detail.book);
    Ok(render::book_detail_page(&actor, &detail, can_edit).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let actor = actor_or(&state, &headers, "/search").await?;
    let q = query.q.unwrap_or_default();
    let results = state
        .catalog
        .search(&q)
        .await
        .map_err(|err| Failure::new(err, "/search"))?;
    Ok(render::search_page(&actor, &q, &results).into_response())
}

// ---- book create / edit / delete ----

pub async fn book_add_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let actor = actor_or(&state, &headers, ADD_BOOK_PATH).await?;
    if !actor.is_authenticated() {
        return Ok(auth::login_redirect(ADD_BOOK_PATH));
    }
    book_form(&state, &actor, "Add book", ADD_BOOK_PATH, &BookDraft::default(), &ValidationErrors::new()).await
}

pub async fn book_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Failure> {
    let actor = actor_or(&state, &headers, ADD_BOOK_PATH).await?;
    let draft = forms::book_draft(&body);

    match state.catalog.create_book(&actor, &draft).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(Error::Validation(errors)) => {
            book_form(&state, &actor, "Add book", ADD_BOOK_PATH, &draft, &errors).await
        }
        Err(err) => Err(Failure::new(err, ADD_BOOK_PATH)),
    }
}

pub async fn book_edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/edit");
    let actor = actor_or(&state, &headers, &path).await?;
    let book = state
        .catalog
        .book_for_edit(&actor, id)
        .await
        .map_err(|err| Failure::new(err, path.clone()))?;
    book_form(&state, &actor, "Edit book", &path, &draft_of(&book), &ValidationErrors::new()).await
}

pub async fn book_edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/edit");
    let actor = actor_or(&state, &headers, &path).await?;
    let draft = forms::book_draft(&body);

    match state.catalog.edit_book(&actor, id, &draft).await {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(Error::Validation(errors)) => {
            book_form(&state, &actor, "Edit book", &path, &draft, &errors).await
        }
        Err(err) => Err(Failure::new(err, path)),
    }
}

async fn book_form(
    state: &AppState,
    actor: &Actor,
    heading: &str,
    action: &str,
    draft: &BookDraft,
    errors: &ValidationErrors,
) -> Result<Response, Failure> {
    let authors = state
        .catalog
        .authors()
        .await
        .map_err(|err| Failure::new(err, action))?;
    let categories = state
        .catalog
        .categories()
        .await
        .map_err(|err| Failure::new(err, action))?;
    Ok(render::book_form_page(actor, heading, action, draft, &authors, &categories, errors)
        .into_response())
}

pub async fn book_delete_confirm(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/delete");
    let actor = actor_or(&state, &headers, &path).await?;

    match state.catalog.book_for_delete(&actor, id).await {
        Ok(book) => Ok(render::book_confirm_delete_page(&actor, &book).into_response()),
        // A non-owner is bounced to the detail page, no questions asked.
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&format!("/books/{id}")).into_response()),
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn book_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/delete");
    let actor = actor_or(&state, &headers, &path).await?;

    match state.catalog.delete_book(&actor, id).await {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&format!("/books/{id}")).into_response()),
        Err(err) => Err(Failure::new(err, path)),
    }
}

// ---- chapters ----

pub async fn chapter_add_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/add-chapter");
    let actor = actor_or(&state, &headers, &path).await?;

    match state.catalog.book_for_chapter_add(&actor, id).await {
        Ok(book) => Ok(render::chapter_form_page(
            &actor,
            &book,
            &path,
            &ChapterDraft::default(),
            &ValidationErrors::new(),
        )
        .into_response()),
        Err(Error::PermissionDenied(_)) => {
            Ok(render::access_denied_page(&actor, CHAPTER_DENIED_MESSAGE).into_response())
        }
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn chapter_add(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/add-chapter");
    let actor = actor_or(&state, &headers, &path).await?;
    let draft = forms::chapter_draft(&body);

    match state.catalog.add_chapter(&actor, id, &draft).await {
        Ok(chapter) => Ok(Redirect::to(&format!("/books/{}", chapter.book_id)).into_response()),
        Err(Error::PermissionDenied(_)) => {
            Ok(render::access_denied_page(&actor, CHAPTER_DENIED_MESSAGE).into_response())
        }
        Err(Error::Validation(errors)) => {
            let book = state
                .catalog
                .book_for_chapter_add(&actor, id)
                .await
                .map_err(|err| Failure::new(err, path.clone()))?;
            Ok(render::chapter_form_page(&actor, &book, &path, &draft, &errors).into_response())
        }
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn chapter_edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/chapters/{id}/edit");
    let actor = actor_or(&state, &headers, &path).await?;
    let chapter = state
        .catalog
        .chapter(id)
        .await
        .map_err(|err| Failure::new(err, path.clone()))?;
    let detail_path = format!("/books/{}", chapter.book_id);

    match state.catalog.chapter_for_mutation(&actor, id).await {
        Ok((chapter, book)) => {
            let draft = ChapterDraft {
                title: chapter.title,
                content: chapter.content,
            };
            Ok(render::chapter_form_page(&actor, &book, &path, &draft, &ValidationErrors::new())
                .into_response())
        }
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&detail_path).into_response()),
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn chapter_edit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Failure> {
    let path = format!("/chapters/{id}/edit");
    let actor = actor_or(&state, &headers, &path).await?;
    let chapter = state
        .catalog
        .chapter(id)
        .await
        .map_err(|err| Failure::new(err, path.clone()))?;
    let detail_path = format!("/books/{}", chapter.book_id);
    let draft = forms::chapter_draft(&body);

    match state.catalog.edit_chapter(&actor, id, &draft).await {
        Ok(_) => Ok(Redirect::to(&detail_path).into_response()),
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&detail_path).into_response()),
        Err(Error::Validation(errors)) => {
            let (_, book) = state
                .catalog
                .chapter_for_mutation(&actor, id)
                .await
                .map_err(|err| Failure::new(err, path.clone()))?;
            Ok(render::chapter_form_page(&actor, &book, &path, &draft, &errors).into_response())
        }
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn chapter_delete_confirm(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/chapters/{id}/delete");
    let actor = actor_or(&state, &headers, &path).await?;
    let chapter = state
        .catalog
        .chapter(id)
        .await
        .map_err(|err| Failure::new(err, path.clone()))?;
    let detail_path = format!("/books/{}", chapter.book_id);

    match state.catalog.chapter_for_mutation(&actor, id).await {
        Ok((chapter, _book)) => {
            Ok(render::chapter_confirm_delete_page(&actor, &chapter).into_response())
        }
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&detail_path).into_response()),
        Err(err) => Err(Failure::new(err, path)),
    }
}

pub async fn chapter_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/chapters/{id}/delete");
    let actor = actor_or(&state, &headers, &path).await?;
    let chapter = state
        .catalog
        .chapter(id)
        .await
        .map_err(|err| Failure::new(err, path.clone()))?;
    let detail_path = format!("/books/{}", chapter.book_id);

    match state.catalog.delete_chapter(&actor, id).await {
        Ok(book_id) => Ok(Redirect::to(&format!("/books/{book_id}")).into_response()),
        Err(Error::PermissionDenied(_)) => Ok(Redirect::to(&detail_path).into_response()),
        Err(err) => Err(Failure::new(err, path)),
    }
}

// ---- favorites & profile ----

pub async fn favorite_add(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/favorite");
    let actor = actor_or(&state, &headers, &path).await?;
    let book_id = state
        .catalog
        .add_favorite(&actor, id)
        .await
        .map_err(|err| Failure::new(err, path))?;
    Ok(Redirect::to(&format!("/books/{book_id}")).into_response())
}

pub async fn favorite_remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let path = format!("/books/{id}/unfavorite");
    let actor = actor_or(&state, &headers, &path).await?;
    let book_id = state
        .catalog
        .remove_favorite(&actor, id)
        .await
        .map_err(|err| Failure::new(err, path))?;
    Ok(Redirect::to(&format!("/books/{book_id}")).into_response())
}

pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let actor = actor_or(&state, &headers, "/profile").await?;
    let favorites = state
        .catalog
        .favorites(&actor)
        .await
        .map_err(|err| Failure::new(err, "/profile"))?;
    let username = actor.user().map(|u| u.username.clone()).unwrap_or_default();
    Ok(render::profile_page(&actor, &username, &favorites).into_response())
}

// ---- authors ----

pub async fn author_add_form(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    const PATH: &str = "/authors/add";
    let actor = actor_or(&state, &headers, PATH).await?;
    if !actor.is_authenticated() {
        return Ok(auth::login_redirect(PATH));
    }
    Ok(render::author_form_page(&actor, "", &ValidationErrors::new()).into_response())
}

pub async fn author_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawForm(body): RawForm,
) -> Result<Response, Failure> {
    const PATH: &str = "/authors/add";
    let actor = actor_or(&state, &headers, PATH).await?;
    let name = forms::author_name(&body);

    match state.catalog.add_author(&actor, &name).await {
        Ok(_) => Ok(render::author_added_page().into_response()),
        Err(Error::Validation(errors)) => {
            Ok(render::author_form_page(&actor, &name, &errors).into_response())
        }
        Err(err) => Err(Failure::new(err, PATH)),
    }
}
