use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result, ValidationErrors};
use crate::model::{Actor, Author, Book, BookDraft, Category, Chapter, ChapterDraft};
use crate::policy;
use crate::store::CatalogStore;

pub const DUPLICATE_BOOK_MESSAGE: &str =
    "a book with exactly these authors is already in the catalog";

const REQUIRED_MESSAGE: &str = "this field is required";
const MAX_TITLE_LEN: usize = 255;

/// Everything the book detail page needs in one call.
#[derive(Debug, Clone)]
pub struct BookDetail {
    pub book: Book,
    pub chapters: Vec<Chapter>,
    pub is_favorite: bool,
}

/// The ownership-gated mutation and search core, layered over a
/// [`CatalogStore`]. Handlers decide how each error variant is presented;
/// this type decides whether an operation happens at all.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    // ---- listing & search ----

    /// `mine == true` for a signed-in actor lists their own books, newest
    /// first; everything else is the full catalog, title ascending.
    pub async fn list_books(&self, actor: &Actor, mine: bool) -> Result<Vec<Book>> {
        match actor.user_id() {
            Some(user_id) if mine => self.store.list_books_by_owner(user_id).await,
            _ => self.store.list_books_by_title().await,
        }
    }

    pub async fn book_detail(&self, actor: &Actor, id: i64) -> Result<BookDetail> {
        let book = self.store.get_book(id).await?.ok_or(Error::NotFound("book"))?;
        let chapters = self.store.list_chapters(book.id).await?;
        let is_favorite = match actor.user_id() {
            Some(user_id) => self.store.is_favorite(user_id, book.id).await?,
            None => false,
        };
        Ok(BookDetail {
            book,
            chapters,
            is_favorite,
        })
    }

    /// An empty query is an empty result, never the whole catalog.
    pub async fn search(&self, query: &str) -> Result<Vec<Book>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.store.search_books(query).await
    }

    // ---- books ----

    pub async fn create_book(&self, actor: &Actor, draft: &BookDraft) -> Result<Book> {
        let user = actor.user().ok_or(Error::Unauthenticated)?;
        let draft = normalize(draft);
        self.validate_book_draft(&draft).await?;

        let candidate: HashSet<i64> = draft.author_ids.iter().copied().collect();
        let existing = self.store.list_author_id_sets().await?;
        if is_duplicate(&candidate, &existing) {
            let mut errors = ValidationErrors::new();
            errors.add_form(DUPLICATE_BOOK_MESSAGE);
            return Err(Error::Validation(errors));
        }

        self.store.create_book(&draft, user.id).await
    }

    /// Owner-scoped lookup: a non-owner asking for the edit form gets
    /// NotFound, not PermissionDenied — foreign books are invisible here.
    pub async fn book_for_edit(&self, actor: &Actor, id: i64) -> Result<Book> {
        let user = actor.user().ok_or(Error::Unauthenticated)?;
        self.store
            .get_book_owned(id, user.id)
            .await?
            .ok_or(Error::NotFound("book"))
    }

    /// The duplicate guard does not re-run on edit, and ownership is never
    /// transferable: the draft's fields replace the book's, nothing else.
    pub async fn edit_book(&self, actor: &Actor, id: i64, draft: &BookDraft) -> Result<()> {
        let book = self.book_for_edit(actor, id).await?;
        let draft = normalize(draft);
        self.validate_book_draft(&draft).await?;
        self.store.update_book(book.id, &draft).await
    }

    /// Lookup by id alone; ownership is checked afterwards so a non-owner
    /// gets PermissionDenied (which the route turns into a silent redirect
    /// to the detail page) rather than NotFound.
    pub async fn book_for_delete(&self, actor: &Actor, id: i64) -> Result<Book> {
        if !actor.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        let book = self.store.get_book(id).await?.ok_or(Error::NotFound("book"))?;
        if !policy::can_mutate_book(actor, &book) {
            return Err(Error::PermissionDenied("book"));
        }
        Ok(book)
    }

    pub async fn delete_book(&self, actor: &Actor, id: i64) -> Result<()> {
        let book = self.book_for_delete(actor, id).await?;
        self.store.delete_book(book.id).await
    }

    // ---- chapters ----

    /// Policy gate shared by the add-chapter form and submission.
    pub async fn book_for_chapter_add(&self, actor: &Actor, book_id: i64) -> Result<Book> {
        if !actor.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or(Error::NotFound("book"))?;
        if !policy::can_mutate_chapter(actor, &book) {
            return Err(Error::PermissionDenied("chapter"));
        }
        Ok(book)
    }

    pub async fn add_chapter(
        &self,
        actor: &Actor,
        book_id: i64,
        draft: &ChapterDraft,
    ) -> Result<Chapter> {
        let book = self.book_for_chapter_add(actor, book_id).await?;
        let draft = normalize_chapter(draft);
        validate_chapter_draft(&draft)?;
        self.store.add_chapter(book.id, &draft).await
    }

    /// Ungated read; chapters are public on the detail page anyway.
    pub async fn chapter(&self, id: i64) -> Result<Chapter> {
        self.store
            .get_chapter(id)
            .await?
            .ok_or(Error::NotFound("chapter"))
    }

    /// Chapter plus its owning book, with the same uniform policy gate as
    /// add. Edit and delete entry points both go through here.
    pub async fn chapter_for_mutation(
        &self,
        actor: &Actor,
        chapter_id: i64,
    ) -> Result<(Chapter, Book)> {
        if !actor.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        let chapter = self
            .store
            .get_chapter(chapter_id)
            .await?
            .ok_or(Error::NotFound("chapter"))?;
        let book = self
            .store
            .get_book(chapter.book_id)
            .await?
            .ok_or(Error::NotFound("book"))?;
        if !policy::can_mutate_chapter(actor, &book) {
            return Err(Error::PermissionDenied("chapter"));
        }
        Ok((chapter, book))
    }

    pub async fn edit_chapter(
        &self,
        actor: &Actor,
        chapter_id: i64,
        draft: &ChapterDraft,
    ) -> Result<Chapter> {
        let (chapter, _book) = self.chapter_for_mutation(actor, chapter_id).await?;
        let draft = normalize_chapter(draft);
        validate_chapter_draft(&draft)?;
        self.store.update_chapter(chapter.id, &draft).await?;
        Ok(Chapter {
            title: draft.title,
            content: draft.content,
            ..chapter
        })
    }

    /// Returns the owning book's id so the route can redirect to it.
    pub async fn delete_chapter(&self, actor: &Actor, chapter_id: i64) -> Result<i64> {
        let (chapter, book) = self.chapter_for_mutation(actor, chapter_id).await?;
        self.store.delete_chapter(chapter.id).await?;
        Ok(book.id)
    }

    // ---- favorites ----

    pub async fn add_favorite(&self, actor: &Actor, book_id: i64) -> Result<i64> {
        let user = actor.user().ok_or(Error::Unauthenticated)?;
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or(Error::NotFound("book"))?;
        self.store.add_favorite(user.id, book.id).await?;
        Ok(book.id)
    }

    pub async fn remove_favorite(&self, actor: &Actor, book_id: i64) -> Result<i64> {
        let user = actor.user().ok_or(Error::Unauthenticated)?;
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or(Error::NotFound("book"))?;
        self.store.remove_favorite(user.id, book.id).await?;
        Ok(book.id)
    }

    pub async fn favorites(&self, actor: &Actor) -> Result<Vec<Book>> {
        let user = actor.user().ok_or(Error::Unauthenticated)?;
        self.store.list_favorites(user.id).await
    }

    // ---- authors & categories ----

    pub async fn add_author(&self, actor: &Actor, name: &str) -> Result<Author> {
        if !actor.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        let name = name.trim();
        let mut errors = ValidationErrors::new();
        if name.is_empty() {
            errors.add_field("name", REQUIRED_MESSAGE);
        } else if name.chars().count() > MAX_TITLE_LEN {
            errors.add_field("name", "keep the name under 256 characters");
        }
        errors.into_result()?;
        self.store.create_author(name).await
    }

    pub async fn authors(&self) -> Result<Vec<Author>> {
        self.store.list_authors().await
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    // ---- validation ----

    async fn validate_book_draft(&self, draft: &BookDraft) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if draft.title.is_empty() {
            errors.add_field("title", REQUIRED_MESSAGE);
        } else if draft.title.chars().count() > MAX_TITLE_LEN {
            errors.add_field("title", "keep the title under 256 characters");
        }
        if draft.description.is_empty() {
            errors.add_field("description", REQUIRED_MESSAGE);
        }

        if draft.author_ids.is_empty() {
            errors.add_field("authors", "select at least one author");
        } else {
            let known: HashSet<i64> = self.authors().await?.iter().map(|a| a.id).collect();
            if draft.author_ids.iter().any(|id| !known.contains(id)) {
                errors.add_field("authors", "select a valid author");
            }
        }

        if draft.category_ids.is_empty() {
            errors.add_field("categories", "select at least one category");
        } else {
            let known: HashSet<i64> = self.categories().await?.iter().map(|c| c.id).collect();
            if draft.category_ids.iter().any(|id| !known.contains(id)) {
                errors.add_field("categories", "select a valid category");
            }
        }

        errors.into_result()
    }
}

/// Exact set equality, order-irrelevant. A subset or superset of an
/// existing book's authors is not a duplicate.
fn is_duplicate(candidate: &HashSet<i64>, existing: &[HashSet<i64>]) -> bool {
    existing.iter().any(|set| set == candidate)
}

fn normalize(draft: &BookDraft) -> BookDraft {
    let mut normalized = draft.clone();
    normalized.title = normalized.title.trim().to_owned();
    normalized.description = normalized.description.trim().to_owned();
    normalized.cover = normalized
        .cover
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);
    normalized
}

fn normalize_chapter(draft: &ChapterDraft) -> ChapterDraft {
    ChapterDraft {
        title: draft.title.trim().to_owned(),
        content: draft.content.trim().to_owned(),
    }
}

fn validate_chapter_draft(draft: &ChapterDraft) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if draft.title.is_empty() {
        errors.add_field("title", REQUIRED_MESSAGE);
    } else if draft.title.chars().count() > MAX_TITLE_LEN {
        errors.add_field("title", "keep the title under 256 characters");
    }
    if draft.content.is_empty() {
        errors.add_field("content", REQUIRED_MESSAGE);
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sets_are_duplicates_regardless_of_order() {
        let candidate = HashSet::from([3, 1, 2]);
        let existing = vec![HashSet::from([1, 2, 3])];
        assert!(is_duplicate(&candidate, &existing));
    }

    #[test]
    fn subset_and_superset_are_not_duplicates() {
        let existing = vec![HashSet::from([1, 2, 3])];
        assert!(!is_duplicate(&HashSet::from([1, 2]), &existing));
        assert!(!is_duplicate(&HashSet::from([1, 2, 3, 4]), &existing));
    }

    #[test]
    fn empty_store_has_no_duplicates() {
        assert!(!is_duplicate(&HashSet::from([1]), &[]));
    }

    #[test]
    fn normalize_trims_and_drops_blank_cover() {
        let draft = BookDraft {
            title: "  Title  ".to_owned(),
            description: " desc ".to_owned(),
            cover: Some("   ".to_owned()),
            author_ids: vec![1],
            category_ids: vec![1],
        };
        let normalized = normalize(&draft);
        assert_eq!(normalized.title, "Title");
        assert_eq!(normalized.description, "desc");
        assert_eq!(normalized.cover, None);
    }

    #[test]
    fn blank_chapter_is_rejected() {
        let err = validate_chapter_draft(&ChapterDraft::default()).unwrap_err();
        let Error::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.field_messages("title").next().is_some());
        assert!(errors.field_messages("content").next().is_some());
    }
}
