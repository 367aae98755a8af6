use std::collections::HashSet;

use async_trait::async_trait;

use crate::db::Database;
use crate::error::Result;
use crate::model::{Author, Book, BookDraft, Category, Chapter, ChapterDraft};

/// Persistence operations of the catalog.
///
/// Lookup scoping is part of the contract: `get_book_owned` is how the
/// edit path hides foreign books, while `get_book` (plain id lookup) is
/// what detail and delete use.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_author(&self, name: &str) -> Result<Author>;
    async fn list_authors(&self) -> Result<Vec<Author>>;

    async fn create_category(&self, name: &str) -> Result<Category>;
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn create_book(&self, draft: &BookDraft, owner_id: i64) -> Result<Book>;
    async fn get_book(&self, id: i64) -> Result<Option<Book>>;
    async fn get_book_owned(&self, id: i64, owner_id: i64) -> Result<Option<Book>>;
    async fn update_book(&self, id: i64, draft: &BookDraft) -> Result<()>;
    async fn delete_book(&self, id: i64) -> Result<()>;
    async fn list_books_by_title(&self) -> Result<Vec<Book>>;
    async fn list_books_by_owner(&self, owner_id: i64) -> Result<Vec<Book>>;
    /// Author-id set of every book in the store, for the duplicate guard.
    async fn list_author_id_sets(&self) -> Result<Vec<HashSet<i64>>>;

    async fn add_chapter(&self, book_id: i64, draft: &ChapterDraft) -> Result<Chapter>;
    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>>;
    async fn update_chapter(&self, id: i64, draft: &ChapterDraft) -> Result<()>;
    async fn delete_chapter(&self, id: i64) -> Result<()>;
    async fn list_chapters(&self, book_id: i64) -> Result<Vec<Chapter>>;

    async fn add_favorite(&self, user_id: i64, book_id: i64) -> Result<()>;
    async fn remove_favorite(&self, user_id: i64, book_id: i64) -> Result<()>;
    async fn is_favorite(&self, user_id: i64, book_id: i64) -> Result<bool>;
    /// The user's favorite books, title ascending.
    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Book>>;

    async fn search_books(&self, query: &str) -> Result<Vec<Book>>;
}

#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    db: Database,
}

impl SqliteCatalogStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn hydrate(&self, row: BookRow) -> Result<Book> {
        let authors = sqlx::query_as::<_, Author>(
            "SELECT a.id, a.name FROM authors a \
             JOIN book_authors ba ON ba.author_id = a.id \
             WHERE ba.book_id = ? ORDER BY a.name",
        )
        .bind(row.id)
        .fetch_all(self.db.pool())
        .await?;

        let categories = sqlx::query_as::<_, Category>(
            "SELECT c.id, c.name FROM categories c \
             JOIN book_categories bc ON bc.category_id = c.id \
             WHERE bc.book_id = ? ORDER BY c.name",
        )
        .bind(row.id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(Book {
            id: row.id,
            title: row.title,
            description: row.description,
            cover: row.cover,
            owner_id: row.owner_id,
            authors,
            categories,
        })
    }

    async fn hydrate_all(&self, rows: Vec<BookRow>) -> Result<Vec<Book>> {
        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            books.push(self.hydrate(row).await?);
        }
        Ok(books)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    description: String,
    cover: Option<String>,
    owner_id: Option<i64>,
}

const BOOK_COLUMNS: &str = "id, title, description, cover, owner_id";

/// Escape `%`, `_` and the escape character itself so user input matches
/// literally inside a LIKE pattern.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("%{}%", escaped.to_lowercase())
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn create_author(&self, name: &str) -> Result<Author> {
        let result = sqlx::query("INSERT INTO authors (name) VALUES (?)")
            .bind(name)
            .execute(self.db.pool())
            .await?;

        Ok(Author {
            id: result.last_insert_rowid(),
            name: name.to_owned(),
        })
    }

    async fn list_authors(&self) -> Result<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>("SELECT id, name FROM authors ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;
        Ok(authors)
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        let result = sqlx::query("INSERT INTO categories (name) VALUES (?)")
            .bind(name)
            .execute(self.db.pool())
            .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.to_owned(),
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(self.db.pool())
                .await?;
        Ok(categories)
    }

    async fn create_book(&self, draft: &BookDraft, owner_id: i64) -> Result<Book> {
        // One transaction: a book must never land without its join rows.
        let mut tx = self.db.pool().begin().await?;

        let result = sqlx::query(
            "INSERT INTO books (title, description, cover, owner_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.cover)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;
        let book_id = result.last_insert_rowid();

        for author_id in &draft.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                .bind(book_id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }
        for category_id in &draft.category_ids {
            sqlx::query("INSERT INTO book_categories (book_id, category_id) VALUES (?, ?)")
                .bind(book_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        match self.get_book(book_id).await? {
            Some(book) => Ok(book),
            None => Err(sqlx::Error::RowNotFound.into()),
        }
    }

    async fn get_book(&self, id: i64) -> Result<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_book_owned(&self, id: i64, owner_id: i64) -> Result<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_book(&self, id: i64, draft: &BookDraft) -> Result<()> {
        // Owner is deliberately untouched: ownership is not transferable.
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("UPDATE books SET title = ?, description = ?, cover = ? WHERE id = ?")
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.cover)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM book_authors WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for author_id in &draft.author_ids {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?, ?)")
                .bind(id)
                .bind(author_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM book_categories WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for category_id in &draft.category_ids {
            sqlx::query("INSERT INTO book_categories (book_id, category_id) VALUES (?, ?)")
                .bind(id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_book(&self, id: i64) -> Result<()> {
        // Chapters, favorites and join rows go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn list_books_by_title(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY title"
        ))
        .fetch_all(self.db.pool())
        .await?;
        self.hydrate_all(rows).await
    }

    async fn list_books_by_owner(&self, owner_id: i64) -> Result<Vec<Book>> {
        // Most recently created first.
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE owner_id = ? ORDER BY id DESC"
        ))
        .bind(owner_id)
        .fetch_all(self.db.pool())
        .await?;
        self.hydrate_all(rows).await
    }

    async fn list_author_id_sets(&self) -> Result<Vec<HashSet<i64>>> {
        let pairs: Vec<(i64, i64)> =
            sqlx::query_as("SELECT book_id, author_id FROM book_authors ORDER BY book_id")
                .fetch_all(self.db.pool())
                .await?;

        let mut sets: Vec<(i64, HashSet<i64>)> = Vec::new();
        for (book_id, author_id) in pairs {
            match sets.last_mut() {
                Some((id, set)) if *id == book_id => {
                    set.insert(author_id);
                }
                _ => {
                    sets.push((book_id, HashSet::from([author_id])));
                }
            }
        }
        Ok(sets.into_iter().map(|(_, set)| set).collect())
    }

    async fn add_chapter(&self, book_id: i64, draft: &ChapterDraft) -> Result<Chapter> {
        let result = sqlx::query("INSERT INTO chapters (title, content, book_id) VALUES (?, ?, ?)")
            .bind(&draft.title)
            .bind(&draft.content)
            .bind(book_id)
            .execute(self.db.pool())
            .await?;

        Ok(Chapter {
            id: result.last_insert_rowid(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            book_id,
        })
    }

    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let chapter = sqlx::query_as::<_, Chapter>(
            "SELECT id, title, content, book_id FROM chapters WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(chapter)
    }

    async fn update_chapter(&self, id: i64, draft: &ChapterDraft) -> Result<()> {
        sqlx::query("UPDATE chapters SET title = ?, content = ? WHERE id = ?")
            .bind(&draft.title)
            .bind(&draft.content)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn delete_chapter(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM chapters WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn list_chapters(&self, book_id: i64) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            "SELECT id, title, content, book_id FROM chapters WHERE book_id = ? ORDER BY id",
        )
        .bind(book_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(chapters)
    }

    async fn add_favorite(&self, user_id: i64, book_id: i64) -> Result<()> {
        // Idempotent: the composite primary key absorbs repeats.
        sqlx::query("INSERT OR IGNORE INTO favorites (user_id, book_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(book_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: i64, book_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM favorites WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn is_favorite(&self, user_id: i64, book_id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM favorites WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(found.is_some())
    }

    async fn list_favorites(&self, user_id: i64) -> Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT b.id, b.title, b.description, b.cover, b.owner_id \
             FROM books b \
             JOIN favorites f ON f.book_id = b.id \
             WHERE f.user_id = ? ORDER BY b.title",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;
        self.hydrate_all(rows).await
    }

    async fn search_books(&self, query: &str) -> Result<Vec<Book>> {
        // Case-insensitive substring match over five fields, deduplicated,
        // in stable id order. LOWER() folds ASCII only, same as LIKE.
        let pattern = like_pattern(query);
        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT DISTINCT b.id, b.title, b.description, b.cover, b.owner_id \
             FROM books b \
             LEFT JOIN book_authors ba ON ba.book_id = b.id \
             LEFT JOIN authors a ON a.id = ba.author_id \
             LEFT JOIN chapters c ON c.book_id = b.id \
             WHERE LOWER(b.title) LIKE ?1 ESCAPE '\\' \
                OR LOWER(b.description) LIKE ?1 ESCAPE '\\' \
                OR LOWER(a.name) LIKE ?1 ESCAPE '\\' \
                OR LOWER(c.title) LIKE ?1 ESCAPE '\\' \
                OR LOWER(c.content) LIKE ?1 ESCAPE '\\' \
             ORDER BY b.id",
        )
        .bind(pattern)
        .fetch_all(self.db.pool())
        .await?;
        self.hydrate_all(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100% rust"), "%100\\% rust%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("C\\D"), "%c\\\\d%");
    }

    #[test]
    fn like_pattern_lowercases() {
        assert_eq!(like_pattern("Rust"), "%rust%");
    }

    async fn store() -> SqliteCatalogStore {
        let db = Database::open_in_memory().await.unwrap();
        SqliteCatalogStore::new(db)
    }

    async fn seed_user(store: &SqliteCatalogStore, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, 'x')")
            .bind(username)
            .execute(store.db.pool())
            .await
            .unwrap()
            .last_insert_rowid()
    }

    fn draft(title: &str, author_ids: Vec<i64>, category_ids: Vec<i64>) -> BookDraft {
        BookDraft {
            title: title.to_owned(),
            description: "a description".to_owned(),
            cover: None,
            author_ids,
            category_ids,
        }
    }

    #[tokio::test]
    async fn create_book_persists_join_rows() {
        let store = store().await;
        let owner = seed_user(&store, "owner").await;
        let author = store.create_author("Author A").await.unwrap();
        let category = store.create_category("Fiction").await.unwrap();

        let book = store
            .create_book(&draft("Title", vec![author.id], vec![category.id]), owner)
            .await
            .unwrap();

        assert_eq!(book.owner_id, Some(owner));
        assert_eq!(book.authors, vec![author]);
        assert_eq!(book.categories, vec![category]);
    }

    #[tokio::test]
    async fn update_book_replaces_associations_and_keeps_owner() {
        let store = store().await;
        let owner = seed_user(&store, "owner").await;
        let first = store.create_author("First").await.unwrap();
        let second = store.create_author("Second").await.unwrap();
        let category = store.create_category("Fiction").await.unwrap();

        let book = store
            .create_book(&draft("Old", vec![first.id], vec![category.id]), owner)
            .await
            .unwrap();

        store
            .update_book(book.id, &draft("New", vec![second.id], vec![category.id]))
            .await
            .unwrap();

        let updated = store.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.authors, vec![second]);
        assert_eq!(updated.owner_id, Some(owner));
    }

    #[tokio::test]
    async fn owned_lookup_hides_foreign_books() {
        let store = store().await;
        let owner = seed_user(&store, "owner").await;
        let other = seed_user(&store, "other").await;
        let author = store.create_author("A").await.unwrap();
        let category = store.create_category("C").await.unwrap();

        let book = store
            .create_book(&draft("Mine", vec![author.id], vec![category.id]), owner)
            .await
            .unwrap();

        assert!(store.get_book_owned(book.id, owner).await.unwrap().is_some());
        assert!(store.get_book_owned(book.id, other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn author_id_sets_cover_every_book() {
        let store = store().await;
        let owner = seed_user(&store, "owner").await;
        let a = store.create_author("A").await.unwrap();
        let b = store.create_author("B").await.unwrap();
        let category = store.create_category("C").await.unwrap();

        store
            .create_book(&draft("One", vec![a.id], vec![category.id]), owner)
            .await
            .unwrap();
        store
            .create_book(&draft("Two", vec![a.id, b.id], vec![category.id]), owner)
            .await
            .unwrap();

        let sets = store.list_author_id_sets().await.unwrap();
        assert_eq!(sets.len(), 2);
        assert!(sets.contains(&HashSet::from([a.id])));
        assert!(sets.contains(&HashSet::from([a.id, b.id])));
    }
}
