use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A catalogued book with its hydrated many-to-many associations.
///
/// `owner_id` is `None` when the owning account was deleted; the book
/// itself survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Opaque reference to a stored cover blob, e.g. `covers/xyz.jpg`.
    pub cover: Option<String>,
    pub owner_id: Option<i64>,
    pub authors: Vec<Author>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Chapter {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub book_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// The identity behind a request, as supplied by the authentication
/// collaborator. Anonymous requests still reach read-only views.
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    Authenticated(User),
}

impl Actor {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Actor::Authenticated(user) => Some(user),
            Actor::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|user| user.id)
    }
}

/// Fields of the book form, before validation.
#[derive(Debug, Clone, Default)]
pub struct BookDraft {
    pub title: String,
    pub description: String,
    pub cover: Option<String>,
    pub author_ids: Vec<i64>,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterDraft {
    pub title: String,
    pub content: String,
}
