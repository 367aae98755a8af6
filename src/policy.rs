use crate::model::{Actor, Book};

/// True iff the actor is signed in and owns the book. Books whose owner
/// account was deleted (`owner_id == None`) are mutable by nobody.
pub fn can_mutate_book(actor: &Actor, book: &Book) -> bool {
    match actor.user_id() {
        Some(user_id) => book.owner_id == Some(user_id),
        None => false,
    }
}

/// Chapter rights follow the owning book. One predicate for create, edit
/// and delete; no entry point re-derives the rule.
pub fn can_mutate_chapter(actor: &Actor, owning_book: &Book) -> bool {
    can_mutate_book(actor, owning_book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn book(owner_id: Option<i64>) -> Book {
        Book {
            id: 1,
            title: "t".to_owned(),
            description: "d".to_owned(),
            cover: None,
            owner_id,
            authors: Vec::new(),
            categories: Vec::new(),
        }
    }

    fn user(id: i64) -> Actor {
        Actor::Authenticated(User {
            id,
            username: format!("user{id}"),
        })
    }

    #[test]
    fn owner_may_mutate() {
        assert!(can_mutate_book(&user(7), &book(Some(7))));
    }

    #[test]
    fn non_owner_may_not_mutate() {
        assert!(!can_mutate_book(&user(8), &book(Some(7))));
    }

    #[test]
    fn anonymous_may_not_mutate() {
        assert!(!can_mutate_book(&Actor::Anonymous, &book(Some(7))));
    }

    #[test]
    fn orphaned_book_is_mutable_by_nobody() {
        assert!(!can_mutate_book(&user(7), &book(None)));
        assert!(!can_mutate_book(&Actor::Anonymous, &book(None)));
    }

    #[test]
    fn chapter_rights_follow_the_book() {
        let owned = book(Some(7));
        assert!(can_mutate_chapter(&user(7), &owned));
        assert!(!can_mutate_chapter(&user(8), &owned));
        assert!(!can_mutate_chapter(&Actor::Anonymous, &owned));
    }
}
