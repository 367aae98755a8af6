use anyhow::Context as _;

use crate::cli::{AdminCommand, AdminListArgs, CategoryAddArgs, CategoryCommand};
use crate::db::Database;
use crate::store::{CatalogStore as _, SqliteCatalogStore};

/// A resource exposed to the management CLI: its name and the columns the
/// listing shows. Pure configuration; the machinery below is driven by it.
pub struct AdminResource {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

pub const RESOURCES: &[AdminResource] = &[
    AdminResource {
        name: "books",
        columns: &["id", "title", "authors", "categories", "owner"],
    },
    AdminResource {
        name: "authors",
        columns: &["id", "name"],
    },
    AdminResource {
        name: "categories",
        columns: &["id", "name"],
    },
    AdminResource {
        name: "chapters",
        columns: &["id", "title", "book"],
    },
    AdminResource {
        name: "favorites",
        columns: &["user", "book"],
    },
];

pub async fn run(command: AdminCommand) -> anyhow::Result<()> {
    match command {
        AdminCommand::List(args) => list(args).await,
        AdminCommand::Resources => {
            for resource in RESOURCES {
                println!("{}\t{}", resource.name, resource.columns.join(", "));
            }
            Ok(())
        }
        AdminCommand::Category {
            command: CategoryCommand::Add(args),
        } => category_add(args).await,
    }
}

async fn list(args: AdminListArgs) -> anyhow::Result<()> {
    let resource = RESOURCES
        .iter()
        .find(|r| r.name == args.resource)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown resource: {}. expected one of: {}",
                args.resource,
                RESOURCES
                    .iter()
                    .map(|r| r.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;

    let db = Database::open(&args.db).await.context("open database")?;
    let rows = fetch_rows(&db, resource.name).await.context("list records")?;

    if args.json {
        let records: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let object: serde_json::Map<String, serde_json::Value> = resource
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| ((*column).to_owned(), value.clone().into()))
                    .collect();
                serde_json::Value::Object(object)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        println!("{}", resource.columns.join("\t"));
        for row in rows {
            println!("{}", row.join("\t"));
        }
    }

    Ok(())
}

async fn fetch_rows(db: &Database, resource: &str) -> anyhow::Result<Vec<Vec<String>>> {
    let rows = match resource {
        "books" => {
            let records: Vec<(i64, String, String, String, String)> = sqlx::query_as(
                "SELECT b.id, b.title, \
                        COALESCE((SELECT GROUP_CONCAT(a.name, ', ') FROM authors a \
                                  JOIN book_authors ba ON ba.author_id = a.id \
                                  WHERE ba.book_id = b.id), ''), \
                        COALESCE((SELECT GROUP_CONCAT(c.name, ', ') FROM categories c \
                                  JOIN book_categories bc ON bc.category_id = c.id \
                                  WHERE bc.book_id = b.id), ''), \
                        COALESCE(u.username, '') \
                 FROM books b LEFT JOIN users u ON u.id = b.owner_id \
                 ORDER BY b.id",
            )
            .fetch_all(db.pool())
            .await?;
            records
                .into_iter()
                .map(|(id, title, authors, categories, owner)| {
                    vec![id.to_string(), title, authors, categories, owner]
                })
                .collect()
        }
        "authors" => {
            let records: Vec<(i64, String)> =
                sqlx::query_as("SELECT id, name FROM authors ORDER BY id")
                    .fetch_all(db.pool())
                    .await?;
            records
                .into_iter()
                .map(|(id, name)| vec![id.to_string(), name])
                .collect()
        }
        "categories" => {
            let records: Vec<(i64, String)> =
                sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
                    .fetch_all(db.pool())
                    .await?;
            records
                .into_iter()
                .map(|(id, name)| vec![id.to_string(), name])
                .collect()
        }
        "chapters" => {
            let records: Vec<(i64, String, String)> = sqlx::query_as(
                "SELECT c.id, c.title, b.title FROM chapters c \
                 JOIN books b ON b.id = c.book_id ORDER BY c.id",
            )
            .fetch_all(db.pool())
            .await?;
            records
                .into_iter()
                .map(|(id, title, book)| vec![id.to_string(), title, book])
                .collect()
        }
        "favorites" => {
            let records: Vec<(String, String)> = sqlx::query_as(
                "SELECT u.username, b.title FROM favorites f \
                 JOIN users u ON u.id = f.user_id \
                 JOIN books b ON b.id = f.book_id \
                 ORDER BY u.username, b.title",
            )
            .fetch_all(db.pool())
            .await?;
            records
                .into_iter()
                .map(|(user, book)| vec![user, book])
                .collect()
        }
        other => anyhow::bail!("unknown resource: {other}"),
    };
    Ok(rows)
}

async fn category_add(args: CategoryAddArgs) -> anyhow::Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        anyhow::bail!("category name must not be empty");
    }

    let db = Database::open(&args.db).await.context("open database")?;
    let store = SqliteCatalogStore::new(db);
    let category = store.create_category(name).await.context("create category")?;
    println!("created category {} (id {})", category.name, category.id);
    Ok(())
}
