//! Example: Blog Application Migrations
//!
//! This example demonstrates how to use oxide-migrate to manage database
//! schema changes for a blog application with users, posts, and comments.
//!
//! Run with: cargo run --example blog_migrations -p oxide-migrate

use std::sync::Arc;

use oxide_migrate::prelude::*;

const USERS: &str = r#"
# Users of the blog
model User {
    id Serial @pk
    username VarChar(100) @notnull @unique
    email VarChar(255) @notnull
    is_active Boolean @notnull @default(true)
    created_at Timestamp @notnull @default(now)
}
"#;

const POSTS: &str = r#"
model Post {
    id Serial @pk
    author_id Int @notnull @ref(User.id) @onDelete(CASCADE)
    title VarChar(200) @notnull
    status Enum(draft, published) @default(draft)
}

> CREATE INDEX post_author ON "Post" (author_id);
"#;

const COMMENTS: &str = r#"
model Comment {
    id Serial @pk
    post_id Int @notnull @ref(Post.id) @onDelete(CASCADE)
    body Text @notnull
}
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).without_time().init();

    let dir = tempfile::tempdir()?;
    let migrations = dir.path().join("migrations");
    let clock = Arc::new(SystemClock);

    for (name, content) in [("create users", USERS), ("create posts", POSTS)] {
        let path = create_migration_file(&migrations, clock.as_ref(), name, "schema").await?;
        tokio::fs::write(&path, content).await?;
        // Filenames are second-resolution timestamps.
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }

    let url = format!("sqlite://{}?mode=rwc", dir.path().join("blog.db").display());
    let config = RunnerConfig::new(&migrations, Dialect::Sqlite);
    let mut runner = MigrationRunner::from_config(&config, SqlxAdapter::new(url), clock.clone());

    println!("=== Pending SQL ===");
    for planned in runner.plan_up().await? {
        println!("-- {}", planned.filename);
        for sql in planned.statements {
            println!("{sql};");
        }
    }

    let report = runner.up().await?;
    println!("\nBatch {:?} applied: {:?}", report.batch, report.applied);

    let path = create_migration_file(&migrations, clock.as_ref(), "create comments", "schema").await?;
    tokio::fs::write(&path, COMMENTS).await?;
    let report = runner.up().await?;
    println!("Batch {:?} applied: {:?}", report.batch, report.applied);

    println!("\n=== Status ===");
    for status in runner.status().await? {
        println!("{:?} {} (batch {:?})", status.state, status.filename, status.batch);
    }

    let report = runner.down().await?;
    println!("\nRolled back batch {:?}: {:?}", report.batch, report.rolled_back);

    println!("\n=== Ledger ===");
    println!("{}", tokio::fs::read_to_string(&config.ledger_path).await?);

    Ok(())
}
