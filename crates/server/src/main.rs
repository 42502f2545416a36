//! readit entry point.
//!
//! Loads configuration, connects to the database and applies migrations,
//! then prints the front page (or one sub, when a name is given) with
//! scores projected for an anonymous reader.
//!
//! ```text
//! readit            # newest posts
//! readit <sub>      # one sub and its posts
//! ```

use std::sync::Arc;

use readit_common::Config;
use readit_core::{PostService, SubService};
use readit_db::repositories::{
    CommentRepository, PostRepository, SubRepository, VoteRepository,
};
use sea_orm::DatabaseConnection;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn post_service(config: &Config, db: &Arc<DatabaseConnection>) -> PostService {
    PostService::new(
        PostRepository::new(Arc::clone(db)),
        CommentRepository::new(Arc::clone(db)),
        SubRepository::new(Arc::clone(db)),
        VoteRepository::new(Arc::clone(db)),
    )
    .with_base_path(config.site.base_path.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readit=info,readit_core=info,readit_db=info".into()),
        )
        .init();

    let config = Config::load()?;

    let db = readit_db::init(&config).await?;
    readit_db::migrate(&db).await?;
    let db = Arc::new(db);

    let posts = post_service(&config, &db);
    let output = match std::env::args().nth(1) {
        Some(name) => {
            let subs = SubService::new(
                SubRepository::new(Arc::clone(&db)),
                PostRepository::new(Arc::clone(&db)),
                posts,
            );
            let sub = subs.get_sub(&name, None).await?;
            info!(sub = %sub.sub.name, posts = sub.post_count, "Loaded sub");
            serde_json::to_string_pretty(&sub)?
        }
        None => {
            let listing = posts.list_posts(None).await?;
            info!(posts = listing.len(), "Loaded front page");
            serde_json::to_string_pretty(&listing)?
        }
    };

    println!("{output}");
    Ok(())
}
