//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod post;
pub mod sub;
pub mod user;
pub mod vote;

pub use comment::Entity as Comment;
pub use post::Entity as Post;
pub use sub::Entity as Sub;
pub use user::Entity as User;
pub use vote::Entity as Vote;
