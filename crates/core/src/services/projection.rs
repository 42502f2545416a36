//! Score projection.
//!
//! Scores and the viewer's own vote are derived from loaded votes on every
//! read and never stored. Everything here is pure.

use std::collections::HashMap;

use readit_db::entities::{comment, post};
use serde::Serialize;

use crate::services::vote::{Vote, VoteTarget};

/// Net score of a target: the sum of its vote values.
#[must_use]
pub fn score(votes: &[Vote]) -> i64 {
    votes.iter().map(|vote| i64::from(vote.value())).sum()
}

/// The viewer's vote on a target.
///
/// `None` for anonymous reads, `Some(0)` when the viewer has not voted.
#[must_use]
pub fn viewer_vote(votes: &[Vote], viewer: Option<&str>) -> Option<i32> {
    let viewer = viewer?;
    Some(
        votes
            .iter()
            .find(|vote| vote.voter == viewer)
            .map_or(0, Vote::value),
    )
}

/// Votes grouped by target.
#[derive(Debug, Default)]
pub struct VoteIndex {
    by_target: HashMap<VoteTarget, Vec<Vote>>,
}

impl VoteIndex {
    /// Group `votes` by target.
    pub fn new(votes: impl IntoIterator<Item = Vote>) -> Self {
        let mut by_target: HashMap<VoteTarget, Vec<Vote>> = HashMap::new();
        for vote in votes {
            by_target.entry(vote.target.clone()).or_default().push(vote);
        }
        Self { by_target }
    }

    /// Votes on `target`.
    #[must_use]
    pub fn votes(&self, target: &VoteTarget) -> &[Vote] {
        self.by_target.get(target).map_or(&[][..], Vec::as_slice)
    }
}

/// A comment with its vote projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedComment {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub vote_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<i32>,
}

/// A post with its vote projection and derived fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPost {
    #[serde(flatten)]
    pub post: post::Model,
    pub url: String,
    pub comment_count: usize,
    pub vote_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<i32>,
    /// Present only on single-post reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<ProjectedComment>>,
}

/// Public path of a post.
#[must_use]
pub fn post_url(base_path: &str, post: &post::Model) -> String {
    format!(
        "{}/r/{}/{}/{}",
        base_path.trim_end_matches('/'),
        post.sub_name,
        post.identifier,
        post.slug
    )
}

/// Project a comment for `viewer`.
#[must_use]
pub fn project_comment(
    comment: comment::Model,
    index: &VoteIndex,
    viewer: Option<&str>,
) -> ProjectedComment {
    let votes = index.votes(&VoteTarget::Comment(comment.id.clone()));
    ProjectedComment {
        vote_score: score(votes),
        user_vote: viewer_vote(votes, viewer),
        comment,
    }
}

/// Project a post and, when `include_comments` is set, each of its comments
/// with the same viewer.
#[must_use]
pub fn project_post(
    post: post::Model,
    comments: Vec<comment::Model>,
    index: &VoteIndex,
    viewer: Option<&str>,
    base_path: &str,
    include_comments: bool,
) -> ProjectedPost {
    let votes = index.votes(&VoteTarget::Post(post.id.clone()));
    let comment_count = comments.len();
    let comments = include_comments.then(|| {
        comments
            .into_iter()
            .map(|comment| project_comment(comment, index, viewer))
            .collect()
    });

    ProjectedPost {
        url: post_url(base_path, &post),
        comment_count,
        vote_score: score(votes),
        user_vote: viewer_vote(votes, viewer),
        comments,
        post,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::vote::Direction;
    use chrono::Utc;

    fn vote(voter: &str, target: VoteTarget, direction: Direction) -> Vote {
        Vote {
            id: format!("{voter}-{target}"),
            voter: voter.to_string(),
            target,
            direction,
        }
    }

    fn create_test_post() -> post::Model {
        post::Model {
            id: "p1".to_string(),
            identifier: "abcd1234".to_string(),
            slug: "hello-world".to_string(),
            title: "Hello world".to_string(),
            body: None,
            sub_name: "rust".to_string(),
            username: "alice".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn create_test_comment(id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            identifier: format!("{id}-ident"),
            body: "nice".to_string(),
            username: "bob".to_string(),
            post_id: "p1".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_score_of_no_votes_is_zero() {
        assert_eq!(score(&[]), 0);
    }

    #[test]
    fn test_viewer_vote() {
        let post = VoteTarget::Post("p1".to_string());
        let votes = vec![
            vote("alice", post.clone(), Direction::Up),
            vote("bob", post, Direction::Down),
        ];

        assert_eq!(score(&votes), 0);
        assert_eq!(viewer_vote(&votes, Some("alice")), Some(1));
        assert_eq!(viewer_vote(&votes, Some("bob")), Some(-1));
        assert_eq!(viewer_vote(&votes, Some("carol")), Some(0));
        assert_eq!(viewer_vote(&votes, None), None);
    }

    #[test]
    fn test_project_post_applies_to_comments() {
        let index = VoteIndex::new([
            vote("alice", VoteTarget::Post("p1".to_string()), Direction::Up),
            vote("bob", VoteTarget::Post("p1".to_string()), Direction::Up),
            vote("alice", VoteTarget::Comment("c1".to_string()), Direction::Down),
        ]);

        let projected = project_post(
            create_test_post(),
            vec![create_test_comment("c1"), create_test_comment("c2")],
            &index,
            Some("alice"),
            "",
            true,
        );

        assert_eq!(projected.vote_score, 2);
        assert_eq!(projected.user_vote, Some(1));
        assert_eq!(projected.comment_count, 2);
        assert_eq!(projected.url, "/r/rust/abcd1234/hello-world");

        let comments = projected.comments.unwrap();
        assert_eq!(comments[0].vote_score, -1);
        assert_eq!(comments[0].user_vote, Some(-1));
        assert_eq!(comments[1].vote_score, 0);
        assert_eq!(comments[1].user_vote, Some(0));
    }

    #[test]
    fn test_anonymous_projection_omits_user_vote() {
        let index = VoteIndex::new([vote(
            "alice",
            VoteTarget::Post("p1".to_string()),
            Direction::Up,
        )]);

        let projected = project_post(
            create_test_post(),
            vec![create_test_comment("c1")],
            &index,
            None,
            "https://readit.example/",
            false,
        );

        assert_eq!(projected.user_vote, None);
        assert!(projected.comments.is_none());
        assert_eq!(projected.comment_count, 1);
        assert_eq!(
            projected.url,
            "https://readit.example/r/rust/abcd1234/hello-world"
        );

        let json = serde_json::to_value(&projected).unwrap();
        assert_eq!(json["voteScore"], 1);
        assert_eq!(json["commentCount"], 1);
        assert_eq!(json["subName"], "rust");
        assert!(json.get("userVote").is_none());
        assert!(json.get("id").is_none());
    }
}
