//! Fuzzy team member lookup.
//!
//! Names read off a handwritten sign are rarely spelled exactly like the
//! stored username, so the closest username by edit distance wins.

use colonylab_core::error::DatabaseError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Database;
use crate::query::QueryFilter;

/// Levenshtein edit distance, counted in characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    for (i, ca) in long.iter().enumerate() {
        let mut current = Vec::with_capacity(short.len() + 1);
        current.push(i + 1);
        for (j, cb) in short.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(ca != cb);
            current.push(insertion.min(deletion).min(substitution));
        }
        previous = current;
    }
    previous[short.len()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Return the team member whose username is closest to `name`.
///
/// Ties go to the first row returned. `None` when the table is empty.
pub async fn fuzzy_find_team_member(
    db: &dyn Database,
    name: &str,
) -> Result<Option<TeamMember>, DatabaseError> {
    let query = QueryFilter::new("team").fields(["username", "email"]);
    let rows = db.select(&query).await?;

    let best = rows
        .into_iter()
        .filter_map(|row| serde_json::from_value::<TeamMember>(serde_json::Value::Object(row)).ok())
        .map(|member| (levenshtein(name, &member.username), member))
        .fold(None::<(usize, TeamMember)>, |best, candidate| match best {
            Some(current) if current.0 <= candidate.0 => Some(current),
            _ => Some(candidate),
        });

    if let Some((distance, member)) = &best {
        debug!(query = name, username = %member.username, distance, "Fuzzy matched team member");
    }
    Ok(best.map(|(_, member)| member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Row;
    use async_trait::async_trait;

    struct TeamTable(Vec<(&'static str, Option<&'static str>)>);

    #[async_trait]
    impl Database for TeamTable {
        async fn query(&self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
            assert_eq!(sql, r#"SELECT "team"."username", "team"."email" FROM "team";"#);
            Ok(self
                .0
                .iter()
                .map(|(username, email)| {
                    serde_json::json!({"username": username, "email": email})
                        .as_object()
                        .cloned()
                        .unwrap_or_default()
                })
                .collect())
        }
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn levenshtein_is_symmetric_and_char_based() {
        assert_eq!(levenshtein("Zoë", "Zoe"), 1);
        assert_eq!(levenshtein("abc", "yabd"), levenshtein("yabd", "abc"));
    }

    #[tokio::test]
    async fn closest_username_wins() {
        let db = TeamTable(vec![
            ("alice", Some("alice@lab.org")),
            ("bob", Some("bob@lab.org")),
            ("charlie", None),
        ]);
        let member = fuzzy_find_team_member(&db, "Alise").await.unwrap().unwrap();
        assert_eq!(member.username, "alice");
        assert_eq!(member.email.as_deref(), Some("alice@lab.org"));
    }

    #[tokio::test]
    async fn ties_keep_first_row() {
        let db = TeamTable(vec![("ann", None), ("anb", None), ("xyz", None)]);
        let member = fuzzy_find_team_member(&db, "anm").await.unwrap().unwrap();
        assert_eq!(member.username, "ann");
    }

    #[tokio::test]
    async fn empty_table_matches_nobody() {
        let db = TeamTable(vec![]);
        assert!(fuzzy_find_team_member(&db, "anyone").await.unwrap().is_none());
    }
}
