//! Community statistics and trending posts.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::manager::parse_post_row;
use super::types::{Category, CategoryActivity, CommunityStats, ForumError, ForumPost};

/// Window considered for trending, in days.
pub const TRENDING_WINDOW_DAYS: i64 = 7;

/// Number of trending posts returned.
pub const TRENDING_LIMIT: usize = 5;

/// Member, post and reply counters.
pub fn community_stats(conn: &Connection, now: DateTime<Utc>) -> Result<CommunityStats, ForumError> {
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);

    let count = |sql: &str| -> Result<u32, ForumError> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    Ok(CommunityStats {
        total_members: count("SELECT COUNT(*) FROM users")?,
        total_posts: count("SELECT COUNT(*) FROM forum_posts")?,
        total_replies: count("SELECT COUNT(*) FROM forum_replies")?,
        posts_today: conn.query_row(
            "SELECT COUNT(*) FROM forum_posts WHERE created_at >= ?1",
            params![start_of_day.to_rfc3339()],
            |row| row.get(0),
        )?,
    })
}

/// Top posts of the last week by `likes * 2 + replies * 3`, newest first on ties.
pub fn trending(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<ForumPost>, ForumError> {
    let since = (now - Duration::days(TRENDING_WINDOW_DAYS)).to_rfc3339();
    let mut stmt = conn.prepare(
        "SELECT p.id, p.author_id, u.full_name, p.category, p.title, p.content,
                p.likes_count, p.replies_count, 0, p.created_at
         FROM forum_posts p JOIN users u ON u.id = p.author_id
         WHERE p.created_at >= ?1",
    )?;
    let mut posts = stmt
        .query_map(params![since], parse_post_row)?
        .collect::<Result<Vec<_>, _>>()?;

    posts.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    posts.truncate(TRENDING_LIMIT);

    Ok(posts)
}

/// Per-category post counts over the trending window, busiest first.
pub fn trending_categories(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<CategoryActivity>, ForumError> {
    let since = (now - Duration::days(TRENDING_WINDOW_DAYS)).to_rfc3339();
    let mut activity: Vec<CategoryActivity> = Category::ALL
        .iter()
        .map(|&category| -> Result<CategoryActivity, ForumError> {
            let posts = conn.query_row(
                "SELECT COUNT(*) FROM forum_posts WHERE category = ?1 AND created_at >= ?2",
                params![category.as_str(), since],
                |row| row.get(0),
            )?;
            Ok(CategoryActivity { category, posts })
        })
        .collect::<Result<_, _>>()?;

    // Stable sort keeps display order among equal counts
    activity.sort_by(|a, b| b.posts.cmp(&a.posts));
    Ok(activity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::ForumManager;
    use crate::storage::Database;
    use uuid::Uuid;

    fn insert_user(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, 'x', 'Membro', ?3, ?3)",
            params![id.to_string(), format!("{}@test.dev", id), now],
        )
        .unwrap();
        id
    }

    fn insert_post(conn: &Connection, author: Uuid, title: &str, likes: u32, replies: u32, created: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO forum_posts (id, author_id, category, title, content, likes_count, replies_count, created_at)
             VALUES (?1, ?2, 'general', ?3, 'c', ?4, ?5, ?6)",
            params![id.to_string(), author.to_string(), title, likes, replies, created.to_rfc3339()],
        )
        .unwrap();
        id
    }

    #[test]
    fn test_trending_scores_and_window() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let author = insert_user(conn);
        let now = Utc::now();

        insert_post(conn, author, "likes", 5, 0, now - Duration::days(1)); // 10
        insert_post(conn, author, "replies", 0, 4, now - Duration::days(2)); // 12
        insert_post(conn, author, "old", 50, 50, now - Duration::days(8));
        insert_post(conn, author, "tie-old", 1, 0, now - Duration::days(3)); // 2
        insert_post(conn, author, "tie-new", 1, 0, now - Duration::hours(1)); // 2
        insert_post(conn, author, "quiet-1", 0, 0, now);
        insert_post(conn, author, "quiet-2", 0, 0, now);

        let titles: Vec<String> = trending(conn, now).unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles.len(), TRENDING_LIMIT);
        assert_eq!(&titles[..4], &["replies", "likes", "tie-new", "tie-old"]);
        assert!(!titles.contains(&"old".to_string()));
    }

    #[test]
    fn test_community_stats() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let ana = insert_user(conn);
        let bia = insert_user(conn);
        let now = Utc::now();

        let post = insert_post(conn, ana, "hoje", 0, 0, now);
        insert_post(conn, ana, "ontem", 0, 0, now - Duration::days(1));
        ForumManager::new(conn).add_reply(post, bia, "legal").unwrap();

        let stats = community_stats(conn, now).unwrap();
        assert_eq!(stats.total_members, 2);
        assert_eq!(stats.total_posts, 2);
        assert_eq!(stats.total_replies, 1);
        assert!(stats.posts_today >= 1);
    }

    #[test]
    fn test_trending_categories() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let ana = insert_user(conn);
        let forum = ForumManager::new(conn);

        forum.create_post(ana, Category::Nutrition, "Receita 1", "a").unwrap();
        forum.create_post(ana, Category::Nutrition, "Receita 2", "b").unwrap();
        forum.create_post(ana, Category::Progress, "Antes e depois", "c").unwrap();

        let activity = trending_categories(conn, Utc::now()).unwrap();
        assert_eq!(activity.len(), 5);
        assert_eq!(activity[0].category, Category::Nutrition);
        assert_eq!(activity[0].posts, 2);
        assert_eq!(activity[1].category, Category::Progress);
        assert_eq!(activity[2].category, Category::General);
        assert_eq!(activity[2].posts, 0);
    }
}
