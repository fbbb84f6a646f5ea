/// Feature store using runtime queries
use crate::{
    error::{PulseError, PulseResult},
    features::{
        CreateFeatureRequest, Dependency, Documentation, Feature, FeatureCategory, FeatureMetrics,
        FeaturePriority, FeatureSortField, FeatureStatus, FeatureWithStats, FeedbackRef,
        FeedbackStats, ListFeaturesQuery, PageRequest, Pagination, SortOrder,
        UpdateFeatureRequest,
    },
};
use chrono::Utc;
use sqlx::{
    sqlite::SqliteRow, types::Json, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool,
};
use std::collections::HashMap;
use validator::Validate;

const FEATURE_COLUMNS: &str = "id, name, description, category, status, priority, version, \
     estimated_hours, actual_hours, start_date, target_date, completed_date, assigned_to, tags, \
     dependencies, feedback_refs, user_requests, votes, complexity, documentation, archived, \
     created_at, updated_at";

/// Features resolved per stats query
const STATS_BATCH_SIZE: usize = 500;

fn feature_from_row(row: &SqliteRow) -> PulseResult<Feature> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let tags: Json<Vec<String>> = row.try_get("tags")?;
    let dependencies: Json<Vec<Dependency>> = row.try_get("dependencies")?;
    let feedback_refs: Json<Vec<FeedbackRef>> = row.try_get("feedback_refs")?;
    let documentation: Option<Json<Documentation>> = row.try_get("documentation")?;

    Ok(Feature {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: FeatureCategory::from_str(&category)?,
        status: FeatureStatus::from_str(&status)?,
        priority: FeaturePriority::from_str(&priority)?,
        version: row.try_get("version")?,
        estimated_hours: row.try_get("estimated_hours")?,
        actual_hours: row.try_get("actual_hours")?,
        start_date: row.try_get("start_date")?,
        target_date: row.try_get("target_date")?,
        completed_date: row.try_get("completed_date")?,
        assigned_to: row.try_get("assigned_to")?,
        tags: tags.0,
        dependencies: dependencies.0,
        feedback_refs: feedback_refs.0,
        metrics: FeatureMetrics {
            user_requests: row.try_get("user_requests")?,
            votes: row.try_get("votes")?,
            complexity: row.try_get("complexity")?,
        },
        documentation: documentation.map(|d| d.0),
        archived: row.try_get("archived")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Count and mean rating over the references that resolve to a rated feedback row.
/// References to missing feedback are ignored.
pub fn compute_stats(refs: &[FeedbackRef], ratings: &HashMap<String, i64>) -> FeedbackStats {
    let resolved: Vec<i64> = refs
        .iter()
        .filter_map(|r| ratings.get(&r.feedback_id).copied())
        .collect();

    if resolved.is_empty() {
        return FeedbackStats {
            feedback_count: 0,
            avg_rating: 0.0,
        };
    }

    FeedbackStats {
        feedback_count: resolved.len() as i64,
        avg_rating: resolved.iter().sum::<i64>() as f64 / resolved.len() as f64,
    }
}

/// Append a back-reference and bump the request counter in one statement.
/// Returns the feature's name, or `None` when the feature does not exist.
pub(crate) async fn attach_feedback(
    conn: &mut SqliteConnection,
    feature_id: &str,
    feedback_id: &str,
) -> PulseResult<Option<String>> {
    let name = sqlx::query_scalar(
        "UPDATE feature
         SET feedback_refs = json_insert(feedback_refs, '$[#]', json_object('feedbackId', ?1, 'votes', 0)),
             user_requests = user_requests + 1,
             updated_at = ?2
         WHERE id = ?3
         RETURNING name",
    )
    .bind(feedback_id)
    .bind(Utc::now())
    .bind(feature_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(name)
}

/// Prune a back-reference and decrement the request counter, never below zero.
/// The counter only moves when a reference was actually removed; returns
/// whether that happened.
pub(crate) async fn detach_feedback(
    conn: &mut SqliteConnection,
    feature_id: &str,
    feedback_id: &str,
) -> PulseResult<bool> {
    let result = sqlx::query(
        "UPDATE feature
         SET feedback_refs = (
                 SELECT COALESCE(json_group_array(json(j.value)), '[]')
                 FROM json_each(feature.feedback_refs) AS j
                 WHERE json_extract(j.value, '$.feedbackId') != ?1
             ),
             user_requests = MAX(user_requests - 1, 0),
             updated_at = ?2
         WHERE id = ?3
           AND EXISTS (
                 SELECT 1 FROM json_each(feature.feedback_refs) AS j
                 WHERE json_extract(j.value, '$.feedbackId') = ?1
             )",
    )
    .bind(feedback_id)
    .bind(Utc::now())
    .bind(feature_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Feature store
pub struct FeatureManager {
    db: SqlitePool,
}

impl FeatureManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a feature
    pub async fn create(&self, request: CreateFeatureRequest) -> PulseResult<Feature> {
        request.validate()?;

        let (name, description, category) =
            match (&request.name, &request.description, request.category) {
                (Some(n), Some(d), Some(c)) if !n.trim().is_empty() && !d.trim().is_empty() => {
                    (n.trim().to_string(), d.trim().to_string(), c)
                }
                _ => {
                    return Err(PulseError::Validation(
                        "Name, description, and category are required".to_string(),
                    ))
                }
            };

        if let Some(assignee) = &request.assigned_to {
            self.ensure_user_exists(assignee).await?;
        }

        let now = Utc::now();
        let metrics = request.metrics.unwrap_or_default();
        let status = request.status.unwrap_or_default();
        let feature = Feature {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description,
            category,
            status,
            priority: request.priority.unwrap_or_default(),
            version: request.version.map(|v| v.trim().to_string()),
            estimated_hours: request.estimated_hours,
            actual_hours: None,
            start_date: request.start_date,
            target_date: request.target_date,
            completed_date: (status == FeatureStatus::Completed).then_some(now),
            assigned_to: request.assigned_to,
            tags: normalize_tags(request.tags.unwrap_or_default()),
            dependencies: request.dependencies.unwrap_or_default(),
            feedback_refs: Vec::new(),
            metrics: FeatureMetrics {
                user_requests: 0,
                votes: metrics.votes.unwrap_or(0),
                complexity: metrics.complexity.unwrap_or(5),
            },
            documentation: request.documentation,
            archived: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO feature ({FEATURE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ))
        .bind(&feature.id)
        .bind(&feature.name)
        .bind(&feature.description)
        .bind(feature.category.as_str())
        .bind(feature.status.as_str())
        .bind(feature.priority.as_str())
        .bind(&feature.version)
        .bind(feature.estimated_hours)
        .bind(feature.actual_hours)
        .bind(feature.start_date)
        .bind(feature.target_date)
        .bind(feature.completed_date)
        .bind(&feature.assigned_to)
        .bind(Json(&feature.tags))
        .bind(Json(&feature.dependencies))
        .bind(Json(&feature.feedback_refs))
        .bind(feature.metrics.user_requests)
        .bind(feature.metrics.votes)
        .bind(feature.metrics.complexity)
        .bind(feature.documentation.as_ref().map(Json))
        .bind(feature.archived)
        .bind(feature.created_at)
        .bind(feature.updated_at)
        .execute(&self.db)
        .await?;

        tracing::info!(feature_id = %feature.id, category = feature.category.as_str(), "feature created");
        Ok(feature)
    }

    /// Look up a feature without failing when absent; archived features resolve
    pub async fn find(&self, id: &str) -> PulseResult<Option<Feature>> {
        let row = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM feature WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(feature_from_row).transpose()
    }

    /// Get a feature with its feedback stats
    pub async fn get(&self, id: &str) -> PulseResult<FeatureWithStats> {
        let feature = self
            .find(id)
            .await?
            .ok_or_else(|| PulseError::NotFound("Feature not found".to_string()))?;

        Ok(self.with_stats(vec![feature]).await?.remove(0))
    }

    /// Filtered, sorted, paginated listing
    pub async fn list(
        &self,
        query: &ListFeaturesQuery,
    ) -> PulseResult<(Vec<FeatureWithStats>, Pagination)> {
        let sort_field = query
            .sort_by
            .as_deref()
            .map(FeatureSortField::from_str)
            .transpose()?
            .unwrap_or_default();
        let sort_order = query
            .sort_order
            .as_deref()
            .map(SortOrder::from_str)
            .transpose()?
            .unwrap_or_default();
        let page = PageRequest::new(query.page, query.limit);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM feature WHERE 1 = 1");
        push_filters(&mut count_query, query);
        let total: i64 = count_query.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {FEATURE_COLUMNS} FROM feature WHERE 1 = 1"
        ));
        push_filters(&mut select, query);
        select.push(format!(
            " ORDER BY {} {}, id {}",
            sort_field.column(),
            sort_order.as_sql(),
            sort_order.as_sql()
        ));
        select.push(" LIMIT ");
        select.push_bind(page.limit as i64);
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let rows = select.build().fetch_all(&self.db).await?;
        let features = rows
            .iter()
            .map(feature_from_row)
            .collect::<PulseResult<Vec<_>>>()?;

        Ok((self.with_stats(features).await?, Pagination::new(total, page)))
    }

    /// Non-archived features of one category, most urgent first then newest
    pub async fn list_by_category(&self, category: &str) -> PulseResult<Vec<FeatureWithStats>> {
        let category = FeatureCategory::from_str(category)?;

        let rows = sqlx::query(&format!(
            "SELECT {FEATURE_COLUMNS} FROM feature
             WHERE category = ?1 AND archived = 0
             ORDER BY {} DESC, created_at DESC",
            FeatureSortField::Priority.column()
        ))
        .bind(category.as_str())
        .fetch_all(&self.db)
        .await?;

        let features = rows
            .iter()
            .map(feature_from_row)
            .collect::<PulseResult<Vec<_>>>()?;

        self.with_stats(features).await
    }

    /// Apply a partial update; only the supplied fields are written.
    ///
    /// Moving to `completed` without an explicit date stamps `completedDate`
    /// once; an already stamped date is left alone.
    pub async fn update(&self, id: &str, request: UpdateFeatureRequest) -> PulseResult<FeatureWithStats> {
        request.validate()?;

        if let Some(assignee) = &request.assigned_to {
            self.ensure_user_exists(assignee).await?;
        }

        let now = Utc::now();
        // Back-references and the request counter belong to the feedback write path
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE feature SET updated_at = ");
        query.push_bind(now);

        if let Some(name) = request.name {
            query.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(description) = request.description {
            query.push(", description = ").push_bind(description.trim().to_string());
        }
        if let Some(category) = request.category {
            query.push(", category = ").push_bind(category.as_str());
        }
        if let Some(status) = request.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = request.priority {
            query.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(version) = request.version {
            query.push(", version = ").push_bind(version.trim().to_string());
        }
        if let Some(hours) = request.estimated_hours {
            query.push(", estimated_hours = ").push_bind(hours);
        }
        if let Some(hours) = request.actual_hours {
            query.push(", actual_hours = ").push_bind(hours);
        }
        if let Some(date) = request.start_date {
            query.push(", start_date = ").push_bind(date);
        }
        if let Some(date) = request.target_date {
            query.push(", target_date = ").push_bind(date);
        }
        if let Some(date) = request.completed_date {
            query.push(", completed_date = ").push_bind(date);
        } else if request.status == Some(FeatureStatus::Completed) {
            query.push(", completed_date = COALESCE(completed_date, ").push_bind(now).push(")");
        }
        if let Some(assignee) = request.assigned_to {
            query.push(", assigned_to = ").push_bind(assignee);
        }
        if let Some(tags) = request.tags {
            query.push(", tags = ").push_bind(Json(normalize_tags(tags)));
        }
        if let Some(dependencies) = request.dependencies {
            query.push(", dependencies = ").push_bind(Json(dependencies));
        }
        if let Some(documentation) = request.documentation {
            query.push(", documentation = ").push_bind(Json(documentation));
        }
        if let Some(metrics) = request.metrics {
            if let Some(votes) = metrics.votes {
                query.push(", votes = ").push_bind(votes);
            }
            if let Some(complexity) = metrics.complexity {
                query.push(", complexity = ").push_bind(complexity);
            }
        }
        query.push(" WHERE id = ").push_bind(id);

        if query.build().execute(&self.db).await?.rows_affected() == 0 {
            return Err(PulseError::NotFound("Feature not found".to_string()));
        }

        let updated = self.get(id).await?;
        tracing::info!(feature_id = %id, status = updated.feature.status.as_str(), "feature updated");
        Ok(updated)
    }

    /// Physically remove a feature. Feedback filed against it is kept.
    pub async fn delete(&self, id: &str) -> PulseResult<()> {
        let result = sqlx::query("DELETE FROM feature WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PulseError::NotFound("Feature not found".to_string()));
        }

        tracing::info!(feature_id = %id, "feature deleted");
        Ok(())
    }

    /// Soft delete
    pub async fn archive(&self, id: &str) -> PulseResult<Feature> {
        let result = sqlx::query("UPDATE feature SET archived = 1, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PulseError::NotFound("Feature not found".to_string()));
        }

        tracing::info!(feature_id = %id, "feature archived");
        self.find(id)
            .await?
            .ok_or_else(|| PulseError::NotFound("Feature not found".to_string()))
    }

    /// Attach derived stats. References are expanded inside SQLite, so the
    /// bind count follows the number of features rather than of references.
    async fn with_stats(&self, features: Vec<Feature>) -> PulseResult<Vec<FeatureWithStats>> {
        let ids: Vec<&str> = features
            .iter()
            .filter(|f| !f.feedback_refs.is_empty())
            .map(|f| f.id.as_str())
            .collect();

        let mut ratings = HashMap::new();
        for batch in ids.chunks(STATS_BATCH_SIZE) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT fb.id, fb.rating
                 FROM feature AS ft, json_each(ft.feedback_refs) AS j
                 JOIN feedback AS fb ON fb.id = json_extract(j.value, '$.feedbackId')
                 WHERE ft.id IN (",
            );
            let mut separated = query.separated(", ");
            for id in batch {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            for row in query.build().fetch_all(&self.db).await? {
                ratings.insert(row.try_get::<String, _>("id")?, row.try_get::<i64, _>("rating")?);
            }
        }

        Ok(features
            .into_iter()
            .map(|feature| {
                let stats = compute_stats(&feature.feedback_refs, &ratings);
                FeatureWithStats { feature, stats }
            })
            .collect())
    }

    async fn ensure_user_exists(&self, user_id: &str) -> PulseResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        if count == 0 {
            return Err(PulseError::NotFound("Assigned user not found".to_string()));
        }
        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListFeaturesQuery) {
    if !query.include_archived.unwrap_or(false) {
        builder.push(" AND archived = 0");
    }
    if let Some(category) = query.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = query.priority {
        builder.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(assignee) = &query.assigned_to {
        builder.push(" AND assigned_to = ").push_bind(assignee.clone());
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{insert_user, Role},
        db::{create_test_file_pool, create_test_pool},
        features::MetricsInput,
    };
    use chrono::Duration;
    use std::sync::Arc;

    async fn setup() -> FeatureManager {
        FeatureManager::new(create_test_pool().await.unwrap())
    }

    fn request(name: &str, category: FeatureCategory) -> CreateFeatureRequest {
        CreateFeatureRequest {
            name: Some(name.into()),
            description: Some(format!("{} description", name)),
            category: Some(category),
            ..Default::default()
        }
    }

    async fn seed_feedback(db: &SqlitePool, feature_id: &str, rating: i64) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut conn = db.acquire().await.unwrap();
        sqlx::query(
            "INSERT INTO feedback (id, feature_id, feature_name, title, description, rating,
                author_id, author_email, author_name, created_at, updated_at)
             VALUES (?1, ?2, 'f', 't', 'd', ?3, 'u', 'u@example.com', 'U', ?4, ?4)",
        )
        .bind(&id)
        .bind(feature_id)
        .bind(rating)
        .bind(now)
        .execute(&mut *conn)
        .await
        .unwrap();
        attach_feedback(&mut conn, feature_id, &id).await.unwrap();
        id
    }

    #[test]
    fn test_compute_stats_skips_unresolved_refs() {
        let refs = vec![
            FeedbackRef { feedback_id: "a".into(), votes: 0 },
            FeedbackRef { feedback_id: "gone".into(), votes: 0 },
            FeedbackRef { feedback_id: "b".into(), votes: 0 },
        ];
        let ratings = HashMap::from([("a".to_string(), 2), ("b".to_string(), 5)]);

        let stats = compute_stats(&refs, &ratings);
        assert_eq!(stats.feedback_count, 2);
        assert_eq!(stats.avg_rating, 3.5);

        let empty = compute_stats(&[], &ratings);
        assert_eq!(empty.feedback_count, 0);
        assert_eq!(empty.avg_rating, 0.0);
    }

    #[tokio::test]
    async fn test_create_applies_defaults() {
        let manager = setup().await;
        let feature = manager.create(request("Dark mode", FeatureCategory::Feature)).await.unwrap();

        assert_eq!(feature.status, FeatureStatus::Planned);
        assert_eq!(feature.priority, FeaturePriority::Medium);
        assert_eq!(feature.metrics.complexity, 5);
        assert_eq!(feature.metrics.user_requests, 0);
        assert!(feature.feedback_refs.is_empty());
        assert!(feature.completed_date.is_none());

        let fetched = manager.get(&feature.id).await.unwrap();
        assert_eq!(fetched.feature.name, "Dark mode");
        assert_eq!(fetched.stats.feedback_count, 0);
        assert_eq!(fetched.stats.avg_rating, 0.0);
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let manager = setup().await;

        let mut missing = request("x", FeatureCategory::Bug);
        missing.category = None;
        match manager.create(missing).await {
            Err(PulseError::Validation(msg)) => {
                assert_eq!(msg, "Name, description, and category are required")
            }
            other => panic!("Expected Validation error, got {:?}", other),
        }

        let mut too_long = request("x", FeatureCategory::Bug);
        too_long.name = Some("n".repeat(201));
        assert!(matches!(manager.create(too_long).await, Err(PulseError::Validation(_))));

        let mut bad_complexity = request("x", FeatureCategory::Bug);
        bad_complexity.metrics = Some(MetricsInput { votes: None, complexity: Some(11) });
        assert!(matches!(
            manager.create(bad_complexity).await,
            Err(PulseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_checks_assignee() {
        let manager = setup().await;

        let mut unknown = request("x", FeatureCategory::Story);
        unknown.assigned_to = Some("nobody".into());
        assert!(matches!(manager.create(unknown).await, Err(PulseError::NotFound(_))));

        let mut conn = manager.db.acquire().await.unwrap();
        let dev = insert_user(&mut conn, "Dev", "dev@example.com", "hash", Role::Developer)
            .await
            .unwrap();
        drop(conn);

        let mut assigned = request("x", FeatureCategory::Story);
        assigned.assigned_to = Some(dev.id.clone());
        let feature = manager.create(assigned).await.unwrap();
        assert_eq!(feature.assigned_to, Some(dev.id));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let manager = setup().await;
        assert!(matches!(manager.get("missing").await, Err(PulseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_attach_and_detach_feedback() {
        let manager = setup().await;
        let feature = manager.create(request("Export", FeatureCategory::Feature)).await.unwrap();

        let first = seed_feedback(&manager.db, &feature.id, 4).await;
        let second = seed_feedback(&manager.db, &feature.id, 1).await;

        let fetched = manager.get(&feature.id).await.unwrap();
        assert_eq!(fetched.feature.metrics.user_requests, 2);
        assert_eq!(
            fetched.feature.feedback_refs,
            vec![
                FeedbackRef { feedback_id: first.clone(), votes: 0 },
                FeedbackRef { feedback_id: second.clone(), votes: 0 },
            ]
        );
        assert_eq!(fetched.stats.feedback_count, 2);
        assert_eq!(fetched.stats.avg_rating, 2.5);

        let mut conn = manager.db.acquire().await.unwrap();
        assert!(detach_feedback(&mut conn, &feature.id, &first).await.unwrap());
        // Second detach of the same reference is a no-op
        assert!(!detach_feedback(&mut conn, &feature.id, &first).await.unwrap());
        drop(conn);

        let fetched = manager.get(&feature.id).await.unwrap();
        assert_eq!(fetched.feature.metrics.user_requests, 1);
        assert_eq!(fetched.feature.feedback_refs.len(), 1);
        assert_eq!(fetched.feature.feedback_refs[0].feedback_id, second);
    }

    #[tokio::test]
    async fn test_detach_clamps_counter_at_zero() {
        let manager = setup().await;
        let feature = manager.create(request("Export", FeatureCategory::Feature)).await.unwrap();
        let feedback = seed_feedback(&manager.db, &feature.id, 3).await;

        // Counter drifted below the ref count
        sqlx::query("UPDATE feature SET user_requests = 0 WHERE id = ?1")
            .bind(&feature.id)
            .execute(&manager.db)
            .await
            .unwrap();

        let mut conn = manager.db.acquire().await.unwrap();
        assert!(detach_feedback(&mut conn, &feature.id, &feedback).await.unwrap());
        drop(conn);

        let fetched = manager.get(&feature.id).await.unwrap();
        assert_eq!(fetched.feature.metrics.user_requests, 0);
        assert!(fetched.feature.feedback_refs.is_empty());
    }

    #[tokio::test]
    async fn test_attach_to_missing_feature() {
        let manager = setup().await;
        let mut conn = manager.db.acquire().await.unwrap();
        assert_eq!(attach_feedback(&mut conn, "missing", "fb").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_completed_date_stamped_once() {
        let manager = setup().await;
        let feature = manager.create(request("Search", FeatureCategory::Feature)).await.unwrap();

        let complete = UpdateFeatureRequest {
            status: Some(FeatureStatus::Completed),
            ..Default::default()
        };
        let first = manager.update(&feature.id, complete.clone()).await.unwrap();
        let stamped = first.feature.completed_date.expect("completedDate stamped");

        let second = manager.update(&feature.id, complete).await.unwrap();
        assert_eq!(second.feature.completed_date, Some(stamped));

        // An explicit date always wins
        let explicit = Utc::now() - Duration::days(3);
        let third = manager
            .update(
                &feature.id,
                UpdateFeatureRequest {
                    status: Some(FeatureStatus::Completed),
                    completed_date: Some(explicit),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            third.feature.completed_date.map(|d| d.timestamp_millis()),
            Some(explicit.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_update_preserves_back_references() {
        let manager = setup().await;
        let feature = manager.create(request("Search", FeatureCategory::Feature)).await.unwrap();
        seed_feedback(&manager.db, &feature.id, 5).await;

        let updated = manager
            .update(
                &feature.id,
                UpdateFeatureRequest {
                    name: Some("Better search".into()),
                    priority: Some(FeaturePriority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.feature.name, "Better search");
        assert_eq!(updated.feature.priority, FeaturePriority::High);
        assert_eq!(updated.feature.metrics.user_requests, 1);
        assert_eq!(updated.stats.avg_rating, 5.0);

        let missing = manager.update("missing", UpdateFeatureRequest::default()).await;
        assert!(matches!(missing, Err(PulseError::NotFound(_))));

        let negative = UpdateFeatureRequest {
            actual_hours: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            manager.update(&feature.id, negative).await,
            Err(PulseError::Validation(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_partial_updates_keep_each_field() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_test_file_pool(&dir.path().join("pulse.sqlite")).await.unwrap();
        let manager = Arc::new(FeatureManager::new(db));

        for round in 0..20 {
            let feature = manager.create(request("Search", FeatureCategory::Feature)).await.unwrap();
            let name = format!("Search v{}", round);

            let renamed = {
                let manager = Arc::clone(&manager);
                let (id, name) = (feature.id.clone(), name.clone());
                tokio::spawn(async move {
                    manager
                        .update(&id, UpdateFeatureRequest { name: Some(name), ..Default::default() })
                        .await
                })
            };
            let reprioritized = {
                let manager = Arc::clone(&manager);
                let id = feature.id.clone();
                tokio::spawn(async move {
                    manager
                        .update(
                            &id,
                            UpdateFeatureRequest {
                                priority: Some(FeaturePriority::Critical),
                                ..Default::default()
                            },
                        )
                        .await
                })
            };
            renamed.await.unwrap().unwrap();
            reprioritized.await.unwrap().unwrap();

            let stored = manager.get(&feature.id).await.unwrap().feature;
            assert_eq!(stored.name, name, "round {}", round);
            assert_eq!(stored.priority, FeaturePriority::Critical, "round {}", round);
        }
    }

    #[tokio::test]
    async fn test_update_leaves_unsupplied_fields_alone() {
        let manager = setup().await;
        let mut create = request("Search", FeatureCategory::Feature);
        create.tags = Some(vec![" ux ".into(), "".into()]);
        create.metrics = Some(MetricsInput { votes: Some(7), complexity: Some(3) });
        let feature = manager.create(create).await.unwrap();

        let updated = manager
            .update(
                &feature.id,
                UpdateFeatureRequest {
                    metrics: Some(MetricsInput { votes: Some(9), complexity: None }),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .feature;

        assert_eq!(updated.name, "Search");
        assert_eq!(updated.tags, vec!["ux".to_string()]);
        assert_eq!(updated.metrics.votes, 9);
        assert_eq!(updated.metrics.complexity, 3);
        assert_eq!(updated.status, FeatureStatus::Planned);
        assert!(updated.completed_date.is_none());
        assert!(updated.updated_at >= feature.updated_at);
    }

    #[tokio::test]
    async fn test_stats_resolve_references_beyond_bind_limit() {
        let manager = setup().await;
        let feature = manager.create(request("Popular", FeatureCategory::Feature)).await.unwrap();
        let quiet = manager.create(request("Quiet", FeatureCategory::Feature)).await.unwrap();

        // More references than SQLite accepts as bound parameters in one statement
        let total: i64 = 40_000;
        sqlx::query(
            "INSERT INTO feedback (id, feature_id, feature_name, title, description, rating,
                author_id, author_email, author_name, created_at, updated_at)
             WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < ?1)
             SELECT 'fb-' || n, ?2, 'Popular', 't', 'd', 1 + n % 5,
                    'u', 'u@example.com', 'U', ?3, ?3
             FROM seq",
        )
        .bind(total)
        .bind(&feature.id)
        .bind(Utc::now())
        .execute(&manager.db)
        .await
        .unwrap();
        sqlx::query(
            "UPDATE feature
             SET feedback_refs = (
                     SELECT json_group_array(json_object('feedbackId', id, 'votes', 0))
                     FROM feedback WHERE feature_id = ?1
                 ),
                 user_requests = (SELECT COUNT(*) FROM feedback WHERE feature_id = ?1)
             WHERE id = ?1",
        )
        .bind(&feature.id)
        .execute(&manager.db)
        .await
        .unwrap();

        let fetched = manager.get(&feature.id).await.unwrap();
        assert_eq!(fetched.feature.feedback_refs.len() as i64, total);
        assert_eq!(fetched.stats.feedback_count, total);
        assert_eq!(fetched.stats.avg_rating, 3.0);

        let (listed, _) = manager.list(&ListFeaturesQuery::default()).await.unwrap();
        let counts: HashMap<_, _> = listed
            .iter()
            .map(|f| (f.feature.id.clone(), f.stats.feedback_count))
            .collect();
        assert_eq!(counts[&feature.id], total);
        assert_eq!(counts[&quiet.id], 0);
    }

    #[tokio::test]
    async fn test_archive_hides_from_listing_but_resolves_by_id() {
        let manager = setup().await;
        let kept = manager.create(request("Kept", FeatureCategory::Feature)).await.unwrap();
        let archived = manager.create(request("Old", FeatureCategory::Feature)).await.unwrap();

        let result = manager.archive(&archived.id).await.unwrap();
        assert!(result.archived);

        let (listed, pagination) = manager.list(&ListFeaturesQuery::default()).await.unwrap();
        assert_eq!(pagination.total, 1);
        assert_eq!(listed[0].feature.id, kept.id);

        let by_category = manager.list_by_category("feature").await.unwrap();
        assert_eq!(by_category.len(), 1);

        let with_archived = ListFeaturesQuery {
            include_archived: Some(true),
            ..Default::default()
        };
        assert_eq!(manager.list(&with_archived).await.unwrap().1.total, 2);

        assert!(manager.get(&archived.id).await.unwrap().feature.archived);
        assert!(matches!(manager.archive("missing").await, Err(PulseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_paginates() {
        let manager = setup().await;
        for (name, category, priority) in [
            ("a", FeatureCategory::Bug, FeaturePriority::Low),
            ("b", FeatureCategory::Bug, FeaturePriority::Critical),
            ("c", FeatureCategory::Story, FeaturePriority::High),
        ] {
            let mut req = request(name, category);
            req.priority = Some(priority);
            manager.create(req).await.unwrap();
        }

        let bugs = ListFeaturesQuery {
            category: Some(FeatureCategory::Bug),
            ..Default::default()
        };
        let (features, pagination) = manager.list(&bugs).await.unwrap();
        assert_eq!(pagination.total, 2);
        assert!(features.iter().all(|f| f.feature.category == FeatureCategory::Bug));

        let by_priority = ListFeaturesQuery {
            sort_by: Some("priority".into()),
            sort_order: Some("desc".into()),
            ..Default::default()
        };
        let (features, _) = manager.list(&by_priority).await.unwrap();
        let names: Vec<_> = features.iter().map(|f| f.feature.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        let by_name = ListFeaturesQuery {
            sort_by: Some("name".into()),
            sort_order: Some("asc".into()),
            page: Some(2),
            limit: Some(2),
            ..Default::default()
        };
        let (features, pagination) = manager.list(&by_name).await.unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].feature.name, "c");
        assert_eq!(pagination, Pagination { total: 3, page: 2, limit: 2, pages: 2 });

        let bad_sort = ListFeaturesQuery {
            sort_by: Some("password".into()),
            ..Default::default()
        };
        assert!(matches!(manager.list(&bad_sort).await, Err(PulseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_by_category_orders_by_priority_rank() {
        let manager = setup().await;
        for (name, priority) in [
            ("low", FeaturePriority::Low),
            ("critical", FeaturePriority::Critical),
            ("medium", FeaturePriority::Medium),
        ] {
            let mut req = request(name, FeatureCategory::Story);
            req.priority = Some(priority);
            manager.create(req).await.unwrap();
        }

        let features = manager.list_by_category("story").await.unwrap();
        let names: Vec<_> = features.iter().map(|f| f.feature.name.as_str()).collect();
        assert_eq!(names, vec!["critical", "medium", "low"]);

        assert!(matches!(
            manager.list_by_category("spaceship").await,
            Err(PulseError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let manager = setup().await;
        let feature = manager.create(request("Gone", FeatureCategory::Bug)).await.unwrap();

        manager.delete(&feature.id).await.unwrap();
        assert!(manager.find(&feature.id).await.unwrap().is_none());
        assert!(matches!(manager.delete(&feature.id).await, Err(PulseError::NotFound(_))));
    }
}
