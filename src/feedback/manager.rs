/// Feedback store using runtime queries
use crate::{
    account::User,
    error::{PulseError, PulseResult},
    features::{attach_feedback, detach_feedback, PageRequest, Pagination, SortOrder},
    feedback::{
        Attachment, CreateFeedbackRequest, Feedback, FeedbackCategory, FeedbackPriority,
        FeedbackSortField, FeedbackStatus, ListFeedbackQuery, UpdateFeedbackRequest,
        UpdateFeedbackStatusRequest, ANONYMOUS_AUTHOR,
    },
    metrics,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, types::Json, QueryBuilder, Row, Sqlite, SqlitePool};
use validator::Validate;

const FEEDBACK_COLUMNS: &str = "id, feature_id, feature_name, title, description, category, \
     priority, rating, status, author_id, author_email, author_name, anonymous, tags, attachments, \
     developer_notes, estimated_hours, actual_hours, archived, created_at, updated_at";

fn feedback_from_row(row: &SqliteRow) -> PulseResult<Feedback> {
    let category: String = row.try_get("category")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let tags: Json<Vec<String>> = row.try_get("tags")?;
    let attachments: Json<Vec<Attachment>> = row.try_get("attachments")?;

    Ok(Feedback {
        id: row.try_get("id")?,
        feature_id: row.try_get("feature_id")?,
        feature_name: row.try_get("feature_name")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: FeedbackCategory::from_str(&category)?,
        priority: FeedbackPriority::from_str(&priority)?,
        rating: row.try_get("rating")?,
        status: FeedbackStatus::from_str(&status)?,
        author_id: row.try_get("author_id")?,
        author_email: row.try_get("author_email")?,
        author_name: row.try_get("author_name")?,
        anonymous: row.try_get("anonymous")?,
        tags: tags.0,
        attachments: attachments.0,
        developer_notes: row.try_get("developer_notes")?,
        estimated_hours: row.try_get("estimated_hours")?,
        actual_hours: row.try_get("actual_hours")?,
        archived: row.try_get("archived")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Authors may change their own feedback; developers and admins any
fn ensure_can_modify(feedback: &Feedback, actor: &User) -> PulseResult<()> {
    if feedback.author_id == actor.id || actor.role.is_developer() {
        Ok(())
    } else {
        tracing::warn!(feedback_id = %feedback.id, user_id = %actor.id, "feedback modification refused");
        Err(PulseError::Authorization(
            "You can only modify your own feedback".to_string(),
        ))
    }
}

/// Feedback store
pub struct FeedbackManager {
    db: SqlitePool,
}

impl FeedbackManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// File feedback against an existing feature.
    ///
    /// The feedback row, the feature's back-reference and its request counter
    /// are written in one transaction.
    pub async fn create(&self, author: &User, request: CreateFeedbackRequest) -> PulseResult<Feedback> {
        request.validate()?;

        let (feature_id, description, category, priority, rating) = match (
            &request.feature_id,
            &request.description,
            request.category,
            request.priority,
            request.rating,
        ) {
            (Some(f), Some(d), Some(c), Some(p), Some(r))
                if !f.trim().is_empty() && !d.trim().is_empty() =>
            {
                (f.trim().to_string(), d.trim().to_string(), c, p, r)
            }
            _ => {
                return Err(PulseError::Validation(
                    "Feature, description, category, priority, and rating are required".to_string(),
                ))
            }
        };

        let mut tx = self.db.begin().await?;

        let id = uuid::Uuid::new_v4().to_string();

        // The back-reference goes in first: it takes the write lock and doubles
        // as the existence check
        let feature_name = attach_feedback(&mut *tx, &feature_id, &id)
            .await?
            .ok_or_else(|| PulseError::NotFound("Feature not found".to_string()))?;

        let anonymous = request.anonymous.unwrap_or(false);
        let now = Utc::now();
        let feedback = Feedback {
            id,
            feature_id,
            title: request
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Feedback for {}", feature_name)),
            feature_name,
            description,
            category,
            priority,
            rating,
            status: FeedbackStatus::Pending,
            author_id: author.id.clone(),
            author_email: author.email.clone(),
            author_name: if anonymous {
                ANONYMOUS_AUTHOR.to_string()
            } else {
                author.fullname.clone()
            },
            anonymous,
            tags: request.tags.unwrap_or_default(),
            attachments: request.attachments.unwrap_or_default(),
            developer_notes: None,
            estimated_hours: None,
            actual_hours: None,
            archived: false,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO feedback ({FEEDBACK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ))
        .bind(&feedback.id)
        .bind(&feedback.feature_id)
        .bind(&feedback.feature_name)
        .bind(&feedback.title)
        .bind(&feedback.description)
        .bind(feedback.category.as_str())
        .bind(feedback.priority.as_str())
        .bind(feedback.rating)
        .bind(feedback.status.as_str())
        .bind(&feedback.author_id)
        .bind(&feedback.author_email)
        .bind(&feedback.author_name)
        .bind(feedback.anonymous)
        .bind(Json(&feedback.tags))
        .bind(Json(&feedback.attachments))
        .bind(&feedback.developer_notes)
        .bind(feedback.estimated_hours)
        .bind(feedback.actual_hours)
        .bind(feedback.archived)
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::record_feedback_created(feedback.category.as_str());
        tracing::info!(
            feedback_id = %feedback.id,
            feature_id = %feedback.feature_id,
            rating = feedback.rating,
            "feedback created"
        );

        Ok(feedback)
    }

    /// Look up feedback without failing when absent; archived entries resolve
    pub async fn find(&self, id: &str) -> PulseResult<Option<Feedback>> {
        let row = sqlx::query(&format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(feedback_from_row).transpose()
    }

    /// Get feedback by id
    pub async fn get(&self, id: &str) -> PulseResult<Feedback> {
        self.find(id)
            .await?
            .ok_or_else(|| PulseError::NotFound("Feedback not found".to_string()))
    }

    /// Filtered, sorted, paginated listing
    pub async fn list(&self, query: &ListFeedbackQuery) -> PulseResult<(Vec<Feedback>, Pagination)> {
        let sort_field = query
            .sort_by
            .as_deref()
            .map(FeedbackSortField::from_str)
            .transpose()?
            .unwrap_or_default();
        let sort_order = query
            .sort_order
            .as_deref()
            .map(SortOrder::from_str)
            .transpose()?
            .unwrap_or_default();
        let page = PageRequest::new(query.page, query.limit);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM feedback WHERE 1 = 1");
        push_filters(&mut count_query, query);
        let total: i64 = count_query.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE 1 = 1"
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
        let feedback = rows
            .iter()
            .map(feedback_from_row)
            .collect::<PulseResult<Vec<_>>>()?;

        Ok((feedback, Pagination::new(total, page)))
    }

    /// A user's non-archived feedback, newest first
    pub async fn list_by_user(&self, user_id: &str) -> PulseResult<Vec<Feedback>> {
        let rows = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback
             WHERE author_id = ?1 AND archived = 0
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(feedback_from_row).collect()
    }

    /// Author-side edit. Only the supplied fields are written.
    pub async fn update(
        &self,
        id: &str,
        actor: &User,
        request: UpdateFeedbackRequest,
    ) -> PulseResult<Feedback> {
        request.validate()?;

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE feedback SET updated_at = ");
        query.push_bind(Utc::now());
        if let Some(title) = request.title {
            query.push(", title = ").push_bind(title.trim().to_string());
        }
        if let Some(description) = request.description {
            query.push(", description = ").push_bind(description.trim().to_string());
        }
        if let Some(category) = request.category {
            query.push(", category = ").push_bind(category.as_str());
        }
        if let Some(priority) = request.priority {
            query.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(rating) = request.rating {
            query.push(", rating = ").push_bind(rating);
        }
        if let Some(tags) = request.tags {
            query.push(", tags = ").push_bind(Json(tags));
        }
        if let Some(attachments) = request.attachments {
            query.push(", attachments = ").push_bind(Json(attachments));
        }
        push_ownership_guard(&mut query, id, actor);

        if query.build().execute(&self.db).await?.rows_affected() == 0 {
            return Err(self.refusal(id, actor).await);
        }

        tracing::info!(feedback_id = %id, user_id = %actor.id, "feedback updated");
        self.get(id).await
    }

    /// Triage update; callers are expected to have passed the developer gate
    pub async fn update_status(
        &self,
        id: &str,
        request: UpdateFeedbackStatusRequest,
    ) -> PulseResult<Feedback> {
        request.validate()?;

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE feedback SET updated_at = ");
        query.push_bind(Utc::now());
        if let Some(status) = request.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(notes) = request.developer_notes {
            query.push(", developer_notes = ").push_bind(notes.trim().to_string());
        }
        if let Some(hours) = request.estimated_hours {
            query.push(", estimated_hours = ").push_bind(hours);
        }
        if let Some(hours) = request.actual_hours {
            query.push(", actual_hours = ").push_bind(hours);
        }
        query.push(" WHERE id = ").push_bind(id);

        if query.build().execute(&self.db).await?.rows_affected() == 0 {
            return Err(PulseError::NotFound("Feedback not found".to_string()));
        }

        let feedback = self.get(id).await?;
        tracing::info!(feedback_id = %id, status = feedback.status.as_str(), "feedback status updated");
        Ok(feedback)
    }

    /// Delete feedback and prune the owning feature's back-reference in one transaction
    pub async fn delete(&self, id: &str, actor: &User) -> PulseResult<Feedback> {
        let mut tx = self.db.begin().await?;

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM feedback");
        push_ownership_guard(&mut query, id, actor);
        query.push(format!(" RETURNING {FEEDBACK_COLUMNS}"));

        let row = query.build().fetch_optional(&mut *tx).await?;
        let feedback = match row.as_ref().map(feedback_from_row).transpose()? {
            Some(feedback) => feedback,
            None => {
                tx.rollback().await?;
                return Err(self.refusal(id, actor).await);
            }
        };

        let pruned = detach_feedback(&mut *tx, &feedback.feature_id, &feedback.id).await?;
        if !pruned {
            tracing::warn!(
                feedback_id = %id,
                feature_id = %feedback.feature_id,
                "deleted feedback had no back-reference on its feature"
            );
        }

        tx.commit().await?;

        metrics::record_feedback_deleted();
        tracing::info!(feedback_id = %id, user_id = %actor.id, "feedback deleted");
        Ok(feedback)
    }

    /// Soft delete
    pub async fn archive(&self, id: &str, actor: &User) -> PulseResult<Feedback> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE feedback SET archived = 1, updated_at = ");
        query.push_bind(Utc::now());
        push_ownership_guard(&mut query, id, actor);

        if query.build().execute(&self.db).await?.rows_affected() == 0 {
            return Err(self.refusal(id, actor).await);
        }

        tracing::info!(feedback_id = %id, "feedback archived");
        self.get(id).await
    }

    /// Why a guarded write matched no row
    async fn refusal(&self, id: &str, actor: &User) -> PulseError {
        let not_found = || PulseError::NotFound("Feedback not found".to_string());
        match self.find(id).await {
            Ok(Some(feedback)) => ensure_can_modify(&feedback, actor).err().unwrap_or_else(not_found),
            Ok(None) => not_found(),
            Err(e) => e,
        }
    }
}

/// `WHERE` clause limiting a write to the row the actor may modify
fn push_ownership_guard<'a>(builder: &mut QueryBuilder<'a, Sqlite>, id: &'a str, actor: &'a User) {
    builder.push(" WHERE id = ").push_bind(id);
    if !actor.role.is_developer() {
        builder.push(" AND author_id = ").push_bind(actor.id.as_str());
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ListFeedbackQuery) {
    if !query.include_archived.unwrap_or(false) {
        builder.push(" AND archived = 0");
    }
    if let Some(category) = query.category {
        builder.push(" AND category = ").push_bind(category.as_str());
    }
    if let Some(priority) = query.priority {
        builder.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(user_id) = &query.user_id {
        builder.push(" AND author_id = ").push_bind(user_id.clone());
    }
    if let Some(feature_id) = &query.feature_id {
        builder.push(" AND feature_id = ").push_bind(feature_id.clone());
    }
}
