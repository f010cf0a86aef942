//! Repository for the `proposals` and `pages` tables.

use charm_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::proposal::{CreateProposal, Page, Proposal, ProposalFilter, PENDING_REWARDS_FIELD};
use crate::models::reward::ProposalReward;

/// Column list for `proposals` queries.
const COLUMNS: &str = "id, space_id, status, published_at, workflow_id, fields, \
    selected_credential_template_ids, authors, created_by, created_at, updated_at";

/// Column list for `pages` queries.
const PAGE_COLUMNS: &str = "id, space_id, title, path, is_template, created_at, updated_at";

/// Provides CRUD operations for proposals and their pages.
pub struct ProposalRepo;

impl ProposalRepo {
    /// Insert a draft proposal and its page in one transaction.
    pub async fn create(pool: &PgPool, input: &CreateProposal) -> Result<Proposal, sqlx::Error> {
        let id = DbId::new_v4();
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO pages (id, space_id, title, path, is_template) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(input.space_id)
        .bind(&input.title)
        .bind(format!("page-{}", id.simple()))
        .bind(input.is_template)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO proposals \
                (id, space_id, workflow_id, fields, selected_credential_template_ids, \
                 authors, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let proposal = sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .bind(input.space_id)
            .bind(input.workflow_id)
            .bind(&input.fields)
            .bind(&input.selected_credential_template_ids)
            .bind(&input.authors)
            .bind(input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(proposal)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM proposals WHERE id = $1");
        sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a space's proposals, newest first.
    pub async fn list_by_space(
        pool: &PgPool,
        space_id: DbId,
        filter: &ProposalFilter,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposals \
             WHERE space_id = $1 \
               AND ($2::TEXT IS NULL OR status = $2) \
               AND ($3 OR id IN (SELECT id FROM pages WHERE NOT is_template)) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(space_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.include_templates)
            .fetch_all(pool)
            .await
    }

    /// Set the lifecycle status, stamping `published_at` when given.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: &str,
        published_at: Option<Timestamp>,
    ) -> Result<Proposal, sqlx::Error> {
        let query = format!(
            "UPDATE proposals SET \
                status = $2, \
                published_at = COALESCE($3, published_at), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .bind(status)
            .bind(published_at)
            .fetch_one(pool)
            .await
    }

    /// Move `fields.pendingRewards` into `proposal_rewards` rows.
    ///
    /// The proposal row stays locked until the pending list is cleared, so a
    /// concurrent call publishes nothing twice.
    pub async fn publish_pending_rewards(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Vec<ProposalReward>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM proposals WHERE id = $1 FOR UPDATE");
        let proposal = sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let mut published = Vec::new();
        for reward in proposal.pending_rewards() {
            let row = sqlx::query_as::<_, ProposalReward>(
                "INSERT INTO proposal_rewards (id, proposal_id, reward) \
                 VALUES ($1, $2, $3) \
                 RETURNING id, proposal_id, reward, created_at",
            )
            .bind(DbId::new_v4())
            .bind(id)
            .bind(&reward)
            .fetch_one(&mut *tx)
            .await?;
            published.push(row);
        }

        sqlx::query(
            "UPDATE proposals \
             SET fields = jsonb_set(fields, ARRAY[$2::TEXT], '[]'::jsonb), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(PENDING_REWARDS_FIELD)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(published)
    }

    pub async fn find_page(pool: &PgPool, id: DbId) -> Result<Option<Page>, sqlx::Error> {
        let query = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1");
        sqlx::query_as::<_, Page>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Bump the page's `updated_at`.
    pub async fn touch_page(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE pages SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
