//! PostgreSQL implementation of [`Store`].
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::{Store, UnitOfWork, Write};
use crate::error::{Result, ServerError};
use crate::property::{ListQuery, Page, Property, PropertyChanges, PropertyFilter};
use crate::user::User;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "yariga";
pub const DEFAULT_POOL_SIZE: u32 = 10;

const USER_COLUMNS: &str =
    "id, name, email, avatar, all_properties, created_at";
const PROPERTY_COLUMNS: &str = "id, title, description, property_type, location, price, photo, creator, created_at";

/// PostgreSQL store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Init database connections.
    pub async fn connect(
        hostname: &str,
        username: &str,
        password: &str,
        db: &str,
        pool: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let pool = PgPoolOptions::new().max_connections(pool);
        let pool = pool.connect(&addr).await?;

        tracing::info!(%hostname, %db, "postgres connected");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute migrations scripts.
    pub async fn migrate(
        &self,
    ) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    async fn apply(
        tx: &mut sqlx::PgConnection,
        write: &Write,
    ) -> std::result::Result<PgQueryResult, sqlx::Error> {
        match write {
            Write::InsertProperty(property) => {
                sqlx::query(
                    r#"INSERT INTO properties (id, title, description, property_type, location, price, photo, creator, created_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
                )
                .bind(&property.id)
                .bind(&property.title)
                .bind(&property.description)
                .bind(&property.property_type)
                .bind(&property.location)
                .bind(property.price)
                .bind(&property.photo)
                .bind(&property.creator)
                .bind(property.created_at)
                .execute(tx)
                .await
            },
            Write::DeleteProperty { id } => {
                sqlx::query(r#"DELETE FROM properties WHERE id = $1"#)
                    .bind(id)
                    .execute(tx)
                    .await
            },
            Write::LinkProperty {
                user_id,
                property_id,
            } => {
                sqlx::query(
                    r#"UPDATE users
                        SET all_properties = CASE
                            WHEN $2 = ANY(all_properties) THEN all_properties
                            ELSE array_append(all_properties, $2)
                        END
                        WHERE id = $1"#,
                )
                .bind(user_id)
                .bind(property_id)
                .execute(tx)
                .await
            },
            Write::UnlinkProperty {
                user_id,
                property_id,
            } => {
                sqlx::query(
                    r#"UPDATE users SET all_properties = array_remove(all_properties, $2) WHERE id = $1"#,
                )
                .bind(user_id)
                .bind(property_id)
                .execute(tx)
                .await
            },
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PropertyFilter) {
    builder.push(" WHERE TRUE");
    if let Some(property_type) = &filter.property_type {
        builder
            .push(" AND property_type = ")
            .push_bind(property_type.clone());
    }
    if let Some(needle) = &filter.title_contains {
        builder
            .push(" AND strpos(lower(title), lower(")
            .push_bind(needle.clone())
            .push(")) > 0");
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl Store for PgStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO users (id, name, email, avatar, all_properties, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.all_properties)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(ServerError::Conflict(format!(
                    "user with email {}",
                    user.email
                )))
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let query =
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_property(&self, id: &str) -> Result<Option<Property>> {
        let query =
            format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1");
        Ok(sqlx::query_as::<_, Property>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_properties(&self, ids: &[String]) -> Result<Vec<Property>> {
        let query = format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ANY($1)"
        );
        let mut found = sqlx::query_as::<_, Property>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids
            .iter()
            .filter_map(|id| {
                found
                    .iter()
                    .position(|p| &p.id == id)
                    .map(|index| found.swap_remove(index))
            })
            .collect())
    }

    async fn list_properties(&self, query: &ListQuery) -> Result<Page<Property>> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM properties");
        push_filter(&mut count, &query.filter);
        let total: i64 =
            count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties"
        ));
        push_filter(&mut select, &query.filter);
        if let Some(sort) = &query.sort {
            select.push(format!(
                " ORDER BY {} {}, id",
                sort.field.column(),
                sort.direction.as_sql()
            ));
        }
        if let Some(limit) = query.range.limit() {
            select.push(" LIMIT ").push_bind(to_i64(limit));
        }
        select
            .push(" OFFSET ")
            .push_bind(to_i64(query.range.start()));

        let items = select
            .build_query_as::<Property>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn update_property(
        &self,
        id: &str,
        changes: &PropertyChanges,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE properties
                SET title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    property_type = COALESCE($4, property_type),
                    location = COALESCE($5, location),
                    price = COALESCE($6, price),
                    photo = COALESCE($7, photo)
                WHERE id = $1"#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.property_type)
        .bind(&changes.location)
        .bind(changes.price)
        .bind(&changes.photo)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn with_transaction(&self, unit: UnitOfWork) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for write in unit.writes() {
            let result = match Self::apply(&mut tx, write).await {
                Ok(result) => result,
                Err(sqlx::Error::Database(err))
                    if err.is_foreign_key_violation() =>
                {
                    tx.rollback().await?;
                    return Err(ServerError::InvariantViolation(
                        err.message().to_owned(),
                    ));
                },
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err.into());
                },
            };

            if result.rows_affected() != 1 {
                tx.rollback().await?;
                return Err(write.not_applied());
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
