use async_trait::async_trait;
use jiff::Timestamp;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Statement, TransactionTrait,
    sea_query::{Expr, LikeExpr, SimpleExpr},
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    entities::{comment, movie},
    error::{AppError, AppResult},
    facets::{self, RATING_BOUNDARIES, RUNTIME_BOUNDARIES},
    models::{
        Comment, Configuration, FacetedMovies, LastUpdated, Movie, MovieTitle, SearchFilters, User,
        WriteConcern,
    },
};

/// Data access used by the HTTP handlers.
#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Movie with its comments, newest first.
    async fn get_movie(&self, id: &str) -> AppResult<Option<Movie>>;

    async fn get_movies(
        &self,
        filters: Option<&SearchFilters>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<Movie>, u64)>;

    async fn get_movies_by_country(&self, countries: &[String]) -> AppResult<Vec<MovieTitle>>;

    async fn get_movies_faceted(
        &self,
        filters: &SearchFilters,
        page: u64,
        per_page: u64,
    ) -> AppResult<(FacetedMovies, u64)>;

    async fn add_comment(
        &self,
        movie_id: &str,
        user: &User,
        text: &str,
        date: Timestamp,
    ) -> AppResult<Comment>;

    /// Returns the number of comments changed; zero when the caller is not the author.
    async fn update_comment(
        &self,
        comment_id: &str,
        user_email: &str,
        text: &str,
        date: Timestamp,
    ) -> AppResult<u64>;

    async fn delete_comment(&self, comment_id: &str, user_email: &str) -> AppResult<u64>;

    async fn get_configuration(&self) -> AppResult<Configuration>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
    pool_size: u32,
    write_concern: WriteConcern,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection, pool_size: u32, write_concern: WriteConcern) -> Self {
        Self { db, pool_size, write_concern }
    }

    pub async fn count_movies(&self) -> AppResult<u64> {
        Ok(movie::Entity::find().count(&self.db).await?)
    }

    pub async fn insert_movies(&self, movies: &[Movie]) -> AppResult<usize> {
        if movies.is_empty() {
            return Ok(0);
        }

        let models = movies.iter().map(movie_to_active).collect::<AppResult<Vec<_>>>()?;

        let txn = self.db.begin().await?;
        for chunk in models.chunks(500) {
            movie::Entity::insert_many(chunk.to_vec()).exec(&txn).await?;
        }
        txn.commit().await?;

        Ok(movies.len())
    }

    /// Page `page` of `query`, most reviewed first. Pages whose offset does not
    /// fit a SQLite integer are past the end of any catalog and come back empty.
    async fn fetch_page(
        &self,
        query: Select<movie::Entity>,
        page: u64,
        per_page: u64,
    ) -> AppResult<Vec<movie::Model>> {
        let Some(offset) = page_offset(page, per_page) else {
            debug!(page, per_page, "page offset out of range");
            return Ok(Vec::new());
        };

        Ok(popular_first(query).offset(offset).limit(per_page).all(&self.db).await?)
    }

    async fn scalar(&self, sql: &str, column: &str) -> AppResult<String> {
        let row = self
            .db
            .query_one(Statement::from_string(self.db.get_database_backend(), sql.to_string()))
            .await?
            .ok_or_else(|| sea_orm::DbErr::RecordNotFound(sql.to_string()))?;
        Ok(row.try_get::<String>("", column)?)
    }
}

#[async_trait]
impl MovieStore for SqliteStore {
    async fn get_movie(&self, id: &str) -> AppResult<Option<Movie>> {
        let (row, comments) = futures::try_join!(
            movie::Entity::find_by_id(id.to_string()).one(&self.db),
            comment::Entity::find()
                .filter(comment::Column::MovieId.eq(id))
                .order_by_desc(comment::Column::Date)
                .all(&self.db),
        )?;

        let Some(row) = row else {
            debug!(movie_id = %id, "movie not found");
            return Ok(None);
        };

        let mut movie = movie_from_row(row)?;
        movie.comments = Some(comments.into_iter().map(comment_from_row).collect());
        Ok(Some(movie))
    }

    async fn get_movies(
        &self,
        filters: Option<&SearchFilters>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<Movie>, u64)> {
        let mut query = movie::Entity::find();
        if let Some(filters) = filters {
            query = query.filter(filter_condition(filters));
        }

        let total = query.clone().count(&self.db).await?;
        let rows = self.fetch_page(query, page, per_page).await?;

        debug!(page, total, returned = rows.len(), "fetched movie page");

        let movies = rows.into_iter().map(movie_from_row).collect::<AppResult<Vec<_>>>()?;
        Ok((movies, total))
    }

    async fn get_movies_by_country(&self, countries: &[String]) -> AppResult<Vec<MovieTitle>> {
        if countries.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, String)> = movie::Entity::find()
            .select_only()
            .column(movie::Column::Id)
            .column(movie::Column::Title)
            .filter(json_array_contains_any("countries", countries))
            .order_by_asc(movie::Column::Title)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|(id, title)| MovieTitle { id, title }).collect())
    }

    async fn get_movies_faceted(
        &self,
        filters: &SearchFilters,
        page: u64,
        per_page: u64,
    ) -> AppResult<(FacetedMovies, u64)> {
        let query = movie::Entity::find().filter(filter_condition(filters));

        let stats: Vec<(Option<i32>, Option<i32>)> = query
            .clone()
            .select_only()
            .column(movie::Column::Runtime)
            .column(movie::Column::Metacritic)
            .into_tuple()
            .all(&self.db)
            .await?;
        let total = stats.len() as u64;

        let runtime =
            facets::bucketize(stats.iter().map(|(runtime, _)| *runtime), &RUNTIME_BOUNDARIES);
        let rating = facets::bucketize(stats.iter().map(|(_, rating)| *rating), &RATING_BOUNDARIES);

        let rows = self.fetch_page(query, page, per_page).await?;
        let movies = rows.into_iter().map(movie_from_row).collect::<AppResult<Vec<_>>>()?;

        debug!(page, total, returned = movies.len(), "fetched faceted movie page");

        Ok((FacetedMovies { movies, runtime, rating }, total))
    }

    async fn add_comment(
        &self,
        movie_id: &str,
        user: &User,
        text: &str,
        date: Timestamp,
    ) -> AppResult<Comment> {
        if movie::Entity::find_by_id(movie_id.to_string()).one(&self.db).await?.is_none() {
            return Err(AppError::MovieNotFound);
        }

        let row = comment::Model {
            id: uuid::Uuid::new_v4().simple().to_string(),
            movie_id: movie_id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            text: text.to_string(),
            date: date.as_millisecond(),
        };
        let model = comment::ActiveModel {
            id: Set(row.id.clone()),
            movie_id: Set(row.movie_id.clone()),
            name: Set(row.name.clone()),
            email: Set(row.email.clone()),
            text: Set(row.text.clone()),
            date: Set(row.date),
        };
        comment::Entity::insert(model).exec(&self.db).await?;

        debug!(movie_id = %movie_id, comment_id = %row.id, "comment added");
        Ok(comment_from_row(row))
    }

    async fn update_comment(
        &self,
        comment_id: &str,
        user_email: &str,
        text: &str,
        date: Timestamp,
    ) -> AppResult<u64> {
        let result = comment::Entity::update_many()
            .col_expr(comment::Column::Text, Expr::value(text))
            .col_expr(comment::Column::Date, Expr::value(date.as_millisecond()))
            .filter(comment::Column::Id.eq(comment_id))
            .filter(comment::Column::Email.eq(user_email))
            .exec(&self.db)
            .await?;

        debug!(comment_id = %comment_id, changed = result.rows_affected, "comment update");
        Ok(result.rows_affected)
    }

    async fn delete_comment(&self, comment_id: &str, user_email: &str) -> AppResult<u64> {
        let result = comment::Entity::delete_many()
            .filter(comment::Column::Id.eq(comment_id))
            .filter(comment::Column::Email.eq(user_email))
            .exec(&self.db)
            .await?;

        debug!(comment_id = %comment_id, deleted = result.rows_affected, "comment delete");
        Ok(result.rows_affected)
    }

    async fn get_configuration(&self) -> AppResult<Configuration> {
        let sqlite_version =
            self.scalar("SELECT sqlite_version() AS sqlite_version", "sqlite_version").await?;
        let journal_mode = self.scalar("PRAGMA journal_mode", "journal_mode").await?;

        let mut user_info = Map::new();
        user_info.insert("backend".to_string(), Value::from("sqlite"));
        user_info.insert("sqlite_version".to_string(), Value::from(sqlite_version));
        user_info.insert("journal_mode".to_string(), Value::from(journal_mode));

        Ok(Configuration {
            pool_size: self.pool_size,
            write_concern: self.write_concern.clone(),
            user_info,
        })
    }
}

fn page_offset(page: u64, per_page: u64) -> Option<u64> {
    page.checked_mul(per_page).filter(|offset| *offset <= i64::MAX as u64)
}

fn popular_first(query: Select<movie::Entity>) -> Select<movie::Entity> {
    query.order_by_desc(movie::Column::ViewerReviews).order_by_asc(movie::Column::Id)
}

fn filter_condition(filters: &SearchFilters) -> Condition {
    let mut condition = Condition::all();

    if let Some(text) = &filters.text {
        let pattern = like_pattern(text);
        let like = || LikeExpr::new(pattern.clone()).escape('\\');
        condition = condition.add(
            Condition::any()
                .add(movie::Column::Title.like(like()))
                .add(movie::Column::Plot.like(like()))
                .add(movie::Column::Fullplot.like(like())),
        );
    }
    if let Some(cast) = &filters.cast {
        condition = condition.add(json_array_contains_any("cast_members", cast));
    }
    if let Some(genres) = &filters.genres {
        condition = condition.add(json_array_contains_any("genres", genres));
    }

    condition
}

/// `%text%` with the LIKE wildcards in `text` escaped by a backslash.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Matches rows whose JSON array column shares at least one element with `values`.
fn json_array_contains_any(column: &str, values: &[String]) -> SimpleExpr {
    let placeholders = vec!["?"; values.len()].join(", ");
    Expr::cust_with_values(
        format!(
            r#"EXISTS (SELECT 1 FROM json_each("movies"."{column}") WHERE json_each.value IN ({placeholders}))"#
        ),
        values.iter().cloned(),
    )
}

fn movie_from_row(row: movie::Model) -> AppResult<Movie> {
    Ok(Movie {
        lastupdated: LastUpdated::from_stored(
            row.lastupdated.as_deref(),
            row.lastupdated_kind.as_deref(),
        ),
        genres: serde_json::from_str(&row.genres)?,
        cast: serde_json::from_str(&row.cast_members)?,
        directors: serde_json::from_str(&row.directors)?,
        countries: serde_json::from_str(&row.countries)?,
        id: row.id,
        title: row.title,
        year: row.year,
        runtime: row.runtime,
        plot: row.plot,
        fullplot: row.fullplot,
        poster: row.poster,
        metacritic: row.metacritic,
        viewer_reviews: row.viewer_reviews,
        comments: None,
    })
}

fn movie_to_active(movie: &Movie) -> AppResult<movie::ActiveModel> {
    Ok(movie::ActiveModel {
        id: Set(movie.id.clone()),
        title: Set(movie.title.clone()),
        year: Set(movie.year),
        runtime: Set(movie.runtime),
        plot: Set(movie.plot.clone()),
        fullplot: Set(movie.fullplot.clone()),
        poster: Set(movie.poster.clone()),
        genres: Set(serde_json::to_string(&movie.genres)?),
        cast_members: Set(serde_json::to_string(&movie.cast)?),
        directors: Set(serde_json::to_string(&movie.directors)?),
        countries: Set(serde_json::to_string(&movie.countries)?),
        metacritic: Set(movie.metacritic),
        viewer_reviews: Set(movie.viewer_reviews),
        lastupdated: Set(movie.lastupdated.to_stored()),
        lastupdated_kind: Set(movie.lastupdated.stored_kind().map(str::to_string)),
    })
}

fn comment_from_row(row: comment::Model) -> Comment {
    Comment {
        // Dates are written from `Timestamp::as_millisecond`, so they stay in range.
        date: Timestamp::from_millisecond(row.date).unwrap_or(Timestamp::UNIX_EPOCH),
        id: row.id,
        movie_id: row.movie_id,
        name: row.name,
        email: row.email,
        text: row.text,
    }
}
