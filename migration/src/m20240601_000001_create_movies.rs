use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(string(Movies::Id).primary_key())
                    .col(string(Movies::Title))
                    .col(integer_null(Movies::Year))
                    .col(integer_null(Movies::Runtime))
                    .col(text_null(Movies::Plot))
                    .col(text_null(Movies::Fullplot))
                    .col(string_null(Movies::Poster))
                    // JSON arrays of strings
                    .col(text(Movies::Genres).default("[]"))
                    .col(text(Movies::CastMembers).default("[]"))
                    .col(text(Movies::Directors).default("[]"))
                    .col(text(Movies::Countries).default("[]"))
                    .col(integer_null(Movies::Metacritic))
                    .col(big_integer_null(Movies::ViewerReviews))
                    .col(string_null(Movies::Lastupdated))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_viewer_reviews")
                    .table(Movies::Table)
                    .col(Movies::ViewerReviews)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Movies {
    Table,
    Id,
    Title,
    Year,
    Runtime,
    Plot,
    Fullplot,
    Poster,
    Genres,
    CastMembers,
    Directors,
    Countries,
    Metacritic,
    ViewerReviews,
    Lastupdated,
}
