use sea_orm_migration::{prelude::*, schema::*};

use crate::m20240601_000001_create_movies::Movies;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(string(Comments::Id).primary_key())
                    .col(string(Comments::MovieId))
                    .col(string(Comments::Name))
                    .col(string(Comments::Email))
                    .col(text(Comments::Text))
                    .col(big_integer(Comments::Date))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_movie_id")
                            .from(Comments::Table, Comments::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_movie_date")
                    .table(Comments::Table)
                    .col(Comments::MovieId)
                    .col(Comments::Date)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Comments::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    MovieId,
    Name,
    Email,
    Text,
    Date,
}
