use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub plot: Option<String>,
    pub fullplot: Option<String>,
    pub poster: Option<String>,
    /// JSON array text, as are `cast_members`, `directors` and `countries`.
    pub genres: String,
    pub cast_members: String,
    pub directors: String,
    pub countries: String,
    pub metacritic: Option<i32>,
    pub viewer_reviews: Option<i64>,
    pub lastupdated: Option<String>,
    /// `"datetime"` or `"string"`; absent on rows written before the kind was tracked.
    pub lastupdated_kind: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
