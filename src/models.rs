use jiff::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "_id", deserialize_with = "deserialize_object_id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullplot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub directors: Vec<String>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metacritic: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_reviews: Option<i64>,
    #[serde(default)]
    pub lastupdated: LastUpdated,
    /// Only populated when a single movie is fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

const DATETIME_KIND: &str = "datetime";
const TEXT_KIND: &str = "string";

/// `lastupdated` arrives either as a real timestamp or as a free-form string,
/// depending on how the record was imported.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LastUpdated {
    DateTime(Timestamp),
    Text(String),
    #[default]
    Missing,
}

impl LastUpdated {
    /// Reads the stored value and its recorded kind. Rows without a kind fall
    /// back to parsing: only values carrying a UTC offset count as timestamps.
    pub fn from_stored(raw: Option<&str>, kind: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Missing;
        };
        if kind == Some(TEXT_KIND) {
            return Self::Text(raw.to_string());
        }
        match raw.parse::<Timestamp>() {
            Ok(ts) => Self::DateTime(ts),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    pub fn stored_kind(&self) -> Option<&'static str> {
        match self {
            Self::DateTime(_) => Some(DATETIME_KIND),
            Self::Text(_) => Some(TEXT_KIND),
            Self::Missing => None,
        }
    }

    pub fn to_stored(&self) -> Option<String> {
        match self {
            Self::DateTime(ts) => Some(ts.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Missing => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.stored_kind().unwrap_or("null")
    }
}

impl Serialize for LastUpdated {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::DateTime(ts) => ts.serialize(serializer),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Missing => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for LastUpdated {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Exported documents wrap real dates as `{"$date": "..."}`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Date {
                #[serde(rename = "$date")]
                date: Timestamp,
            },
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Date { date }) => Self::DateTime(date),
            Some(Raw::Text(s)) => Self::Text(s),
            None => Self::Missing,
        })
    }
}

fn deserialize_object_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Oid {
            #[serde(rename = "$oid")]
            oid: String,
        },
        Plain(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Oid { oid } => oid,
        Raw::Plain(id) => id,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    pub movie_id: String,
    pub name: String,
    pub email: String,
    pub text: String,
    pub date: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieTitle {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub name: String,
}

/// Filters handed to the store. A key is only present when the request
/// supplied a non-empty value for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub cast: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
    pub text: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.cast.is_none() && self.genres.is_none() && self.text.is_none()
    }
}

/// Filters echoed back to the client under the query parameter names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DisplayFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BucketId {
    Boundary(i32),
    Label(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bucket {
    #[serde(rename = "_id")]
    pub id: BucketId,
    pub count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FacetedMovies {
    pub movies: Vec<Movie>,
    pub runtime: Vec<Bucket>,
    pub rating: Vec<Bucket>,
}

/// Acknowledgement policy for writes, kept as the raw option document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteConcern {
    document: Map<String, Value>,
}

impl WriteConcern {
    pub fn new(w: &str, wtimeout_ms: Option<u64>) -> Self {
        let mut document = Map::new();
        let w = w.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(w));
        document.insert("w".to_string(), w);
        if let Some(ms) = wtimeout_ms {
            document.insert("wtimeout".to_string(), Value::from(ms));
        }
        Self { document }
    }

    pub fn wtimeout(&self) -> Value {
        self.document.get("wtimeout").cloned().unwrap_or_else(|| Value::from("0"))
    }
}

#[derive(Clone, Debug)]
pub struct Configuration {
    pub pool_size: u32,
    pub write_concern: WriteConcern,
    pub user_info: Map<String, Value>,
}
