use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unknown {kind} option: {value}")]
    Unknown { kind: &'static str, value: String },
    #[error("Page must be at least 1")]
    InvalidPage,
    #[error("Page size must be between 1 and {0}")]
    InvalidPageSize(u32),
    #[error("{field} must be a whole number, got {value:?}")]
    NotANumber { field: &'static str, value: String },
}

fn parse_number(field: &'static str, value: Option<&str>) -> Result<Option<u32>, FilterError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| FilterError::NotANumber { field, value: v.to_string() }),
    }
}

macro_rules! closed_options {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses an optional query value; absent or blank selects the default.
            pub fn parse_opt(value: Option<&str>) -> Result<Self, FilterError> {
                match value.map(str::trim) {
                    None | Some("") => Ok(Self::default()),
                    Some(v) => v.parse(),
                }
            }
        }

        impl FromStr for $name {
            type Err = FilterError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(FilterError::Unknown { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionFilter {
    #[default]
    Newest,
    Frequent,
    Unanswered,
    Popular,
}

closed_options!(QuestionFilter, "question filter", {
    Newest => "newest",
    Frequent => "frequent",
    Unanswered => "unanswered",
    Popular => "popular",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnswerSort {
    HighestUpvotes,
    LowestUpvotes,
    #[default]
    Recent,
    Old,
}

closed_options!(AnswerSort, "answer sort", {
    HighestUpvotes => "highestUpvotes",
    LowestUpvotes => "lowestUpvotes",
    Recent => "recent",
    Old => "old",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserFilter {
    #[default]
    NewUsers,
    OldUsers,
    TopContributors,
}

closed_options!(UserFilter, "user filter", {
    NewUsers => "newUsers",
    OldUsers => "oldUsers",
    TopContributors => "topContributors",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagFilter {
    #[default]
    Popular,
    Recent,
    Name,
    Old,
}

closed_options!(TagFilter, "tag filter", {
    Popular => "popular",
    Recent => "recent",
    Name => "name",
    Old => "old",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: Option<u32>, page_size: Option<u32>, max_page_size: u32) -> Result<Self, FilterError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE.min(max_page_size));

        if page == 0 {
            return Err(FilterError::InvalidPage);
        }
        if page_size == 0 || page_size > max_page_size {
            return Err(FilterError::InvalidPageSize(max_page_size));
        }
        Ok(Self { page, page_size })
    }

    /// Like [`Pagination::new`], from raw query values; malformed numbers are rejected.
    pub fn parse(page: Option<&str>, page_size: Option<&str>, max_page_size: u32) -> Result<Self, FilterError> {
        Self::new(parse_number("page", page)?, parse_number("pageSize", page_size)?, max_page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// One row past the page so `is_next` can be answered without a count query.
    pub fn fetch_limit(&self) -> i64 {
        i64::from(self.page_size) + 1
    }

    pub fn into_page<T>(self, mut rows: Vec<T>) -> Page<T> {
        let is_next = rows.len() > self.page_size as usize;
        rows.truncate(self.page_size as usize);
        Page { items: rows, is_next }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub is_next: bool,
}

/// Turns a free-text query into an ILIKE pattern, escaping wildcards.
pub fn search_pattern(query: Option<&str>) -> Option<String> {
    let query = query.map(str::trim).filter(|q| !q.is_empty())?;
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}
