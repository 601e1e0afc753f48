//! Typed list query and its query-string form.
//!
//! Wire format follows the simple REST convention used by the web client:
//! `_start`, `_end` (exclusive offset), `_sort`, `_order`, `title_like` and
//! `propertyType`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::property::Property;

/// Raw query-string parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(rename = "_start", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(rename = "_end", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "_sort", skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(rename = "_order", skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_like: Option<String>,
    #[serde(rename = "propertyType", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
}

/// Filter predicate, every present criterion must match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyFilter {
    /// Exact match.
    pub property_type: Option<String>,
    /// Case-insensitive substring of `title`.
    pub title_contains: Option<String>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        let type_matches = self
            .property_type
            .as_ref()
            .is_none_or(|t| &property.property_type == t);
        let title_matches = self.title_contains.as_ref().is_none_or(|needle| {
            property.title.to_lowercase().contains(&needle.to_lowercase())
        });

        type_matches && title_matches
    }
}

/// Sortable property fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Title,
    Price,
    PropertyType,
    Location,
    CreatedAt,
}

impl SortField {
    /// Database column.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Price => "price",
            SortField::PropertyType => "property_type",
            SortField::Location => "location",
            SortField::CreatedAt => "created_at",
        }
    }

    /// Query-string name.
    pub fn name(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Price => "price",
            SortField::PropertyType => "propertyType",
            SortField::Location => "location",
            SortField::CreatedAt => "createdAt",
        }
    }

    fn compare(self, a: &Property, b: &Property) -> Ordering {
        match self {
            SortField::Title => a.title.cmp(&b.title),
            SortField::Price => a.price.total_cmp(&b.price),
            SortField::PropertyType => a.property_type.cmp(&b.property_type),
            SortField::Location => a.location.cmp(&b.location),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(SortField::Title),
            "price" => Ok(SortField::Price),
            "propertyType" => Ok(SortField::PropertyType),
            "location" => Ok(SortField::Location),
            "createdAt" => Ok(SortField::CreatedAt),
            _ => Err(ServerError::ValidationFailure(format!(
                "cannot sort by `{s}`"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(ServerError::ValidationFailure(format!(
                "`_order` must be `asc` or `desc`, got `{s}`"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: Direction,
}

impl Sort {
    pub fn compare(&self, a: &Property, b: &Property) -> Ordering {
        let ordering = self.field.compare(a, b);
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// Zero-based offset window, `end` is exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Range {
    start: u64,
    end: Option<u64>,
}

impl Range {
    pub fn new(start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end.filter(|end| *end < start) {
            return Err(ServerError::ValidationFailure(format!(
                "`_end` ({end}) must not be lower than `_start` ({start})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Maximum number of items, `None` means up to the last one.
    pub fn limit(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

/// Listing request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filter: PropertyFilter,
    pub sort: Option<Sort>,
    pub range: Range,
}

impl ListQuery {
    pub fn filter(mut self, filter: PropertyFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, field: SortField, direction: Direction) -> Self {
        self.sort = Some(Sort { field, direction });
        self
    }

    pub fn range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }
}

/// One page of a listing with the count of every matching item.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

fn parse_offset(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                ServerError::ValidationFailure(format!(
                    "`{name}` must be a non-negative integer, got `{v}`"
                ))
            })
        })
        .transpose()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<ListParams> for ListQuery {
    type Error = ServerError;

    fn try_from(params: ListParams) -> Result<Self> {
        let start = parse_offset("_start", params.start.as_deref())?;
        let end = parse_offset("_end", params.end.as_deref())?;
        let range = Range::new(start.unwrap_or_default(), end)?;

        let sort = match (non_empty(params.sort), non_empty(params.order)) {
            (Some(field), order) => Some(Sort {
                field: field.parse()?,
                direction: order
                    .map(|o| o.parse())
                    .transpose()?
                    .unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(ServerError::ValidationFailure(
                    "`_order` requires `_sort`".into(),
                ));
            },
            (None, None) => None,
        };

        Ok(ListQuery {
            filter: PropertyFilter {
                property_type: non_empty(params.property_type),
                title_contains: non_empty(params.title_like),
            },
            sort,
            range,
        })
    }
}

impl From<&ListQuery> for ListParams {
    fn from(query: &ListQuery) -> Self {
        Self {
            start: Some(query.range.start().to_string()),
            end: query.range.end().map(|end| end.to_string()),
            sort: query.sort.map(|s| s.field.name().to_owned()),
            order: query.sort.map(|s| s.direction.name().to_owned()),
            title_like: query.filter.title_contains.clone(),
            property_type: query.filter.property_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "_start" => params.start = value,
                "_end" => params.end = value,
                "_sort" => params.sort = value,
                "_order" => params.order = value,
                "title_like" => params.title_like = value,
                "propertyType" => params.property_type = value,
                _ => unreachable!("unknown parameter {key}"),
            }
        }
        params
    }

    #[test]
    fn test_parse_full_query() {
        let query = ListQuery::try_from(params(&[
            ("_start", "10"),
            ("_end", "20"),
            ("_sort", "price"),
            ("_order", "desc"),
            ("title_like", "lake"),
            ("propertyType", "villa"),
        ]))
        .unwrap();

        assert_eq!(query.range, Range::new(10, Some(20)).unwrap());
        assert_eq!(query.range.start(), 10);
        assert_eq!(query.range.limit(), Some(10));
        assert_eq!(
            query.sort,
            Some(Sort {
                field: SortField::Price,
                direction: Direction::Desc
            })
        );
        assert_eq!(query.filter.title_contains.as_deref(), Some("lake"));
        assert_eq!(query.filter.property_type.as_deref(), Some("villa"));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let query = ListQuery::try_from(params(&[
            ("title_like", ""),
            ("propertyType", ""),
        ]))
        .unwrap();

        assert_eq!(query, ListQuery::default());
        assert_eq!(query.range.limit(), None);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for pairs in [
            vec![("_start", "-1")],
            vec![("_end", "ten")],
            vec![("_start", "20"), ("_end", "10")],
            vec![("_sort", "password")],
            vec![("_sort", "price"), ("_order", "sideways")],
            vec![("_order", "asc")],
        ] {
            let err = ListQuery::try_from(params(&pairs)).unwrap_err();
            assert!(
                matches!(err, ServerError::ValidationFailure(_)),
                "{pairs:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_range_bounds() {
        assert!(matches!(
            Range::new(5, Some(2)),
            Err(ServerError::ValidationFailure(_))
        ));
        assert_eq!(Range::new(5, Some(5)).unwrap().limit(), Some(0));
        assert_eq!(Range::new(5, None).unwrap().limit(), None);
        assert_eq!(Range::default().start(), 0);
    }

    #[test]
    fn test_params_round_trip() {
        let query = ListQuery::default()
            .sort(SortField::PropertyType, Direction::Asc)
            .range(Range::new(0, Some(12)).unwrap());
        let params = ListParams::from(&query);

        assert_eq!(params.sort.as_deref(), Some("propertyType"));
        assert_eq!(params.order.as_deref(), Some("asc"));
        assert_eq!(ListQuery::try_from(params).unwrap(), query);
    }
}
