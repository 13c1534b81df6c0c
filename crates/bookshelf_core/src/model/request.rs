//! Parsed, validated request values.
//!
//! # Invariants
//! - A `Request` always names an endpoint known to the registry it was
//!   parsed against.
//! - Exactly one [`Selection`] is active per request.

/// Page size applied when `itemsPerPage` is absent.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 50;
/// Page applied when `currentPage` is absent.
pub const DEFAULT_CURRENT_PAGE: u32 = 1;

pub const BOOKS_ENDPOINT: &str = "books";
pub const PREFERENCES_ENDPOINT: &str = "preferences";
pub const CUSTOM_COLUMNS_ENDPOINT: &str = "customColumns";

/// Protocol namespace prefix stripped from the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Api,
    Rss,
    Opds,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Api, Namespace::Rss, Namespace::Opds];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Api => "/api",
            Self::Rss => "/rss",
            Self::Opds => "/opds",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Books,
    /// A relational field browsable by its public name.
    Category(String),
    Preferences,
    CustomColumns,
}

impl Endpoint {
    pub fn label(&self) -> &str {
        match self {
            Self::Books => BOOKS_ENDPOINT,
            Self::Category(name) => name,
            Self::Preferences => PREFERENCES_ENDPOINT,
            Self::CustomColumns => CUSTOM_COLUMNS_ENDPOINT,
        }
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Preferences | Self::CustomColumns)
    }
}

/// One page of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub items_per_page: u32,
    pub current_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            current_page: DEFAULT_CURRENT_PAGE,
        }
    }
}

impl Page {
    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.items_per_page)
    }

    /// Number of the last page for `total` items; at least 1.
    pub fn last_page(&self, total: u64) -> u64 {
        let per_page = u64::from(self.items_per_page.max(1));
        total.div_ceil(per_page).max(1)
    }
}

/// What portion of the endpoint the request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// A single book addressed by path id.
    Resource(i64),
    /// One page of a collection.
    Collection(Page),
    /// Every item, unpaginated.
    AllItems,
}

/// Category membership a book query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Books linked to one category item (`/tags/11`).
    Item(i64),
    /// Books linked to any item of the category (`/tags?fields=books`).
    AnyItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A parsed request. Created per URL and discarded with its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub namespace: Option<Namespace>,
    pub endpoint: Endpoint,
    /// Literal id from the path, if any.
    pub path_id: Option<i64>,
    /// Ids from `ids=`; takes precedence when populating the working set.
    pub ids: Option<Vec<i64>>,
    pub selection: Selection,
    /// Set when a category endpoint resolves to books.
    pub membership: Option<Membership>,
    pub sort: Option<String>,
    pub order: SortOrder,
    /// Explicit projection; empty means the full book projection.
    pub fields: Vec<String>,
    pub is_custom_field: bool,
    /// Decoded query pairs in original order, replayed when building links.
    pub query_pairs: Vec<(String, String)>,
}

impl Request {
    pub fn is_collection(&self) -> bool {
        !matches!(self.selection, Selection::Resource(_))
    }

    /// Result rows are books.
    pub fn is_book_query(&self) -> bool {
        matches!(self.endpoint, Endpoint::Books) || self.membership.is_some()
    }

    pub fn all_items(&self) -> bool {
        matches!(self.selection, Selection::AllItems)
    }

    /// Active pagination, if any.
    pub fn page(&self) -> Option<Page> {
        match self.selection {
            Selection::Collection(page) => Some(page),
            Selection::Resource(_) | Selection::AllItems => None,
        }
    }

    /// Path without namespace, e.g. `/tags/11`.
    pub fn resource_path(&self) -> String {
        match self.path_id {
            Some(id) => format!("/{}/{id}", self.endpoint.label()),
            None => format!("/{}", self.endpoint.label()),
        }
    }

    /// Path including the namespace prefix it was requested under.
    pub fn full_path(&self) -> String {
        let prefix = self.namespace.map_or("", Namespace::prefix);
        format!("{prefix}{}", self.resource_path())
    }

    /// Whether `currentPage` appeared in the query string.
    pub fn has_explicit_page(&self) -> bool {
        self.query_pairs.iter().any(|(key, _)| key == "currentPage")
    }
}
