use graphql_client::GraphQLQuery;
use log::debug;

use super::client::GitHubClient;
use super::ratelimit::RateLimit;
use crate::error::{BumplineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// One page of results extracted from a response.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
    /// When set, the accumulated count must match it once pagination ends.
    pub total_count: Option<usize>,
    pub rate_limit: Option<RateLimit>,
}

impl<T> Page<T> {
    /// Builds a page from a connection's nodes, dropping null nodes.
    pub fn new<U: Into<T>>(
        nodes: Option<Vec<Option<U>>>,
        page_info: PageInfo,
        total_count: Option<usize>,
        rate_limit: Option<RateLimit>,
    ) -> Self {
        Self {
            items: nodes
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .map(Into::into)
                .collect(),
            page_info,
            total_count,
            rate_limit,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            page_info: PageInfo::default(),
            total_count: None,
            rate_limit: None,
        }
    }
}

/// Which way the cursor moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `last`/`before`, following `startCursor` while `hasPreviousPage`.
    Backward,
    /// `first`/`after`, following `endCursor` while `hasNextPage`.
    Forward,
}

impl Direction {
    fn next_cursor(self, info: &PageInfo) -> Option<String> {
        let (more, cursor) = match self {
            Direction::Backward => (info.has_previous_page, &info.start_cursor),
            Direction::Forward => (info.has_next_page, &info.end_cursor),
        };
        if more {
            cursor.clone()
        } else {
            None
        }
    }
}

/// How a list query walks its pages.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub direction: Direction,
    /// Reverse each page so newest-first pages accumulate oldest first.
    pub reverse_pages: bool,
}

impl Pagination {
    pub const BACKWARD: Pagination = Pagination {
        direction: Direction::Backward,
        reverse_pages: false,
    };

    pub const BACKWARD_REVERSED: Pagination = Pagination {
        direction: Direction::Backward,
        reverse_pages: true,
    };

    pub const FORWARD: Pagination = Pagination {
        direction: Direction::Forward,
        reverse_pages: false,
    };
}

impl GitHubClient {
    /// Runs `Q` page after page until the host reports no further page.
    ///
    /// `variables` builds the request for a cursor (`None` on the first page)
    /// and `extract` pulls the page out of the response. Every page goes
    /// through [`GitHubClient::execute`], so rate limiting is handled per
    /// request. When pages carry a total count, a final count mismatch is an
    /// error and the partial result is discarded.
    pub async fn paginate<Q, T, V, E>(
        &self,
        pagination: Pagination,
        variables: V,
        extract: E,
    ) -> Result<Vec<T>>
    where
        Q: GraphQLQuery,
        Q::Variables: Clone,
        V: Fn(Option<String>) -> Q::Variables,
        E: Fn(Q::ResponseData) -> Page<T>,
    {
        let mut items = Vec::new();
        let mut expected = None;
        let mut cursor = None;

        loop {
            let data = self.execute::<Q>(variables(cursor.take())).await?;
            let mut page = extract(data);

            if let Some(rate_limit) = &page.rate_limit {
                rate_limit.show().await;
            }
            if page.total_count.is_some() {
                expected = page.total_count;
            }
            if pagination.reverse_pages {
                page.items.reverse();
            }
            items.append(&mut page.items);

            match pagination.direction.next_cursor(&page.page_info) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if let Some(expected) = expected {
            if expected != items.len() {
                return Err(BumplineError::PaginationMismatch {
                    found: items.len(),
                    expected,
                });
            }
        }

        debug!("{} items found", items.len());
        Ok(items)
    }
}
