//! Query builder over one entity type's table.
//!
//! [`DataQuery`] translates equality filters keyed by logical property name
//! plus pagination into a result set of ids or hydrated entities, reusing
//! the data store's read path for hydration. No general SQL building: the
//! filter language is equality and pagination, nothing more.

use crate::entity::Entity;
use crate::error::DataError;
use crate::store::DataStore;
use crate::value::Value;
use std::collections::VecDeque;

/// Page size used when iterating an unbounded query.
const SCAN_CHUNK: usize = 100;

/// Result shape selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fields {
    /// Bare ids only.
    Ids,
    /// Fully hydrated entities.
    Objects,
}

/// Results of a [`DataQuery::run`].
#[derive(Debug)]
pub enum QueryResults {
    Ids(Vec<i64>),
    Objects(Vec<Entity>),
}

impl QueryResults {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QueryResults::Ids(ids) => ids.len(),
            QueryResults::Objects(objects) => objects.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for an equality/pagination query against one data store.
///
/// Results are ordered by the schema's declared default ordering column
/// unless overridden. A query matching nothing yields an empty sequence,
/// never an error.
pub struct DataQuery<'a> {
    store: &'a DataStore,
    filters: Vec<(String, Value)>,
    per_page: Option<usize>,
    page: usize,
    order_by: Option<String>,
    fields: Fields,
}

impl<'a> DataQuery<'a> {
    #[must_use]
    pub fn new(store: &'a DataStore) -> Self {
        Self {
            store,
            filters: Vec::new(),
            per_page: None,
            page: 1,
            order_by: None,
            fields: Fields::Objects,
        }
    }

    /// Add an equality condition on a logical property (mapped to its
    /// physical column at execution; already-prefixed names pass through).
    #[must_use]
    pub fn filter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((property.into(), value.into()));
        self
    }

    /// Limit results to one page of this size.
    #[must_use]
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Select which page to return (1-based; only meaningful with
    /// [`per_page`](Self::per_page)).
    #[must_use]
    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    /// Override the ordering column (logical or physical name).
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Execute, returning the shape selected by [`fields`](Self::fields).
    pub fn run(&self) -> Result<QueryResults, DataError> {
        match self.fields {
            Fields::Ids => Ok(QueryResults::Ids(self.ids()?)),
            Fields::Objects => Ok(QueryResults::Objects(self.objects()?)),
        }
    }

    /// All matching ids.
    pub fn ids(&self) -> Result<Vec<i64>, DataError> {
        self.iter_ids().collect()
    }

    /// All matching entities, hydrated through the store's read path. Rows
    /// deleted between the id scan and hydration are skipped.
    pub fn objects(&self) -> Result<Vec<Entity>, DataError> {
        let mut objects = Vec::new();
        for id in self.iter_ids() {
            let mut entity = self.store.new_entity();
            entity.set_id(id?);
            match self.store.read(&mut entity) {
                Ok(()) => objects.push(entity),
                Err(DataError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(objects)
    }

    /// Lazy iterator over matching ids.
    ///
    /// With `per_page` set, exactly that page is fetched; otherwise the
    /// backend is scanned chunk by chunk. The iterator is finite and
    /// restartable; calling `iter_ids` again re-runs the query.
    #[must_use]
    pub fn iter_ids(&self) -> IdIter<'_> {
        let page_size = self.per_page.unwrap_or(SCAN_CHUNK);
        IdIter {
            query: self,
            page_size,
            single_page: self.per_page.is_some(),
            next_offset: (self.page - 1) * page_size,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    fn physical_filters(&self) -> Vec<(String, Value)> {
        let schema = self.store.schema();
        self.filters
            .iter()
            .map(|(prop, value)| {
                let column = if schema.has_column(prop) {
                    schema.physical_column(prop)
                } else {
                    prop.clone()
                };
                (column, value.clone())
            })
            .collect()
    }

    fn order_column(&self) -> String {
        let schema = self.store.schema();
        match &self.order_by {
            Some(col) if schema.has_column(col) => schema.physical_column(col),
            Some(col) => col.clone(),
            None => schema.default_order_column(),
        }
    }
}

/// Lazy, finite iterator over a query's matching ids.
pub struct IdIter<'a> {
    query: &'a DataQuery<'a>,
    page_size: usize,
    single_page: bool,
    next_offset: usize,
    buffer: VecDeque<i64>,
    done: bool,
}

impl IdIter<'_> {
    fn fetch(&mut self) -> Result<(), DataError> {
        let store = self.query.store;
        let schema = store.schema();
        let ids = store.backend().select_ids(
            store.table(),
            schema.id_field(),
            &self.query.physical_filters(),
            &self.query.order_column(),
            Some(self.page_size),
            self.next_offset,
        )?;

        if self.single_page || ids.len() < self.page_size {
            self.done = true;
        }
        self.next_offset += ids.len();
        self.buffer.extend(ids);
        Ok(())
    }
}

impl Iterator for IdIter<'_> {
    type Item = Result<i64, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if self.done {
                return None;
            }
            if let Err(err) = self.fetch() {
                self.done = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
