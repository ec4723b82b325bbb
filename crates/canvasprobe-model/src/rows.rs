use std::any::Any;
use std::fmt;
use std::sync::Arc;

use canvasprobe_common::{FormulaValue, ItemPath, ProbeError, RecordType, TableValue};
use canvasprobe_gateway::{PollBridge, fetch_item_count};

use crate::record::ControlRecord;
use crate::schema::ControlSchema;

/// Live view over the rows of a repeating container.
///
/// Nothing is materialized: the row count is queried on every call and a row
/// is only an address plus the row schema until one of its fields is read.
#[derive(Clone)]
pub struct RowCollection {
    /// Container control scoped to its items property, e.g. `Gallery1.AllItems`.
    path: ItemPath,
    row_schema: Arc<ControlSchema>,
    bridge: Arc<PollBridge>,
}

impl fmt::Debug for RowCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCollection")
            .field("path", &self.path.to_string())
            .field("row_fields", &self.row_schema.len())
            .finish()
    }
}

impl RowCollection {
    pub(crate) fn new(path: ItemPath, row_schema: Arc<ControlSchema>, bridge: Arc<PollBridge>) -> Self {
        Self {
            path,
            row_schema,
            bridge,
        }
    }

    pub fn item_path(&self) -> &ItemPath {
        &self.path
    }

    pub fn row_schema(&self) -> &Arc<ControlSchema> {
        &self.row_schema
    }

    /// Current number of rows. Always a remote query.
    pub fn count(&self) -> Result<usize, ProbeError> {
        self.bridge.item_count(&self.path)
    }

    pub async fn count_async(&self) -> Result<usize, ProbeError> {
        fetch_item_count(self.bridge.gateway().as_ref(), &self.path).await
    }

    /// Row `index`, checked against the live count.
    pub fn row(&self, index: usize) -> Result<ControlRecord, ProbeError> {
        let count = self.count()?;
        check_index(index, count)?;
        Ok(self.row_unchecked(index))
    }

    pub async fn row_async(&self, index: usize) -> Result<ControlRecord, ProbeError> {
        let count = self.count_async().await?;
        check_index(index, count)?;
        Ok(self.row_unchecked(index))
    }

    /// Row `index` without consulting the count. Reads through it fail remotely
    /// if the row does not exist.
    pub fn row_unchecked(&self, index: usize) -> ControlRecord {
        ControlRecord::row(
            self.path.with_index(index),
            Arc::clone(&self.row_schema),
            Arc::clone(&self.bridge),
        )
    }

    /// Enumerate the rows present right now.
    ///
    /// The count is queried once, when enumeration starts; call again for a
    /// fresh pass.
    pub fn rows(&self) -> Result<RowIter<'_>, ProbeError> {
        let count = self.count()?;
        Ok(RowIter {
            rows: self,
            next: 0,
            count,
        })
    }
}

fn check_index(index: usize, count: usize) -> Result<(), ProbeError> {
    if index >= count {
        return Err(ProbeError::Index { index, count });
    }
    Ok(())
}

/// One enumeration pass over a [`RowCollection`].
#[derive(Debug)]
pub struct RowIter<'a> {
    rows: &'a RowCollection,
    next: usize,
    count: usize,
}

impl Iterator for RowIter<'_> {
    type Item = ControlRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let row = self.rows.row_unchecked(self.next);
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.count - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RowIter<'_> {}

impl TableValue for RowCollection {
    fn row_type(&self) -> &RecordType {
        self.row_schema.record_type()
    }

    fn count(&self) -> Result<usize, ProbeError> {
        RowCollection::count(self)
    }

    fn row(&self, index: usize) -> Result<FormulaValue, ProbeError> {
        Ok(FormulaValue::Record(Arc::new(RowCollection::row(self, index)?)))
    }

    fn iter_rows<'a>(
        &'a self,
    ) -> Result<Box<dyn Iterator<Item = Result<FormulaValue, ProbeError>> + 'a>, ProbeError> {
        let rows = self.rows()?;
        Ok(Box::new(
            rows.map(|row| Ok(FormulaValue::Record(Arc::new(row)))),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
