//! Purpose: Slice a value sequence into a requested page.
//! Exports: `PageRequest`, `Page`, `paginate`.
//! Role: Final pipeline stage; validates bounds and reports the pre-slice total.
//! Invariants: `page` and `page_size` are positive; a start offset at or past
//! the sequence end is `OutOfRange`, including page 1 over an empty sequence.
//! Invariants: The returned slice never exceeds `page_size` elements.

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Result<Self, Error> {
        if page == 0 || page_size == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("invalid page or page_size values")
                .with_hint("Both page and page_size must be at least 1."));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub values: Vec<T>,
    pub total: usize,
}

pub fn paginate<T>(values: Vec<T>, request: &PageRequest) -> Result<Page<T>, Error> {
    let total = values.len();
    let start = match (request.page - 1).checked_mul(request.page_size) {
        Some(start) if start < total => start,
        _ => {
            return Err(Error::new(ErrorKind::OutOfRange)
                .with_message("page out of range")
                .with_hint(format!(
                    "The result set has {total} values; request a page whose start offset is below that."
                )));
        }
    };
    let mut values = values;
    let mut slice = values.split_off(start);
    slice.truncate(request.page_size);
    Ok(Page {
        values: slice,
        total,
    })
}
