//! Paged iteration over the objects of a pool.

use crate::errors::{ErrorCode, RadosError, Result};
use crate::marshal;
use crate::sys::{self, LibRados};
use std::ffi::CStr;
use std::marker::PhantomData;
use std::ptr;

/// Pull entries out of `fetch` into one page of at most `limit` names,
/// discarding `skip` leading entries first.
///
/// Returns the page and whether the source ran dry while building it. Pure
/// over the fetch closure, so paging behavior is testable without a native
/// iterator behind it.
pub(crate) fn drain_page<E>(
    fetch: &mut dyn FnMut() -> std::result::Result<Option<String>, E>,
    limit: usize,
    skip: u64,
) -> std::result::Result<(Vec<String>, bool), E> {
    for _ in 0..skip {
        if fetch()?.is_none() {
            return Ok((Vec::new(), true));
        }
    }
    let mut page = Vec::with_capacity(limit.min(1024));
    while page.len() < limit {
        match fetch()? {
            Some(name) => page.push(name),
            None => return Ok((page, true)),
        }
    }
    Ok((page, false))
}

/// A resumable cursor over the object names of one pool.
///
/// Each call to [`next_objects`](ListCtx::next_objects) replaces the held
/// page with the next batch of at most `page_size` names. When the native
/// iterator runs dry the cursor releases it immediately, but the final
/// (short) page stays readable through [`objects`](ListCtx::objects).
pub struct ListCtx<'pool> {
    list: Option<sys::rados_list_ctx_t>,
    page_size: usize,
    page: Vec<String>,
    _pool: PhantomData<&'pool ()>,
}

unsafe impl Send for ListCtx<'_> {}

impl ListCtx<'_> {
    pub(crate) fn from_raw(list: sys::rados_list_ctx_t, page_size: usize) -> Self {
        Self {
            list: Some(list),
            page_size,
            page: Vec::new(),
            _pool: PhantomData,
        }
    }

    /// Advance to the next page. Returns the number of names fetched; zero
    /// means the listing is exhausted.
    pub fn next_objects(&mut self) -> Result<usize> {
        self.next_objects_skipping(0)
    }

    /// Advance to the next page after discarding `skip` names.
    ///
    /// Skipping past the end of the listing yields an empty page and closes
    /// the cursor, same as reaching the end normally.
    pub fn next_objects_skipping(&mut self, skip: u64) -> Result<usize> {
        let Some(list) = self.list else {
            self.page.clear();
            return Ok(0);
        };
        let lib: &LibRados = sys::librados()?;
        let mut fetch = || -> Result<Option<String>> {
            let mut entry: *const libc::c_char = ptr::null();
            let r = unsafe { (lib.rados_objects_list_next)(list, &mut entry, ptr::null_mut()) };
            if r == ErrorCode::ENOENT.code() {
                return Ok(None);
            }
            if r < 0 {
                return Err(RadosError::from_status(
                    "failed to fetch the next object name".to_owned(),
                    r,
                ));
            }
            let name = unsafe { CStr::from_ptr(entry) };
            Ok(Some(marshal::buf_to_string(name.to_bytes())))
        };
        let (page, exhausted) = drain_page(&mut fetch, self.page_size, skip)?;
        self.page = page;
        if exhausted {
            self.close();
        }
        Ok(self.page.len())
    }

    /// Number of names in the current page.
    pub fn size(&self) -> usize {
        self.page.len()
    }

    /// The current page of object names.
    pub fn objects(&self) -> &[String] {
        &self.page
    }

    /// Release the native iterator. Safe to call more than once; the current
    /// page remains readable.
    pub fn close(&mut self) {
        if let Some(list) = self.list.take() {
            if let Ok(lib) = sys::librados() {
                unsafe { (lib.rados_objects_list_close)(list) };
            }
        }
    }
}

impl Drop for ListCtx<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(names: &[&str]) -> impl FnMut() -> Result<Option<String>> {
        let mut remaining: Vec<String> = names.iter().rev().map(|s| (*s).to_owned()).collect();
        move || Ok(remaining.pop())
    }

    #[test]
    fn full_page_is_not_exhausted() {
        let mut fetch = source(&["a", "b", "c"]);
        let (page, exhausted) = drain_page(&mut fetch, 2, 0).unwrap();
        assert_eq!(page, vec!["a", "b"]);
        assert!(!exhausted);
    }

    #[test]
    fn short_page_reports_exhaustion_but_keeps_names() {
        let mut fetch = source(&["a", "b", "c"]);
        let (page, exhausted) = drain_page(&mut fetch, 5, 0).unwrap();
        assert_eq!(page, vec!["a", "b", "c"]);
        assert!(exhausted);
    }

    #[test]
    fn skip_discards_leading_names() {
        let mut fetch = source(&["a", "b", "c", "d"]);
        let (page, exhausted) = drain_page(&mut fetch, 2, 1).unwrap();
        assert_eq!(page, vec!["b", "c"]);
        assert!(!exhausted);
    }

    #[test]
    fn skip_past_end_yields_empty_exhausted_page() {
        let mut fetch = source(&["a", "b"]);
        let (page, exhausted) = drain_page(&mut fetch, 4, 10).unwrap();
        assert!(page.is_empty());
        assert!(exhausted);
    }

    #[test]
    fn fetch_error_propagates() {
        let mut calls = 0;
        let mut fetch = || -> Result<Option<String>> {
            calls += 1;
            if calls > 1 {
                Err(RadosError::from_status("listing".to_owned(), -5))
            } else {
                Ok(Some("a".to_owned()))
            }
        };
        assert!(drain_page(&mut fetch, 4, 0).is_err());
    }

    #[test]
    fn closed_cursor_yields_empty_pages() {
        let mut ctx = ListCtx::from_raw(ptr::null_mut(), 4);
        ctx.list = None; // never opened natively
        assert_eq!(ctx.next_objects().unwrap(), 0);
        assert_eq!(ctx.size(), 0);
        assert!(ctx.objects().is_empty());
    }
}
