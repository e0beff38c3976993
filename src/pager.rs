use crate::error::{Error, Result};
use crate::page::Page;
use crate::page_layout::PAGE_SIZE;
use memmap::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, error};

/// File backed page cache.
///
/// Pages are addressed by number and live in an arena of at most
/// `max_pages` slots. Pages already on disk are copied out of a read-only
/// mapping of the file on first access; freshly allocated pages start zeroed.
/// Only pages handed out mutably are written back on flush.
pub struct Pager {
    fd: File,
    map: Option<Mmap>,
    file_pages: u32,
    num_pages: u32,
    max_pages: u32,
    cache: Vec<Option<Page>>,
    dirty: Vec<bool>,
    closed: bool,
}

impl Pager {
    pub fn open(path: &Path, max_pages: u32) -> Result<Pager> {
        let fd = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let file_length = fd.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "file length {} is not a whole number of {} byte pages",
                    file_length, PAGE_SIZE
                ),
            )));
        }
        let file_pages = (file_length / PAGE_SIZE as u64) as u32;
        if file_pages > max_pages {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "file holds {} pages, more than the limit of {}",
                    file_pages, max_pages
                ),
            )));
        }

        // Mapping an empty file fails, and there is nothing to read anyway.
        let map = if file_length > 0 {
            Some(unsafe { Mmap::map(&fd)? })
        } else {
            None
        };
        debug!(path = %path.display(), file_pages, max_pages, "opened pager");

        Ok(Pager {
            fd,
            map,
            file_pages,
            num_pages: file_pages,
            max_pages,
            cache: (0..max_pages).map(|_| None).collect(),
            dirty: vec![false; max_pages as usize],
            closed: false,
        })
    }

    /// Number of allocated pages, whether or not they were written yet.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn free_pages(&self) -> u32 {
        self.max_pages - self.num_pages
    }

    fn load(&mut self, page_num: u32) -> Result<usize> {
        if page_num >= self.max_pages {
            return Err(Error::OutOfBounds {
                page: page_num,
                limit: self.max_pages,
            });
        }
        if page_num >= self.num_pages {
            return Err(Error::OutOfBounds {
                page: page_num,
                limit: self.num_pages,
            });
        }
        let slot = page_num as usize;
        if self.cache[slot].is_none() {
            let page = match &self.map {
                Some(map) if page_num < self.file_pages => {
                    let offset = slot * PAGE_SIZE;
                    debug!(page_num, "loading page from disk");
                    Page::from_bytes(&map[offset..offset + PAGE_SIZE])
                }
                _ => Page::zeroed(),
            };
            self.cache[slot] = Some(page);
        }
        Ok(slot)
    }

    /// Returns the page, loading it from disk on first access.
    pub fn get_page(&mut self, page_num: u32) -> Result<&Page> {
        let slot = self.load(page_num)?;
        self.cache[slot].as_ref().ok_or(Error::OutOfBounds {
            page: page_num,
            limit: self.num_pages,
        })
    }

    /// Like [`Pager::get_page`], and marks the page for writing back.
    pub fn get_page_mut(&mut self, page_num: u32) -> Result<&mut Page> {
        let slot = self.load(page_num)?;
        self.dirty[slot] = true;
        let limit = self.num_pages;
        self.cache[slot].as_mut().ok_or(Error::OutOfBounds {
            page: page_num,
            limit,
        })
    }

    /// Replaces the content of an allocated page.
    pub fn put_page(&mut self, page_num: u32, page: Page) -> Result<()> {
        *self.get_page_mut(page_num)? = page;
        Ok(())
    }

    /// Hands out the next unused page number.
    pub fn allocate(&mut self) -> Result<u32> {
        if self.num_pages >= self.max_pages {
            return Err(Error::TableFull);
        }
        let page_num = self.num_pages;
        self.num_pages += 1;
        self.cache[page_num as usize] = Some(Page::zeroed());
        self.dirty[page_num as usize] = true;
        debug!(page_num, "allocated page");
        Ok(page_num)
    }

    /// Writes every modified page back to its offset in the file.
    pub fn flush(&mut self) -> Result<()> {
        let mut written = 0;
        for (slot, page) in self.cache.iter().enumerate() {
            let page = match page {
                Some(page) if self.dirty[slot] => page,
                _ => continue,
            };
            self.fd.seek(SeekFrom::Start((slot * PAGE_SIZE) as u64))?;
            self.fd.write_all(page.get_bytes())?;
            self.dirty[slot] = false;
            written += 1;
        }
        self.fd.flush()?;
        debug!(written, "flushed pages");
        Ok(())
    }

    /// Flushes and syncs the file; the pager is consumed.
    pub fn close(mut self) -> Result<()> {
        self.map.take();
        self.flush()?;
        self.fd.sync_all()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            error!(error = %e, "failed to flush pages while dropping the pager");
        }
    }
}
