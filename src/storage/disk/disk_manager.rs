use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::Result;

/// DiskManager is responsible for reading and writing pages to/from disk.
/// It manages a single table file laid out as a flat sequence of fixed-size
/// pages (page 0 first, no file header) and tracks how many pages exist.
pub struct DiskManager {
    /// The backing file
    db_file: Mutex<File>,
    /// Path to the backing file
    db_path: PathBuf,
    /// Bytes per page
    page_size: usize,
    /// Number of pages currently allocated
    num_pages: AtomicU32,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the file at `db_path`, creating it if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / page_size as u64) as u32;

        Ok(Self {
            db_file: Mutex::new(file),
            db_path: db_path.as_ref().to_path_buf(),
            page_size,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Reads page `page_no` into the provided buffer.
    /// Fails with `UnexpectedEof` if the page lies beyond the end of the file.
    pub fn read_page(&self, page_no: u32, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), self.page_size, "Buffer must be page_size bytes");

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(self.offset(page_no)))?;
        file.read_exact(data)?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes page `page_no` from the provided buffer.
    pub fn write_page(&self, page_no: u32, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), self.page_size, "Buffer must be page_size bytes");

        let mut file = self.db_file.lock();
        self.write_at(&mut file, page_no, data)
    }

    /// Appends a zero-initialized page and returns its page number.
    ///
    /// The page count is bumped only after the zeros are on disk, with the
    /// file lock still held, so every page counted by `num_pages` is readable.
    pub fn allocate_page(&self) -> Result<u32> {
        let mut file = self.db_file.lock();
        let page_no = self.num_pages.load(Ordering::SeqCst);

        let zeros = vec![0u8; self.page_size];
        self.write_at(&mut file, page_no, &zeros)?;
        self.num_pages.store(page_no + 1, Ordering::SeqCst);

        Ok(page_no)
    }

    /// Returns the number of pages currently allocated.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of disk reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.db_file.lock();
        file.sync_all()?;
        Ok(())
    }

    /// Byte offset of page `page_no` in the file.
    fn offset(&self, page_no: u32) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    fn write_at(&self, file: &mut File, page_no: u32, data: &[u8]) -> Result<()> {
        file.seek(SeekFrom::Start(self.offset(page_no)))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.db_file.get_mut();
        let _ = file.sync_all();
    }
}
