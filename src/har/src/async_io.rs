//! `tokio`-gated async wrappers over the synchronous read path (§5).
//!
//! The codec itself stays synchronous; these wrappers just move a blocking
//! read off whatever executor the caller is running, mirroring how the
//! teacher crate's async surfaces (where present) wrap a sync core rather
//! than reimplementing it.

use std::path::PathBuf;

use crate::error::{HarError, Result};
use crate::file::HeaderArrayFile;

/// Reads a `.har` file on a blocking thread pool, returning the parsed file.
pub async fn read_har_async(path: PathBuf) -> Result<HeaderArrayFile> {
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path)?;
        HeaderArrayFile::read(std::io::Cursor::new(bytes))
    })
    .await
    .map_err(|join_err| HarError::IoFailure {
        offset: None,
        source: std::io::Error::new(std::io::ErrorKind::Other, join_err),
    })?
}

/// Writes a `.har` file on a blocking thread pool.
pub async fn write_har_async(path: PathBuf, file: HeaderArrayFile) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        let mut bytes = Vec::new();
        file.write(&mut bytes)?;
        std::fs::write(&path, bytes)?;
        Ok(())
    })
    .await
    .map_err(|join_err| HarError::IoFailure {
        offset: None,
        source: std::io::Error::new(std::io::ErrorKind::Other, join_err),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{HeaderArray, HeaderMeta, IndexedDict};

    #[tokio::test]
    async fn round_trips_a_file_through_the_async_wrappers() {
        let meta = HeaderMeta {
            header: "ABCD".to_string(),
            coefficient: "ABCD".to_string(),
            description: String::new(),
            dimensions: vec![2],
        };
        let dict = IndexedDict::from_dense(vec![], vec![2], vec![1i32, 2]);
        let file = HeaderArrayFile::new(vec![HeaderArray::I2(meta, dict)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.har");

        write_har_async(path.clone(), file.clone()).await.unwrap();
        let read_back = read_har_async(path).await.unwrap();
        assert_eq!(read_back, file);
    }
}
