//! Archive primitives: integrity digests and tar.gz extraction

use crate::Result;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tar::Archive;

/// Hex SHA-256 of a file's contents, read in a streaming fashion
pub fn digest(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extract a gzip-compressed tarball into `dest`.
///
/// Existing files are overwritten, so re-extracting into a populated
/// directory is safe. Entries that would land outside `dest` are rejected.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_overwrite(true);

    fs::create_dir_all(dest)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.to_path_buf();

        if !entry.unpack_in(dest)? {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "archive {} escapes extraction directory: {}",
                    archive_path.display(),
                    entry_path.display()
                ),
            )
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_tar_gz(path: &Path, files: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_digest_known_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();

        assert_eq!(
            digest(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_extract_is_repeatable() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("pkg.tar.gz");
        write_tar_gz(&archive, &[("src/lib.q", "fn main() {}"), ("README", "docs")]);

        let dest = temp.path().join("out");
        extract(&archive, &dest).unwrap();
        extract(&archive, &dest).unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("src/lib.q")).unwrap(),
            "fn main() {}"
        );
        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "docs");
    }

    #[test]
    fn test_extract_rejects_non_gzip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.tar.gz");
        fs::write(&archive, "not an archive").unwrap();

        assert!(extract(&archive, &temp.path().join("out")).is_err());
    }
}
