// mongotool/src/backup/archive.rs
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Builder;
use walkdir::WalkDir;

/// Create a gzipped tar archive from a dump directory.
///
/// Everything under `source_dir` lands in the archive below `root_name`
/// (conventionally `dump`), so an archive of `<scratch>/dump` extracts to
/// `dump/<database>/<collection files>`.
pub fn create_tar_gz_archive(
    source_dir: &Path,
    archive_dest_path: &Path,
    root_name: &str,
) -> Result<PathBuf> {
    if !source_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Source for archival is not a directory: {}",
            source_dir.display()
        ));
    }
    if let Some(parent) = archive_dest_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "Failed to create parent directory for archive: {}",
                parent.display()
            )
        })?;
    }

    let archive_file = File::create(archive_dest_path).with_context(|| {
        format!(
            "Failed to create archive file: {}",
            archive_dest_path.display()
        )
    })?;
    let enc = GzEncoder::new(archive_file, Compression::default());
    let mut tar_builder = Builder::new(enc);

    let root = Path::new(root_name);
    for entry in WalkDir::new(source_dir) {
        let entry = entry
            .with_context(|| format!("Failed to walk directory: {}", source_dir.display()))?;
        let path = entry.path();
        let relative = path.strip_prefix(source_dir).with_context(|| {
            format!(
                "Failed to strip prefix {} from {}",
                source_dir.display(),
                path.display()
            )
        })?;

        let name = root.join(relative);
        if path.is_dir() {
            tar_builder.append_dir(&name, path).with_context(|| {
                format!("Failed to append directory {} to archive", path.display())
            })?;
        } else if path.is_file() {
            tar_builder.append_path_with_name(path, &name).with_context(|| {
                format!(
                    "Failed to append file {} as {} to archive",
                    path.display(),
                    name.display()
                )
            })?;
        }
    }

    let encoder = tar_builder.into_inner().with_context(|| {
        format!(
            "Failed to finish tar stream for archive: {}",
            archive_dest_path.display()
        )
    })?;
    encoder.finish().with_context(|| {
        format!(
            "Failed to finish gzip encoding for archive: {}",
            archive_dest_path.display()
        )
    })?;

    Ok(archive_dest_path.to_path_buf())
}

/// Extract a gzipped tar archive into a destination directory.
pub fn extract_tar_gz_archive(archive_path: &Path, extract_to_dir: &Path) -> Result<PathBuf> {
    if !archive_path.is_file() {
        return Err(anyhow::anyhow!(
            "Archive for extraction is not a file: {}",
            archive_path.display()
        ));
    }
    std::fs::create_dir_all(extract_to_dir).with_context(|| {
        format!(
            "Failed to create extraction directory: {}",
            extract_to_dir.display()
        )
    })?;

    let archive_file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive file: {}", archive_path.display()))?;
    let gz_decoder = flate2::read::GzDecoder::new(archive_file);
    let mut archive = tar::Archive::new(gz_decoder);

    archive.unpack(extract_to_dir).with_context(|| {
        format!(
            "Failed to unpack archive {} to {}",
            archive_path.display(),
            extract_to_dir.display()
        )
    })?;

    Ok(extract_to_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_archive_roundtrip_with_dump_root() -> Result<()> {
        let scratch = tempfile::tempdir()?;
        let dump_dir = scratch.path().join("dump");
        fs::create_dir_all(dump_dir.join("shop"))?;
        fs::write(dump_dir.join("shop/orders.bson"), b"bson bytes")?;
        fs::write(dump_dir.join("shop/orders.metadata.json"), b"{}")?;

        let archive_path = scratch.path().join("backup.tar.gz");
        create_tar_gz_archive(&dump_dir, &archive_path, "dump")?;
        assert!(archive_path.is_file());

        let extract_dir = scratch.path().join("restore");
        extract_tar_gz_archive(&archive_path, &extract_dir)?;

        assert!(extract_dir.join("dump/shop/orders.bson").is_file());
        assert_eq!(
            fs::read(extract_dir.join("dump/shop/orders.bson"))?,
            b"bson bytes"
        );
        assert!(extract_dir.join("dump/shop/orders.metadata.json").is_file());
        Ok(())
    }

    #[test]
    fn test_archive_missing_source_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let result = create_tar_gz_archive(
            &scratch.path().join("not_there"),
            &scratch.path().join("out.tar.gz"),
            "dump",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let scratch = tempfile::tempdir().unwrap();
        let result = extract_tar_gz_archive(
            &scratch.path().join("ghost.tar.gz"),
            &scratch.path().join("out"),
        );
        assert!(result.is_err());
    }
}
