use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Drops the archive's top-level `<owner>-<repo>-<sha>/` directory. `None`
/// for the root entry itself; an error for anything that would escape.
fn sanitize_archive_path(path: &Path) -> Result<Option<PathBuf>> {
    let stripped: PathBuf = path.components().skip(1).collect();
    if stripped.as_os_str().is_empty() {
        return Ok(None);
    }

    for component in stripped.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(
                    "archive",
                    format!("unsafe path component in {}", path.display()),
                ));
            }
        }
    }

    Ok(Some(stripped))
}

/// Unpacks the part of a GitHub tarball under `subdir` (everything when
/// `None`) into `dest`. Returns the number of files written.
pub fn extract_subdir(gzipped: &[u8], subdir: Option<&Path>, dest: &Path) -> Result<usize> {
    let archive_err = |e: std::io::Error| Error::fetch("archive", e.to_string());

    std::fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let decoder = flate2::read::GzDecoder::new(gzipped);
    let mut archive = tar::Archive::new(decoder);
    let mut written = 0;

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::debug!("skipping link entry in archive");
            continue;
        }

        let path = entry.path().map_err(archive_err)?.into_owned();
        let Some(relative) = sanitize_archive_path(&path)? else {
            continue;
        };
        let relative = match subdir {
            Some(subdir) => match relative.strip_prefix(subdir) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => continue,
            },
            None => relative,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = dest.join(&relative);
        if entry_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
            continue;
        }
        if !entry_type.is_file() {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        entry.unpack(&target).map_err(|e| Error::io(&target, e))?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn sanitize_rejects_parent_dir() {
        assert!(sanitize_archive_path(Path::new("root/../../etc/passwd")).is_err());
        assert_eq!(sanitize_archive_path(Path::new("root")).unwrap(), None);
        assert_eq!(
            sanitize_archive_path(Path::new("root/skills/demo/SKILL.md")).unwrap(),
            Some(PathBuf::from("skills/demo/SKILL.md"))
        );
    }

    #[test]
    fn extracts_only_subdir() {
        let bytes = tarball(&[
            ("o-r-abc/README.md", "readme"),
            ("o-r-abc/skills/pdf/SKILL.md", "# PDF"),
            ("o-r-abc/skills/pdf/scripts/run.py", "print()"),
            ("o-r-abc/skills/other/SKILL.md", "# Other"),
        ]);
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("pdf");

        let written = extract_subdir(&bytes, Some(Path::new("skills/pdf")), &dest).unwrap();

        assert_eq!(written, 2);
        assert_eq!(std::fs::read_to_string(dest.join("SKILL.md")).unwrap(), "# PDF");
        assert!(dest.join("scripts/run.py").is_file());
        assert!(!dest.join("README.md").exists());
    }

    #[test]
    fn extracts_whole_repo() {
        let bytes = tarball(&[("o-r-abc/SKILL.md", "# Root"), ("o-r-abc/a/b.txt", "b")]);
        let tmp = TempDir::new().unwrap();

        let written = extract_subdir(&bytes, None, tmp.path()).unwrap();
        assert_eq!(written, 2);
        assert!(tmp.path().join("a/b.txt").is_file());
    }

    #[test]
    fn missing_subdir_writes_nothing() {
        let bytes = tarball(&[("o-r-abc/README.md", "readme")]);
        let tmp = TempDir::new().unwrap();
        let written = extract_subdir(&bytes, Some(Path::new("skills/x")), tmp.path()).unwrap();
        assert_eq!(written, 0);
    }
}
