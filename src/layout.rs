use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Every artifact path, derived from the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ca_dir(&self) -> PathBuf {
        self.root.join("ca")
    }

    pub fn ca_private_dir(&self) -> PathBuf {
        self.ca_dir().join("private")
    }

    pub fn ca_certs_dir(&self) -> PathBuf {
        self.ca_dir().join("certs")
    }

    pub fn ca_key(&self) -> PathBuf {
        self.ca_private_dir().join("ca.key.pem")
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.ca_certs_dir().join("ca.cert.pem")
    }

    pub fn ca_index(&self) -> PathBuf {
        self.ca_dir().join("index.txt")
    }

    pub fn ca_serial(&self) -> PathBuf {
        self.ca_dir().join("serial")
    }

    pub fn ca_passphrase_file(&self) -> PathBuf {
        self.ca_dir().join("passphrase.txt")
    }

    pub fn eu_dir(&self) -> PathBuf {
        self.root.join("eu")
    }

    pub fn eu_private_dir(&self) -> PathBuf {
        self.eu_dir().join("private")
    }

    pub fn eu_csr_dir(&self) -> PathBuf {
        self.eu_dir().join("csr")
    }

    pub fn eu_certs_dir(&self) -> PathBuf {
        self.eu_dir().join("certs")
    }

    pub fn eu_key(&self) -> PathBuf {
        self.eu_private_dir().join("key.pem")
    }

    pub fn eu_csr(&self) -> PathBuf {
        self.eu_csr_dir().join("csr.pem")
    }

    pub fn eu_cert(&self) -> PathBuf {
        self.eu_certs_dir().join("cert.pem")
    }

    pub fn eu_p12(&self) -> PathBuf {
        self.eu_certs_dir().join("cert.p12")
    }

    pub fn eu_passphrase_file(&self) -> PathBuf {
        self.eu_dir().join("passphrase.txt")
    }

    pub fn san_config(&self) -> PathBuf {
        self.root.join("san.openssl.cnf")
    }
}

/// Writes a file readable only by its owner, replacing any previous content.
pub fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten files that already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    Ok(())
}

/// Creates `path` and its parents; on Unix the leaf gets `mode`.
pub fn create_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/home/data");
        assert_eq!(layout.ca_key(), Path::new("/home/data/ca/private/ca.key.pem"));
        assert_eq!(layout.ca_cert(), Path::new("/home/data/ca/certs/ca.cert.pem"));
        assert_eq!(layout.ca_index(), Path::new("/home/data/ca/index.txt"));
        assert_eq!(layout.ca_serial(), Path::new("/home/data/ca/serial"));
        assert_eq!(layout.ca_passphrase_file(), Path::new("/home/data/ca/passphrase.txt"));
        assert_eq!(layout.eu_key(), Path::new("/home/data/eu/private/key.pem"));
        assert_eq!(layout.eu_csr(), Path::new("/home/data/eu/csr/csr.pem"));
        assert_eq!(layout.eu_cert(), Path::new("/home/data/eu/certs/cert.pem"));
        assert_eq!(layout.eu_p12(), Path::new("/home/data/eu/certs/cert.p12"));
        assert_eq!(layout.eu_passphrase_file(), Path::new("/home/data/eu/passphrase.txt"));
        assert_eq!(layout.san_config(), Path::new("/home/data/san.openssl.cnf"));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("secret.txt");
        write_private(&path, b"first").unwrap();
        write_private(&path, b"2nd").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "2nd");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passphrase.txt");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
