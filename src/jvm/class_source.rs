//! Places to find class file bytes
//!
//! Nothing in the class file model goes looking for classes on its own: callers that want to
//! read a class by name go through a [`ClassSource`] (see [`ClassFile::load`]).
//!
//! [`ClassFile::load`]: crate::jvm::class_file::ClassFile::load

use crate::jvm::descriptors::to_binary_name;
use crate::jvm::Error;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Source of raw class file bytes, looked up by class name
pub trait ClassSource {
    /// Bytes of the class with the given name (qualified `foo.Bar` or binary `foo/Bar`)
    ///
    /// Fails with [`Error::ClassNotFound`] if the class isn't there.
    fn open(&self, name: &str) -> Result<Vec<u8>, Error>;
}

/// Classes laid out in a class path directory (`foo/Bar.class` for `foo.Bar`)
#[derive(Debug, Clone)]
pub struct DirectoryClassSource {
    root: PathBuf,
}

impl DirectoryClassSource {
    pub fn new<P: AsRef<Path>>(root: P) -> DirectoryClassSource {
        DirectoryClassSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path at which the class would be found
    pub fn class_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in to_binary_name(name).split('/') {
            path.push(segment);
        }
        path.set_extension("class");
        path
    }
}

impl ClassSource for DirectoryClassSource {
    fn open(&self, name: &str) -> Result<Vec<u8>, Error> {
        let path = self.class_path(name);
        log::debug!("Reading {} from {}", name, path.display());
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(Error::ClassNotFound(name.to_owned()))
            }
            Err(err) => Err(Error::IoError(err)),
        }
    }
}

/// Classes held in memory, keyed by binary name
#[derive(Debug, Clone, Default)]
pub struct MemoryClassSource {
    classes: HashMap<String, Vec<u8>>,
}

impl MemoryClassSource {
    pub fn new() -> MemoryClassSource {
        MemoryClassSource::default()
    }

    /// Register class bytes (replacing any previous bytes for the same class)
    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) {
        self.classes.insert(to_binary_name(name), bytes);
    }
}

impl ClassSource for MemoryClassSource {
    fn open(&self, name: &str) -> Result<Vec<u8>, Error> {
        self.classes
            .get(&to_binary_name(name))
            .cloned()
            .ok_or_else(|| Error::ClassNotFound(name.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_source() {
        let mut source = MemoryClassSource::new();
        source.insert("foo.Bar", vec![1, 2, 3]);
        assert_eq!(source.open("foo/Bar").unwrap(), vec![1, 2, 3]);
        assert_eq!(source.open("foo.Bar").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            source.open("foo.Baz"),
            Err(Error::ClassNotFound(name)) if name == "foo.Baz"
        ));
    }

    #[test]
    fn directory_source() {
        let root = std::env::temp_dir().join(format!("classedit-source-{}", std::process::id()));
        let source = DirectoryClassSource::new(&root);
        let path = source.class_path("foo.Bar");
        assert_eq!(path, root.join("foo").join("Bar.class"));

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, [0xCA, 0xFE]).unwrap();
        assert_eq!(source.open("foo/Bar").unwrap(), vec![0xCA, 0xFE]);
        assert!(matches!(
            source.open("foo/Missing"),
            Err(Error::ClassNotFound(_))
        ));
        fs::remove_dir_all(&root).unwrap();
    }
}
