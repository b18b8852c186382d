use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{BlockSink, HeaderEvent};
use crate::error::ParseError;
use crate::module_type::ModuleType;

/// Where a [`DumpingSink`] puts module payloads.
pub trait ModuleStore {
    fn store(&mut self, name: &str, data: &[u8]) -> io::Result<()>;
}

/// Writes each module to `<root>/<name>`, replacing any existing file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_owned() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModuleStore for DirectoryStore {
    fn store(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        if !self.root.exists() { fs::create_dir_all(&self.root)?; }
        File::create(self.root.join(name))?.write_all(data)
    }
}

/// Persists every payload under the lower-case name of its module type.
///
/// The header's module code must be in the type table and its display name
/// must agree with the table name, otherwise the parse fails.
pub struct DumpingSink<S: ModuleStore> {
    store:   S,
    current: Option<ModuleType>,
    written: Vec<(ModuleType, usize)>,
}

impl<S: ModuleStore> DumpingSink<S> {
    pub fn new(store: S) -> Self {
        Self { store, current: None, written: Vec::new() }
    }

    /// Module type from the most recent header.
    pub fn current(&self) -> Option<ModuleType> {
        self.current
    }

    /// Every module stored so far with its payload size, in stream order.
    pub fn written(&self) -> &[(ModuleType, usize)] {
        &self.written
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: ModuleStore> BlockSink for DumpingSink<S> {
    fn on_header(&mut self, header: &HeaderEvent<'_>) -> Result<(), ParseError> {
        let module = ModuleType::lookup(header.module_id)?;
        if !module.matches_display_name(header.display_name) {
            return Err(ParseError::NameMismatch {
                display_name: header.display_name.to_owned(),
                expected:     module.name(),
            });
        }
        self.current = Some(module);
        Ok(())
    }

    fn on_data(&mut self, payload: &[u8]) -> Result<(), ParseError> {
        let Some(module) = self.current else {
            return Ok(());
        };
        if self.written.iter().any(|(m, _)| *m == module) {
            warn!("{} appears more than once; overwriting", module.file_name());
        }
        self.store.store(&module.file_name(), payload)?;
        info!("wrote {} ({} bytes)", module.file_name(), payload.len());
        self.written.push((module, payload.len()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::module_type::ModuleId;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore(HashMap<String, Vec<u8>>);

    impl ModuleStore for MemoryStore {
        fn store(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
            self.0.insert(name.to_owned(), data.to_vec());
            Ok(())
        }
    }

    fn event(display_name: &str, module_id: [u8; 4]) -> HeaderEvent<'_> {
        HeaderEvent {
            offset:        92,
            unlock_code:   &crate::block::UNLOCK_CODE,
            module_id:     ModuleId(module_id),
            date:          "",
            time:          "",
            display_name,
            block_size:    0,
            block_size_hw: 0,
            data_len:      4,
            extra_header:  &[],
        }
    }

    #[test]
    fn stores_under_lowercase_type_name() {
        let mut sink = DumpingSink::new(MemoryStore::default());
        sink.on_header(&event("boot", [0, 0, 0, 0xFC])).unwrap();
        assert_eq!(sink.current(), Some(ModuleType::Boot));
        sink.on_data(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(sink.written(), &[(ModuleType::Boot, 4)]);
        let store = sink.into_store();
        assert_eq!(store.0["boot"], vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn unknown_code_is_a_lookup_error() {
        let mut sink = DumpingSink::new(MemoryStore::default());
        let err = sink.on_header(&event("BOOT", [0, 0, 0, 0x01])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn mismatched_display_name_is_a_format_error() {
        let mut sink = DumpingSink::new(MemoryStore::default());
        let err = sink.on_header(&event("RECOVERY", [0, 0, 0, 0xFC])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(err, ParseError::NameMismatch { expected: "BOOT", .. }));
    }

    #[test]
    fn directory_store_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let mut store = DirectoryStore::new(&root);
        store.store("modem", b"firmware").unwrap();
        assert_eq!(fs::read(root.join("modem")).unwrap(), b"firmware");
    }
}
