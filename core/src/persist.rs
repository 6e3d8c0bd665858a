use crate::error::SearchError;
use crate::keyword::KeywordIndex;
use crate::{Document, IndexMetadata, LoadedIndex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const RECORDS_FILE: &str = "records.bin";
pub const KEYWORDS_FILE: &str = "keywords.bin";

/// The primary artifact: metadata block plus the ordered document list.
#[derive(Deserialize)]
struct RecordStore {
    metadata: IndexMetadata,
    documents: Vec<Document>,
}

#[derive(Serialize)]
struct RecordStoreRef<'a> {
    metadata: &'a IndexMetadata,
    documents: &'a [Document],
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn records(&self) -> PathBuf {
        self.root.join(RECORDS_FILE)
    }

    fn keywords(&self) -> PathBuf {
        self.root.join(KEYWORDS_FILE)
    }
}

pub fn save_index(
    paths: &IndexPaths,
    metadata: &IndexMetadata,
    documents: &[Document],
    keywords: &KeywordIndex,
) -> Result<(), SearchError> {
    create_dir_all(&paths.root)?;
    write_artifact(
        &paths.records(),
        RECORDS_FILE,
        &RecordStoreRef {
            metadata,
            documents,
        },
    )?;
    write_artifact(&paths.keywords(), KEYWORDS_FILE, keywords)?;
    Ok(())
}

/// Load both artifacts. Either one missing is fatal: a record store without
/// its keyword statistics (or the reverse) cannot score queries.
pub fn load_index(paths: &IndexPaths) -> Result<LoadedIndex, SearchError> {
    let store: RecordStore = read_artifact(&paths.records(), RECORDS_FILE, &paths.root)?;
    let keywords: KeywordIndex = read_artifact(&paths.keywords(), KEYWORDS_FILE, &paths.root)?;
    Ok(LoadedIndex {
        metadata: store.metadata,
        documents: store.documents,
        keywords,
    })
}

fn write_artifact<T: Serialize>(
    path: &Path,
    artifact: &'static str,
    value: &T,
) -> Result<(), SearchError> {
    let bytes = bincode::serialize(value).map_err(|err| SearchError::Persist {
        artifact,
        reason: err.to_string(),
    })?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(
    path: &Path,
    artifact: &'static str,
    root: &Path,
) -> Result<T, SearchError> {
    if !path.is_file() {
        return Err(SearchError::IndexNotFound {
            path: root.to_path_buf(),
            artifact,
        });
    }
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    bincode::deserialize(&buf).map_err(|err| SearchError::Corrupt {
        artifact,
        reason: err.to_string(),
    })
}
