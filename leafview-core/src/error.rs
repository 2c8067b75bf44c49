use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to open document {uri}")]
    DocumentOpen {
        uri: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to load page {page}")]
    PageLoad {
        page: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("page {page} is outside 1..={total}")]
    PageOutOfRange { page: usize, total: usize },
    #[error("no document is open")]
    NoDocument,
    #[error("nothing to view: no item was given and none could be restored")]
    MissingItem,
    #[error("opening {uri} was superseded by another document")]
    Superseded { uri: String },
}
