pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod host;
pub mod item;
pub mod layout;
pub mod navigation;
pub mod renderer;
pub mod scale;
pub mod state;
pub mod tracker;
pub mod viewer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ViewerConfig;
pub use controller::{LoadOutcome, PaginationController};
pub use engine::{
    DocumentEngine, DocumentHandle, PageHandle, PageViewport, RasterSurface, TextContent, TextItem,
};
pub use error::ViewerError;
pub use host::{
    InfiniteLoadTrigger, LoadAck, LoadTicket, PageBounds, PageHost, ScrollEvent, ScrollHost,
    SlotId,
};
pub use item::{BackTarget, FileItemStore, ItemStore, MemoryItemStore, ViewerItem, ViewerSession};
pub use layout::StackedLayout;
pub use navigation::{NavigationAnimator, NavigationOutcome};
pub use renderer::{PageCanvas, PageRenderer, TextLayer, TextSpan};
pub use scale::{BusyPolicy, ScaleManager, ScaleOutcome};
pub use state::{Generation, PagePosition, PageState, ViewerStatus};
pub use tracker::ViewportTracker;
pub use viewer::{DocumentViewer, PdfViewer, ScrollSubscription};
