mod frame;
mod input;
mod kitty;
mod scroll;

pub use frame::{compose, visible_slices, Slice};
pub use input::{EventMapper, UiEvent, ViewerCommand};
pub use kitty::{write_status_line, DrawParams, KittyRenderer};
pub use scroll::TerminalScrollHost;
