use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerCommand {
    NextPage,
    PrevPage,
    /// 1-based; `usize::MAX` means the last page.
    GotoPage { page: usize },
    ScrollBy { delta: f32 },
    ZoomIn,
    ZoomOut,
    Retry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Command(ViewerCommand),
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

/// Longest numeric prefix kept; further digits are ignored.
const MAX_PREFIX_DIGITS: usize = 9;

/// Maps terminal events to viewer commands, keeping a numeric prefix between
/// key presses (`12g` jumps to page 12, `3j` scrolls three steps).
#[derive(Debug, Default)]
pub struct EventMapper {
    prefix: String,
}

impl EventMapper {
    pub const SCROLL_STEP: f32 = 40.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Digits typed so far, for the status line.
    pub fn pending_input(&self) -> Option<&str> {
        (!self.prefix.is_empty()).then_some(self.prefix.as_str())
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) if kind != KeyEventKind::Release => self.map_key(code, modifiers),
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            _ => UiEvent::None,
        }
    }

    fn map_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        if let KeyCode::Char(digit @ '0'..='9') = code {
            if modifiers == KeyModifiers::NONE {
                if self.prefix.len() < MAX_PREFIX_DIGITS {
                    self.prefix.push(digit);
                }
                return UiEvent::None;
            }
        }

        let count = self.take_prefix();
        let command = match (code, modifiers) {
            (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => return UiEvent::Quit,
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return UiEvent::Quit,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                ViewerCommand::ScrollBy {
                    delta: Self::SCROLL_STEP * count.unwrap_or(1) as f32,
                }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                ViewerCommand::ScrollBy {
                    delta: -Self::SCROLL_STEP * count.unwrap_or(1) as f32,
                }
            }
            (KeyCode::Char('n'), KeyModifiers::NONE)
            | (KeyCode::Char(' '), _)
            | (KeyCode::PageDown, _) => ViewerCommand::NextPage,
            (KeyCode::Char('p'), KeyModifiers::NONE)
            | (KeyCode::Char('N'), _)
            | (KeyCode::PageUp, _) => ViewerCommand::PrevPage,
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                ViewerCommand::GotoPage {
                    page: count.unwrap_or(1),
                }
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => ViewerCommand::GotoPage {
                page: count.unwrap_or(usize::MAX),
            },
            (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => ViewerCommand::ZoomIn,
            (KeyCode::Char('-'), _) => ViewerCommand::ZoomOut,
            (KeyCode::Char('r'), KeyModifiers::NONE) => ViewerCommand::Retry,
            _ => return UiEvent::None,
        };
        UiEvent::Command(command)
    }

    /// Consumes the prefix; `0` and an empty prefix count as absent.
    fn take_prefix(&mut self) -> Option<usize> {
        let prefix = std::mem::take(&mut self.prefix);
        prefix.parse().ok().filter(|&count: &usize| count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn numeric_prefix_selects_goto_target() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('1'))), UiEvent::None);
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('2'))), UiEvent::None);
        assert_eq!(mapper.pending_input(), Some("12"));

        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(ViewerCommand::GotoPage { page: 12 })
        );
        assert!(mapper.pending_input().is_none());
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(ViewerCommand::GotoPage { page: 1 })
        );
    }

    #[test]
    fn shift_g_defaults_to_last_page() {
        let mut mapper = EventMapper::new();
        assert_eq!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('G'),
                KeyModifiers::SHIFT
            )),
            UiEvent::Command(ViewerCommand::GotoPage { page: usize::MAX })
        );
    }

    #[test]
    fn numeric_prefix_scales_scroll_distance() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('3')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('k'))),
            UiEvent::Command(ViewerCommand::ScrollBy {
                delta: -3.0 * EventMapper::SCROLL_STEP
            })
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Down)),
            UiEvent::Command(ViewerCommand::ScrollBy {
                delta: EventMapper::SCROLL_STEP
            })
        );
    }

    #[test]
    fn page_and_zoom_keys() {
        let mut mapper = EventMapper::new();
        assert_eq!(
            mapper.map_event(key_event(KeyCode::PageDown)),
            UiEvent::Command(ViewerCommand::NextPage)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('p'))),
            UiEvent::Command(ViewerCommand::PrevPage)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('+'))),
            UiEvent::Command(ViewerCommand::ZoomIn)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('-'))),
            UiEvent::Command(ViewerCommand::ZoomOut)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('r'))),
            UiEvent::Command(ViewerCommand::Retry)
        );
    }

    #[test]
    fn prefix_is_dropped_by_unrelated_keys() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('x'))), UiEvent::None);
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(ViewerCommand::GotoPage { page: 1 })
        );
    }

    #[test]
    fn quit_and_resize() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('q'))), UiEvent::Quit);
        assert_eq!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL
            )),
            UiEvent::Quit
        );
        assert_eq!(
            mapper.map_event(Event::Resize(80, 24)),
            UiEvent::Resize {
                columns: 80,
                rows: 24
            }
        );
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut mapper = EventMapper::new();
        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('n'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(mapper.map_event(release), UiEvent::None);
    }

    #[test]
    fn overlong_prefix_is_capped() {
        let mut mapper = EventMapper::new();
        for _ in 0..12 {
            mapper.map_event(key_event(KeyCode::Char('9')));
        }
        assert_eq!(mapper.pending_input(), Some("999999999"));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(ViewerCommand::GotoPage { page: 999_999_999 })
        );
    }

    #[test]
    fn zero_prefix_counts_as_absent() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('0')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::Command(ViewerCommand::ScrollBy {
                delta: EventMapper::SCROLL_STEP
            })
        );
    }
}
