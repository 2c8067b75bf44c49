use leafview_core::TextItem;

/// One character with its box in page units, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Groups glyphs into whitespace-separated words.
pub fn group_glyphs(glyphs: impl IntoIterator<Item = Glyph>) -> Vec<TextItem> {
    let mut items = Vec::new();
    let mut word: Option<WordBox> = None;

    for glyph in glyphs {
        if glyph.ch.is_whitespace() {
            if let Some(done) = word.take() {
                items.push(done.finish());
            }
            continue;
        }
        match word.as_mut() {
            Some(current) => current.push(glyph),
            None => word = Some(WordBox::start(glyph)),
        }
    }
    if let Some(done) = word {
        items.push(done.finish());
    }
    items
}

struct WordBox {
    text: String,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl WordBox {
    fn start(glyph: Glyph) -> Self {
        Self {
            text: glyph.ch.to_string(),
            left: glyph.x,
            top: glyph.y,
            right: glyph.x + glyph.width,
            bottom: glyph.y + glyph.height,
        }
    }

    fn push(&mut self, glyph: Glyph) {
        self.text.push(glyph.ch);
        self.left = self.left.min(glyph.x);
        self.top = self.top.min(glyph.y);
        self.right = self.right.max(glyph.x + glyph.width);
        self.bottom = self.bottom.max(glyph.y + glyph.height);
    }

    fn finish(self) -> TextItem {
        TextItem {
            text: self.text,
            x: self.left,
            y: self.top,
            width: self.right - self.left,
            height: self.bottom - self.top,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(text: &str, y: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| Glyph {
                ch,
                x: i as f32 * 5.0,
                y,
                width: 5.0,
                height: 10.0,
            })
            .collect()
    }

    #[test]
    fn words_split_on_whitespace() {
        let items = group_glyphs(glyphs("ab cd", 20.0));

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "ab");
        assert_eq!((items[0].x, items[0].width), (0.0, 10.0));
        assert_eq!(items[1].text, "cd");
        assert_eq!((items[1].x, items[1].y, items[1].height), (15.0, 20.0, 10.0));
    }

    #[test]
    fn word_box_covers_uneven_glyphs() {
        let mut input = glyphs("xy", 20.0);
        input[1].y = 18.0;
        input[1].height = 14.0;

        let items = group_glyphs(input);

        assert_eq!(items.len(), 1);
        assert_eq!((items[0].y, items[0].height), (18.0, 14.0));
    }

    #[test]
    fn blank_runs_yield_nothing() {
        assert!(group_glyphs(glyphs(" \n ", 0.0)).is_empty());
    }
}
