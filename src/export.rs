use crate::dictionary::DictionaryRow;
use crate::rating::{Rating, Ratings};
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

pub const EXPORT_FILENAME: &str = "word_ratings.pdf";
pub const UNRATED_LABEL: &str = "N/A";

const MM_TO_PT: f32 = 72.0 / 25.4;
const A4_WIDTH_PT: f32 = 595.28;
const A4_HEIGHT_PT: f32 = 841.89;
const FONT_NAME: Name<'static> = Name(b"F1");

/// The finished download: text layout plus the PDF bytes that carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: &'static str,
    pub text: String,
    pub pdf: Vec<u8>,
}

/// One `word: rating` line, `N/A` when unrated.
pub fn format_line(word: &str, rating: Option<Rating>) -> String {
    match rating {
        Some(rating) => format!("{word}: {rating}"),
        None => format!("{word}: {UNRATED_LABEL}"),
    }
}

/// Lines for every displayed word in display order, newline separated.
pub fn render_text(displayed: &[DictionaryRow], ratings: &Ratings) -> String {
    displayed
        .iter()
        .map(|row| format_line(row.word(), ratings.get(row.word())))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Places text on a single A4 page. Lines past the bottom edge are not
/// paginated; viewers clip them.
#[derive(Debug, Clone, Copy)]
pub struct PdfLayout {
    pub origin_x_mm: f32,
    pub origin_y_mm: f32,
    pub font_size_pt: f32,
    pub line_height_factor: f32,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            origin_x_mm: 10.0,
            origin_y_mm: 10.0,
            font_size_pt: 16.0,
            line_height_factor: 1.15,
        }
    }
}

impl PdfLayout {
    pub fn render(&self, text: &str) -> Vec<u8> {
        let catalog_id = Ref::new(1);
        let tree_id = Ref::new(2);
        let page_id = Ref::new(3);
        let font_id = Ref::new(4);
        let content_id = Ref::new(5);

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id).kids([page_id]).count(1);

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT));
        page.parent(tree_id);
        page.contents(content_id);
        page.resources().fonts().pair(FONT_NAME, font_id);
        page.finish();

        pdf.type1_font(font_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));
        pdf.stream(content_id, &self.content_stream(text));
        pdf.finish()
    }

    /// First baseline in PDF user space; PDF's origin is bottom-left.
    pub fn origin_pt(&self) -> (f32, f32) {
        (
            self.origin_x_mm * MM_TO_PT,
            A4_HEIGHT_PT - self.origin_y_mm * MM_TO_PT,
        )
    }

    fn content_stream(&self, text: &str) -> Vec<u8> {
        let (x, y) = self.origin_pt();
        let mut content = Content::new();
        content.begin_text();
        content.set_font(FONT_NAME, self.font_size_pt);
        content.set_leading(self.font_size_pt * self.line_height_factor);
        content.next_line(x, y);
        for (idx, line) in text.split('\n').enumerate() {
            if idx > 0 {
                content.next_line_using_leading();
            }
            content.show(Str(&encode_win_ansi(line)));
        }
        content.end_text();
        content.finish()
    }
}

/// Encodes a line for a WinAnsiEncoding font. Characters the encoding lacks
/// (C1 controls included) become `?`.
pub fn encode_win_ansi(line: &str) -> Vec<u8> {
    line.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(ch: char) -> u8 {
    match ch {
        '\t' | '\r' => b' ',
        ' '..='~' => ch as u8,
        '\u{A0}'..='\u{FF}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

pub fn render_pdf(text: &str) -> Vec<u8> {
    PdfLayout::default().render(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn one_line_per_word_in_order() {
        let displayed = vec![
            DictionaryRow::new("cat", "K AE T"),
            DictionaryRow::new("dog", "D AO G"),
            DictionaryRow::new("emu", "IY M Y UW"),
        ];
        let mut ratings = Ratings::default();
        ratings.set("cat", Rating::Four);
        ratings.set("emu", Rating::One);
        assert_eq!(
            render_text(&displayed, &ratings),
            "cat: 4\ndog: N/A\nemu: 1"
        );
    }

    #[test]
    fn empty_worksheet_renders_empty_text() {
        assert_eq!(render_text(&[], &Ratings::default()), "");
    }

    #[test]
    fn pdf_has_header_trailer_and_lines() {
        let pdf = render_pdf("cat: 4\ndog: N/A");
        let text = pdf_text(&pdf);
        assert!(text.starts_with("%PDF-"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(cat: 4) Tj"));
        assert!(text.contains("T*"));
        assert!(text.contains("(dog: N/A) Tj"));
        assert!(text.contains("/BaseFont /Helvetica"));
        assert!(text.contains("/Encoding /WinAnsiEncoding"));
        assert!(text.contains("/F1 16 Tf"));
    }

    #[test]
    fn origin_sits_ten_millimetres_from_top_left() {
        let (x, y) = PdfLayout::default().origin_pt();
        assert!((x - 28.3465).abs() < 0.01);
        assert!((y - 813.5435).abs() < 0.01);
    }

    #[test]
    fn typographic_quotes_use_win_ansi_codes() {
        assert_eq!(encode_win_ansi("quote’s"), b"quote\x92s".to_vec());
        assert_eq!(
            encode_win_ansi("“hi” … €"),
            vec![0x93, b'h', b'i', 0x94, b' ', 0x85, b' ', 0x80]
        );
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn c1_controls_and_unmapped_chars_become_question_marks() {
        assert_eq!(encode_win_ansi("ctl\u{85}x"), b"ctl?x".to_vec());
        assert_eq!(encode_win_ansi("\u{80}\u{9F}\u{1}"), b"???".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
        assert_eq!(encode_win_ansi("a\tb"), b"a b".to_vec());
    }
}
