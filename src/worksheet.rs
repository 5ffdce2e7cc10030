use crate::dictionary::{Dictionary, DictionaryRow};
use crate::export::{EXPORT_FILENAME, Export, render_pdf, render_text};
use crate::rating::{Rating, Ratings};
use crate::selection::{SelectedSymbol, SelectionMode, WordCount, select_words};
use rand::Rng;
use serde::Serialize;

/// All mutable state of one worksheet session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Worksheet {
    displayed: Vec<DictionaryRow>,
    ratings: Ratings,
    selected_symbol: SelectedSymbol,
    word_count: WordCount,
}

impl Worksheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> &[DictionaryRow] {
        &self.displayed
    }

    pub fn ratings(&self) -> &Ratings {
        &self.ratings
    }

    pub fn selected_symbol(&self) -> &SelectedSymbol {
        &self.selected_symbol
    }

    pub fn word_count(&self) -> WordCount {
        self.word_count
    }

    pub fn set_selected_symbol(&mut self, symbol: SelectedSymbol) {
        self.selected_symbol = symbol;
    }

    pub fn set_word_count(&mut self, count: WordCount) {
        self.word_count = count;
    }

    /// Draws a selection with the current filter and count. Returns how many
    /// rows were added.
    pub fn add_words<R: Rng + ?Sized>(
        &mut self,
        dictionary: &Dictionary,
        mode: SelectionMode,
        rng: &mut R,
    ) -> usize {
        let picked = select_words(
            dictionary.words(),
            &self.selected_symbol,
            self.word_count,
            rng,
        );
        let added = picked.len();
        match mode {
            SelectionMode::Append => self.displayed.extend(picked),
            SelectionMode::Replace => self.displayed = picked,
        }
        added
    }

    /// Appends a specific row, bypassing selection.
    pub fn push_row(&mut self, row: DictionaryRow) {
        self.displayed.push(row);
    }

    /// `None` clears the entry, matching the "Rate" placeholder.
    pub fn set_rating(&mut self, word: &str, rating: Option<Rating>) {
        match rating {
            Some(rating) => self.ratings.set(word, rating),
            None => {
                self.ratings.remove(word);
            }
        }
    }

    pub fn rating(&self, word: &str) -> Option<Rating> {
        self.ratings.get(word)
    }

    /// Removes every displayed row with this key and its rating.
    pub fn delete_word(&mut self, word: &str) -> bool {
        let before = self.displayed.len();
        self.displayed.retain(|row| row.word() != word);
        self.ratings.remove(word);
        before != self.displayed.len()
    }

    pub fn delete_all(&mut self) {
        self.displayed.clear();
        self.ratings.clear();
    }

    /// Text preview of what [`Worksheet::export`] would write.
    pub fn export_text(&self) -> String {
        render_text(&self.displayed, &self.ratings)
    }

    /// Renders the download and resets the worksheet.
    pub fn export(&mut self) -> Export {
        let text = self.export_text();
        let pdf = render_pdf(&text);
        self.delete_all();
        Export {
            filename: EXPORT_FILENAME,
            text,
            pdf,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn dictionary() -> Dictionary {
        Dictionary::from_csv_str(
            "cat,K AE T\ndog,D AO G\ncat2,K AE T\n",
            "K\nAE\nD\n",
        )
        .unwrap()
    }

    fn words(sheet: &Worksheet) -> Vec<&str> {
        sheet.displayed().iter().map(DictionaryRow::word).collect()
    }

    #[test]
    fn append_keeps_prior_rows_even_when_repeated() {
        let dict = dictionary();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut sheet = Worksheet::new();
        sheet.set_word_count(WordCount::clamped(10));
        assert_eq!(sheet.add_words(&dict, SelectionMode::Append, &mut rng), 3);
        let first: Vec<String> = words(&sheet).iter().map(|w| w.to_string()).collect();
        assert_eq!(sheet.add_words(&dict, SelectionMode::Append, &mut rng), 3);
        assert_eq!(sheet.displayed().len(), 6);
        let prefix: Vec<String> = words(&sheet)[..3].iter().map(|w| w.to_string()).collect();
        assert_eq!(prefix, first);
    }

    #[test]
    fn replace_discards_prior_rows() {
        let dict = dictionary();
        let mut rng = SmallRng::seed_from_u64(9);
        let mut sheet = Worksheet::new();
        sheet.add_words(&dict, SelectionMode::Append, &mut rng);
        sheet.set_selected_symbol(SelectedSymbol::new("D"));
        sheet.add_words(&dict, SelectionMode::Replace, &mut rng);
        assert_eq!(words(&sheet), vec!["dog"]);
    }

    #[test]
    fn rating_deleted_word_reads_unrated() {
        let mut sheet = Worksheet::new();
        sheet.push_row(DictionaryRow::new("cat", "K AE T"));
        sheet.set_rating("cat", Some(Rating::Four));
        assert!(sheet.delete_word("cat"));
        assert_eq!(sheet.rating("cat"), None);
        assert!(sheet.is_empty());
    }

    #[test]
    fn deleting_absent_word_is_noop() {
        let mut sheet = Worksheet::new();
        sheet.push_row(DictionaryRow::new("cat", "K AE T"));
        sheet.set_rating("cat", Some(Rating::Four));
        let before = sheet.clone();
        assert!(!sheet.delete_word("dog"));
        assert_eq!(sheet, before);
    }

    #[test]
    fn placeholder_rating_clears_entry() {
        let mut sheet = Worksheet::new();
        sheet.set_rating("cat", Some(Rating::Two));
        sheet.set_rating("cat", None);
        assert!(sheet.ratings().is_empty());
    }

    #[test]
    fn delete_all_resets_rows_and_ratings_only() {
        let dict = dictionary();
        let mut rng = SmallRng::seed_from_u64(2);
        let mut sheet = Worksheet::new();
        sheet.set_selected_symbol(SelectedSymbol::new("K"));
        sheet.set_word_count(WordCount::clamped(4));
        sheet.add_words(&dict, SelectionMode::Append, &mut rng);
        sheet.set_rating("cat", Some(Rating::One));
        sheet.delete_all();
        assert!(sheet.displayed().is_empty());
        assert!(sheet.ratings().is_empty());
        assert_eq!(sheet.selected_symbol().as_str(), "K");
        assert_eq!(sheet.word_count().get(), 4);
    }

    #[test]
    fn export_renders_then_clears() {
        let mut sheet = Worksheet::new();
        sheet.push_row(DictionaryRow::new("cat", "K AE T"));
        sheet.set_rating("cat", Some(Rating::Four));
        sheet.delete_word("dog");
        let export = sheet.export();
        assert_eq!(export.text, "cat: 4");
        assert_eq!(export.filename, "word_ratings.pdf");
        assert!(export.pdf.starts_with(b"%PDF-"));
        assert!(sheet.displayed().is_empty());
        assert!(sheet.ratings().is_empty());
    }
}
