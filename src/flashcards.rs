//! Flashcard deck navigation.

use crate::api::Flashcard;

pub const DEFAULT_FLASHCARD_COUNT: u32 = 10;

/// A deck with a cursor. Moving the cursor always shows the question side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashcardDeck {
    cards: Vec<Flashcard>,
    current: usize,
    flipped: bool,
}

impl FlashcardDeck {
    pub fn new(cards: Vec<Flashcard>) -> Self {
        Self { cards, current: 0, flipped: false }
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn current(&self) -> Option<&Flashcard> {
        self.cards.get(self.current)
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Text on the visible side of the current card.
    pub fn visible_text(&self) -> Option<&str> {
        self.current()
            .map(|card| if self.flipped { card.answer.as_str() } else { card.question.as_str() })
    }

    /// Returns false when already on the last card.
    pub fn next(&mut self) -> bool {
        if self.current + 1 >= self.cards.len() {
            return false;
        }
        self.current += 1;
        self.flipped = false;
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        self.flipped = false;
        true
    }

    pub fn flip(&mut self) {
        if !self.cards.is_empty() {
            self.flipped = !self.flipped;
        }
    }

    pub fn has_next(&self) -> bool {
        self.current + 1 < self.cards.len()
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    /// "Card i of n", or "Card 0 of 0" for an empty deck.
    pub fn counter(&self) -> String {
        let position = if self.cards.is_empty() { 0 } else { self.current + 1 };
        format!("Card {} of {}", position, self.cards.len())
    }
}
