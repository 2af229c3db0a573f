//! Chat history kept for the notes assistant.

use crate::api::ChatTurn;

/// Turns sent with each message.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn pop(&mut self) -> Option<ChatTurn> {
        self.turns.pop()
    }

    pub fn replace(&mut self, turns: Vec<ChatTurn>) {
        self.turns = turns;
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The most recent turns, oldest first.
    pub fn window(&self) -> Vec<ChatTurn> {
        let start = self.turns.len().saturating_sub(HISTORY_WINDOW);
        self.turns[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_keeps_last_ten_turns() {
        let mut history = ChatHistory::default();
        for i in 0..13 {
            history.push(ChatTurn::user(format!("m{}", i)));
        }
        let window = history.window();
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].parts, vec!["m3".to_string()]);
        assert_eq!(window[9].parts, vec!["m12".to_string()]);
    }

    #[test]
    fn test_short_history_sent_whole() {
        let mut history = ChatHistory::default();
        history.push(ChatTurn::user("hi"));
        history.push(ChatTurn::model("hello"));
        assert_eq!(history.window().len(), 2);
        assert_eq!(history.pop().map(|t| t.role), Some("model".to_string()));
    }
}
