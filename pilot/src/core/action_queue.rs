//! FIFO of pre-computed button presses shared across steps.

use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::types::Button;

/// Ordered buffer of buttons drained before any new decision is made.
///
/// Only the fixed button alphabet can be stored; tokens outside it are
/// dropped at [`ActionQueue::enqueue`]. Every stored token carries a sequence
/// number so a batch can later be withdrawn with [`ActionQueue::discard`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionQueue {
    items: VecDeque<(u64, Button)>,
    next_seq: u64,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every token that names a valid button; returns how many were kept.
    pub fn enqueue<I, S>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let buttons: Vec<Button> = tokens
            .into_iter()
            .filter_map(|token| token.as_ref().parse::<Button>().ok())
            .collect();
        self.enqueue_buttons(&buttons);
        buttons.len()
    }

    /// Appends `buttons`; returns the sequence numbers they were given.
    pub fn enqueue_buttons(&mut self, buttons: &[Button]) -> Range<u64> {
        let start = self.next_seq;
        for button in buttons {
            self.items.push_back((self.next_seq, *button));
            self.next_seq += 1;
        }
        start..self.next_seq
    }

    pub fn pop(&mut self) -> Option<Button> {
        self.items.pop_front().map(|(_, button)| button)
    }

    pub fn peek(&self) -> Option<Button> {
        self.items.front().map(|(_, button)| *button)
    }

    /// Discards the head.
    pub fn skip(&mut self) -> Option<Button> {
        self.pop()
    }

    /// Removes the still-queued tokens of a batch returned by
    /// [`ActionQueue::enqueue_buttons`]; returns how many were removed.
    pub fn discard(&mut self, batch: &Range<u64>) -> usize {
        let before = self.items.len();
        self.items.retain(|(seq, _)| !batch.contains(seq));
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Button> + '_ {
        self.items.iter().map(|(_, button)| *button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies pops return tokens in enqueue order with invalid tokens filtered out.
    #[test]
    fn fifo_order_with_filtering() {
        let mut queue = ActionQueue::new();
        let kept = queue.enqueue(["UP", "jump", "a", "START"]);
        assert_eq!(kept, 3);
        queue.enqueue(["", "select", "WAIT", "left"]);

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(
            drained,
            vec![
                Button::Up,
                Button::A,
                Button::Start,
                Button::Select,
                Button::Left
            ]
        );
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn peek_does_not_mutate_and_skip_discards() {
        let mut queue = ActionQueue::new();
        queue.enqueue_buttons(&[Button::Down, Button::B]);
        assert_eq!(queue.peek(), Some(Button::Down));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.skip(), Some(Button::Down));
        assert_eq!(queue.peek(), Some(Button::B));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.skip(), None);
    }

    #[test]
    fn discard_withdraws_only_the_given_batch() {
        let mut queue = ActionQueue::new();
        queue.enqueue_buttons(&[Button::Up]);
        let batch = queue.enqueue_buttons(&[Button::A, Button::A, Button::A]);
        queue.enqueue_buttons(&[Button::Left]);
        assert_eq!(queue.pop(), Some(Button::Up));
        assert_eq!(queue.pop(), Some(Button::A));

        assert_eq!(queue.discard(&batch), 2);
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![Button::Left]);
        assert_eq!(queue.discard(&batch), 0);
    }
}
