//! Display ordering for todo lists and todos.
//!
//! Entries that are not done come first, done entries last. Within each group
//! entries are ordered by their lowercased title; entries whose lowercased
//! titles compare equal keep their original relative order.

use crate::models::{Todo, TodoList};
use std::cmp::Ordering;

pub trait Sortable {
    fn title(&self) -> &str;
    fn is_done(&self) -> bool;
}

impl Sortable for Todo {
    fn title(&self) -> &str {
        &self.title
    }

    fn is_done(&self) -> bool {
        Todo::is_done(self)
    }
}

impl Sortable for TodoList {
    fn title(&self) -> &str {
        &self.title
    }

    fn is_done(&self) -> bool {
        TodoList::is_done(self)
    }
}

pub fn compare_by_title<T: Sortable>(a: &T, b: &T) -> Ordering {
    a.title().to_lowercase().cmp(&b.title().to_lowercase())
}

pub fn sort_by_status_and_title<T: Sortable>(items: &[T]) -> Vec<&T> {
    let (mut undone, mut done): (Vec<&T>, Vec<&T>) =
        items.iter().partition(|item| !item.is_done());

    // `sort_by` is stable, which keeps ties in input order.
    undone.sort_by(|a, b| compare_by_title(*a, *b));
    done.sort_by(|a, b| compare_by_title(*a, *b));

    undone.extend(done);
    undone
}

pub fn sort_todo_lists(lists: &[TodoList]) -> Vec<&TodoList> {
    sort_by_status_and_title(lists)
}

pub fn sort_todos(list: &TodoList) -> Vec<&Todo> {
    sort_by_status_and_title(list.todos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct Entry {
        title: String,
        done: bool,
        position: usize,
    }

    impl Sortable for Entry {
        fn title(&self) -> &str {
            &self.title
        }

        fn is_done(&self) -> bool {
            self.done
        }
    }

    fn entries(items: &[(&str, bool)]) -> Vec<Entry> {
        items
            .iter()
            .enumerate()
            .map(|(position, (title, done))| Entry {
                title: title.to_string(),
                done: *done,
                position,
            })
            .collect()
    }

    fn titles(sorted: &[&Entry]) -> Vec<String> {
        sorted.iter().map(|e| e.title.clone()).collect()
    }

    #[test]
    fn test_done_entries_sort_last() {
        let items = entries(&[("a", true), ("z", false), ("b", true), ("y", false)]);
        let sorted = sort_by_status_and_title(&items);
        assert_eq!(titles(&sorted), vec!["y", "z", "a", "b"]);
    }

    #[test]
    fn test_title_comparison_ignores_case() {
        let items = entries(&[("banana", false), ("Apple", false), ("cherry", false)]);
        let sorted = sort_by_status_and_title(&items);
        assert_eq!(titles(&sorted), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn test_title_comparison_keeps_other_characters() {
        // Code-point order puts punctuation and digits before letters.
        let items = entries(&[("b", false), ("_a", false), ("1c", false), ("B-", false)]);
        let sorted = sort_by_status_and_title(&items);
        assert_eq!(titles(&sorted), vec!["1c", "_a", "b", "B-"]);
    }

    #[test]
    fn test_case_folded_ties_keep_input_order() {
        let items = entries(&[("work", false), ("Work", false), ("WORK", false)]);
        let sorted = sort_by_status_and_title(&items);
        assert_eq!(titles(&sorted), vec!["work", "Work", "WORK"]);
    }

    #[test]
    fn test_sort_todos_already_ordered() {
        let mut list = TodoList::new(1, "Work").unwrap();
        let milk = list.new_todo("Buy milk").unwrap();
        list.add(milk);
        let mut bank = list.new_todo("Call bank").unwrap();
        bank.mark_done();
        list.add(bank);

        let sorted: Vec<&str> = sort_todos(&list).iter().map(|t| t.title.as_str()).collect();
        assert_eq!(sorted, vec!["Buy milk", "Call bank"]);
    }

    #[test]
    fn test_sort_todo_lists_puts_done_lists_last() {
        let mut home = TodoList::new(1, "Home").unwrap();
        let mut todo = home.new_todo("Feed the cats").unwrap();
        todo.mark_done();
        home.add(todo);
        let empty = TodoList::new(2, "Zebra").unwrap();
        let work = TodoList::new(3, "work").unwrap();

        let lists = vec![home, empty, work];
        let sorted: Vec<&str> = sort_todo_lists(&lists)
            .iter()
            .map(|l| l.title.as_str())
            .collect();
        // The empty list is not done, so it sorts with the open lists.
        assert_eq!(sorted, vec!["work", "Zebra", "Home"]);
    }

    fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
        prop::collection::vec(("[a-cA-C]{0,3}", any::<bool>()), 0..30).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(position, (title, done))| Entry {
                    title,
                    done,
                    position,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_done_entries_follow_undone_entries(items in arb_entries()) {
            let sorted = sort_by_status_and_title(&items);
            prop_assert_eq!(sorted.len(), items.len());
            if let Some(first_done) = sorted.iter().position(|e| e.done) {
                prop_assert!(sorted[first_done..].iter().all(|e| e.done));
            }
        }

        #[test]
        fn prop_sort_is_stable_within_case_folded_ties(items in arb_entries()) {
            let sorted = sort_by_status_and_title(&items);
            for pair in sorted.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                if a.done == b.done {
                    let order = a.title.to_lowercase().cmp(&b.title.to_lowercase());
                    prop_assert_ne!(order, Ordering::Greater);
                    if order == Ordering::Equal {
                        prop_assert!(a.position < b.position);
                    }
                }
            }
        }
    }
}
