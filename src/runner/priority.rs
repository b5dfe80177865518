//! Priority ordering for candidate cards.

use crate::board::Card;

/// Sort cards by priority label: `P0` before `P1` before `P2`. Cards with no
/// priority-shaped label rank with `P2`. The sort is stable, so board order
/// is preserved within a rank.
pub fn sort_by_priority(cards: &mut [Card]) {
    cards.sort_by_key(card_priority);
}

/// Rank of a card: the best (lowest) rank among its labels.
pub fn card_priority(card: &Card) -> u8 {
    card.labels
        .iter()
        .filter_map(|label| label_rank(&label.name))
        .min()
        .unwrap_or(2)
}

fn label_rank(name: &str) -> Option<u8> {
    let upper = name.to_uppercase();
    if upper.starts_with("P0") {
        Some(0)
    } else if upper.starts_with("P1") {
        Some(1)
    } else if upper.starts_with("P2") {
        Some(2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Label;

    fn card(id: &str, labels: &[&str]) -> Card {
        Card {
            id: id.to_string(),
            name: id.to_string(),
            desc: String::new(),
            column_id: String::new(),
            short_url: String::new(),
            labels: labels
                .iter()
                .map(|name| Label {
                    id: String::new(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn unlabeled_cards_rank_lowest() {
        assert_eq!(card_priority(&card("a", &[])), 2);
        assert_eq!(card_priority(&card("b", &["enhancement"])), 2);
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        assert_eq!(card_priority(&card("a", &["p0-launch"])), 0);
        assert_eq!(card_priority(&card("b", &["P1 high"])), 1);
    }

    #[test]
    fn best_label_wins_when_mixed() {
        assert_eq!(card_priority(&card("a", &["P2-later", "P0-crit"])), 0);
    }

    #[test]
    fn sort_orders_p0_first_and_is_stable() {
        let mut cards = vec![
            card("c1", &[]),
            card("c2", &["P0-crit"]),
            card("c3", &["P1-high"]),
            card("c4", &["p0-X"]),
        ];
        sort_by_priority(&mut cards);
        let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c2", "c4", "c3", "c1"]);
    }

    #[test]
    fn equal_priorities_keep_board_order() {
        let mut cards = vec![card("x", &["bug"]), card("y", &[]), card("z", &["docs"])];
        sort_by_priority(&mut cards);
        let ids: Vec<_> = cards.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["x", "y", "z"]);
    }
}
