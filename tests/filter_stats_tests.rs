// Properties of the pure derivations over signal snapshots

mod common;

use common::{generate_test_signals, pairs, sample_signal};
use rand::seq::SliceRandom;
use signal_feed::{
    stats, visible, Action, ActionFilter, FilterCriteria, Session, SessionFilter, Stats,
};

fn all_criteria() -> Vec<FilterCriteria> {
    let actions = [ActionFilter::All, ActionFilter::Only(Action::Buy), ActionFilter::Only(Action::Sell)];
    let sessions = [
        SessionFilter::All,
        SessionFilter::Only(Session::Asian),
        SessionFilter::Only(Session::London),
        SessionFilter::Only(Session::NewYork),
    ];
    let terms = ["", "eur", "USD", "/", "xyz"];

    let mut criteria = Vec::new();
    for action in actions {
        for session in sessions {
            for term in terms {
                criteria.push(FilterCriteria::default().search(term).action(action).session(session));
            }
        }
    }
    criteria
}

#[test]
fn test_visible_is_ordered_subset() {
    let signals = generate_test_signals(60);

    for criteria in all_criteria() {
        let shown = visible(&signals, &criteria);

        // Every shown signal appears in the input, at increasing positions
        let mut cursor = 0;
        for signal in &shown {
            let position = signals[cursor..]
                .iter()
                .position(|s| s.id == signal.id)
                .unwrap_or_else(|| panic!("{:?} out of order for {:?}", signal.id, criteria));
            cursor += position + 1;
        }

        let expected = signals.iter().filter(|s| criteria.matches(s)).count();
        assert_eq!(shown.len(), expected);
    }
}

#[test]
fn test_unconstrained_criteria_is_identity() {
    let signals = generate_test_signals(25);
    assert_eq!(visible(&signals, &FilterCriteria::default()), signals);
}

#[test]
fn test_criteria_combine_with_and() {
    let signals = vec![
        sample_signal("EUR/USD", Action::Buy, 90, Session::London, 0),
        sample_signal("EUR/GBP", Action::Sell, 72, Session::London, 1),
        sample_signal("EUR/JPY", Action::Buy, 81, Session::Asian, 2),
        sample_signal("GBP/USD", Action::Buy, 77, Session::London, 3),
    ];

    let criteria = FilterCriteria::default()
        .search("Eur")
        .action(ActionFilter::Only(Action::Buy))
        .session(SessionFilter::Only(Session::London));

    assert_eq!(pairs(&visible(&signals, &criteria)), vec!["EUR/USD"]);
}

#[test]
fn test_stats_of_empty_set() {
    assert_eq!(
        stats(&[]),
        Stats { total: 0, buy_count: 0, sell_count: 0, avg_confidence: 0 }
    );
}

#[test]
fn test_stats_are_order_independent() {
    let mut rng = rand::thread_rng();
    let mut signals = generate_test_signals(40);
    let expected = stats(&signals);

    for _ in 0..10 {
        signals.shuffle(&mut rng);
        assert_eq!(stats(&signals), expected);
    }
    assert_eq!(expected.buy_count + expected.sell_count, expected.total);
}

#[test]
fn test_average_rounds_half_up() {
    let signals = vec![
        sample_signal("EUR/USD", Action::Buy, 80, Session::London, 0),
        sample_signal("GBP/USD", Action::Sell, 81, Session::London, 1),
    ];
    assert_eq!(stats(&signals).avg_confidence, 81);

    let signals = vec![
        sample_signal("EUR/USD", Action::Buy, 80, Session::London, 0),
        sample_signal("GBP/USD", Action::Sell, 80, Session::London, 1),
        sample_signal("USD/JPY", Action::Sell, 81, Session::London, 2),
    ];
    assert_eq!(stats(&signals).avg_confidence, 80);
}

#[test]
fn test_search_scenario_with_full_set_stats() {
    let signals = vec![
        sample_signal("EUR/USD", Action::Buy, 90, Session::London, 1),
        sample_signal("GBP/USD", Action::Sell, 80, Session::Asian, 0),
    ];
    let criteria = FilterCriteria::default().search("eur");

    let shown = visible(&signals, &criteria);
    assert_eq!(shown, vec![signals[0].clone()]);

    assert_eq!(
        stats(&signals),
        Stats { total: 2, buy_count: 1, sell_count: 1, avg_confidence: 85 }
    );
}
