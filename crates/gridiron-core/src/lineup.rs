// Starting lineup selection over a fixed slot template.

use crate::player::{Player, PlayerId, Position};

/// A starting slot: either a concrete position or FLEX (RB/WR/TE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Fixed(Position),
    Flex,
}

/// QB, 2 RB, 2 WR, TE, FLEX, K, DST.
pub const STARTING_SLOTS: [Slot; 9] = [
    Slot::Fixed(Position::Quarterback),
    Slot::Fixed(Position::RunningBack),
    Slot::Fixed(Position::RunningBack),
    Slot::Fixed(Position::WideReceiver),
    Slot::Fixed(Position::WideReceiver),
    Slot::Fixed(Position::TightEnd),
    Slot::Flex,
    Slot::Fixed(Position::Kicker),
    Slot::Fixed(Position::Defense),
];

/// Pick starters from `roster`, ranking by `value` (higher is better).
///
/// Fixed slots are filled first, in template order, then FLEX takes the best
/// remaining RB/WR/TE and is appended last. Slots with no eligible player stay empty. Ties fall back to
/// roster order so the result is deterministic.
pub fn select_lineup<F>(roster: &[Player], mut value: F) -> Vec<PlayerId>
where
    F: FnMut(&Player) -> f64,
{
    let mut ranked: Vec<(usize, f64)> = roster
        .iter()
        .enumerate()
        .map(|(i, p)| (i, value(p)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut used = vec![false; roster.len()];
    let mut starters = Vec::with_capacity(STARTING_SLOTS.len());

    let fixed = STARTING_SLOTS.iter().filter_map(|s| match s {
        Slot::Fixed(p) => Some(*p),
        Slot::Flex => None,
    });
    for pos in fixed {
        if let Some(&(i, _)) = ranked
            .iter()
            .find(|(i, _)| !used[*i] && roster[*i].position == pos)
        {
            used[i] = true;
            starters.push(roster[i].id);
        }
    }

    let flex_slots = STARTING_SLOTS.iter().filter(|s| **s == Slot::Flex).count();
    for _ in 0..flex_slots {
        if let Some(&(i, _)) = ranked
            .iter()
            .find(|(i, _)| !used[*i] && roster[*i].position.is_flex_eligible())
        {
            used[i] = true;
            starters.push(roster[i].id);
        }
    }

    starters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: PlayerId, position: Position, points: f64) -> Player {
        Player {
            id,
            name: format!("P{id}"),
            position,
            team: String::new(),
            bye_week: None,
            average_draft_position: None,
            player_rating: None,
            fantasy_points: Some(points),
            projected_points: Vec::new(),
            actual_points: Vec::new(),
            opponents: Vec::new(),
        }
    }

    fn full_roster() -> Vec<Player> {
        vec![
            player(1, Position::Quarterback, 20.0),
            player(2, Position::Quarterback, 25.0),
            player(3, Position::RunningBack, 15.0),
            player(4, Position::RunningBack, 12.0),
            player(5, Position::RunningBack, 11.0),
            player(6, Position::WideReceiver, 14.0),
            player(7, Position::WideReceiver, 13.0),
            player(8, Position::WideReceiver, 9.0),
            player(9, Position::TightEnd, 8.0),
            player(10, Position::TightEnd, 10.0),
            player(11, Position::Kicker, 7.0),
            player(12, Position::Defense, 6.0),
        ]
    }

    #[test]
    fn fills_every_slot_with_the_best_players() {
        let roster = full_roster();
        let lineup = select_lineup(&roster, |p| p.season_projection());
        assert_eq!(lineup.len(), 9);
        assert_eq!(lineup[0], 2);
        assert_eq!(&lineup[1..3], &[3, 4]);
        assert_eq!(&lineup[3..5], &[6, 7]);
        assert_eq!(lineup[5], 10);
        assert_eq!(&lineup[6..8], &[11, 12]);
        // FLEX is filled last.
        assert_eq!(lineup[8], 5);
    }

    #[test]
    fn flex_prefers_best_remaining_skill_player() {
        let mut roster = full_roster();
        roster.push(player(13, Position::TightEnd, 12.5));
        roster.push(player(14, Position::TightEnd, 11.8));
        let lineup = select_lineup(&roster, |p| p.season_projection());
        assert_eq!(lineup[5], 13);
        // Second-best TE outscores the third RB for FLEX.
        assert_eq!(lineup[8], 14);
    }

    #[test]
    fn missing_positions_leave_slots_empty() {
        let roster = vec![
            player(1, Position::Quarterback, 20.0),
            player(2, Position::Kicker, 5.0),
        ];
        let lineup = select_lineup(&roster, |p| p.season_projection());
        assert_eq!(lineup, vec![1, 2]);
    }

    #[test]
    fn no_player_starts_twice() {
        let roster = full_roster();
        let mut lineup = select_lineup(&roster, |_| 1.0);
        let len = lineup.len();
        lineup.sort_unstable();
        lineup.dedup();
        assert_eq!(lineup.len(), len);
    }
}
