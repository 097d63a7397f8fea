use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::burnrl::base::{ElemType, EnvError, Environment, Info, Snapshot, Space, State};

/// The card revealed by the last action and its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryGameObservation {
    pub card: usize,
    pub symbol: usize,
}

impl State for MemoryGameObservation {
    fn features(&self) -> Vec<ElemType> {
        vec![self.card as ElemType, self.symbol as ElemType]
    }

    fn size(&self) -> usize {
        2
    }
}

/// Card-matching game with `cards / 2` hidden symbol pairs.
///
/// Action `0` reveals the first card that was never revealed, action `k`
/// reveals card `k - 1`. Revealing the partner of the previously revealed
/// card removes the pair for `+2`, anything else costs `-1`.
#[derive(Debug)]
pub struct MemoryGame {
    cards: usize,
    symbols: Vec<usize>,
    removed: Vec<bool>,
    used: Vec<bool>,
    unused_card: usize,
    last_card: usize,
    step_count: usize,
    max_steps: usize,
    rng: StdRng,
}

impl MemoryGame {
    pub fn new(cards: usize) -> Self {
        assert!(
            cards >= 2 && cards % 2 == 0,
            "the memory game needs a positive even number of cards, got {cards}"
        );

        Self {
            cards,
            symbols: (0..cards).map(|card| card / 2).collect(),
            removed: vec![false; cards],
            used: vec![false; cards],
            unused_card: 0,
            last_card: 0,
            step_count: 0,
            max_steps: 2 * cards,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn cards(&self) -> usize {
        self.cards
    }

    fn observation(&self) -> MemoryGameObservation {
        MemoryGameObservation {
            card: self.last_card,
            symbol: self.symbols[self.last_card],
        }
    }

    fn all_removed(&self) -> bool {
        self.removed.iter().all(|removed| *removed)
    }

    fn reveal(&mut self, action: usize) -> ElemType {
        let card = if action == 0 {
            while self.unused_card < self.cards && self.used[self.unused_card] {
                self.unused_card += 1;
            }
            self.unused_card.min(self.cards - 1)
        } else {
            action - 1
        };
        self.used[card] = true;

        let mut reward = -1.0;
        if self.last_card != card
            && self.symbols[self.last_card] == self.symbols[card]
            && !self.removed[card]
        {
            reward = 2.0;
            self.removed[self.last_card] = true;
            self.removed[card] = true;
        }
        self.last_card = card;

        reward
    }

    /// Plays a fresh episode with the built-in demonstrator.
    ///
    /// Returns every observation together with the action the demonstrator
    /// took in it. The demonstrator pairs the current card with a remembered
    /// partner whenever possible and reveals a new card otherwise.
    pub fn expert_episode(&mut self) -> Vec<(MemoryGameObservation, usize)> {
        let (mut observation, _) = self.reset();
        let mut seen: Vec<Option<usize>> = vec![None; self.cards / 2];
        let mut episode = Vec::new();

        loop {
            let action = match seen[observation.symbol] {
                Some(partner) if partner != observation.card && !self.removed[observation.card] => {
                    partner + 1
                }
                Some(_) => 0,
                None => {
                    seen[observation.symbol] = Some(observation.card);
                    0
                }
            };
            episode.push((observation, action));

            let (snapshot_state, done) = self.advance(action);
            if done {
                return episode;
            }
            observation = snapshot_state;
        }
    }

    fn advance(&mut self, action: usize) -> (MemoryGameObservation, bool) {
        self.reveal(action);
        self.step_count += 1;
        (
            self.observation(),
            self.all_removed() || self.step_count >= self.max_steps,
        )
    }
}

impl Environment for MemoryGame {
    type StateType = MemoryGameObservation;
    type ActionType = usize;

    fn observation_space(&self) -> Space {
        Space::MultiDiscrete(vec![self.cards, self.cards / 2])
    }

    fn action_space(&self) -> Space {
        Space::Discrete(self.cards + 1)
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn state(&self) -> Self::StateType {
        self.observation()
    }

    fn reset(&mut self) -> (Self::StateType, Info) {
        for (card, symbol) in self.symbols.iter_mut().enumerate() {
            *symbol = card / 2;
        }
        self.symbols.shuffle(&mut self.rng);
        self.removed.fill(false);
        self.used.fill(false);
        self.unused_card = 0;
        self.last_card = 0;
        self.reveal(0);
        self.step_count = 0;

        (self.observation(), Info::new())
    }

    fn render(&self) -> String {
        (0..self.cards)
            .map(|card| {
                if self.removed[card] {
                    ".".to_string()
                } else if card == self.last_card {
                    self.symbols[card].to_string()
                } else {
                    "#".to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn step(&mut self, action: &Self::ActionType) -> Result<Snapshot<Self>, EnvError> {
        if *action > self.cards {
            return Err(EnvError::InvalidAction {
                expected: format!("an action in 0..={}", self.cards),
                got: action.to_string(),
            });
        }

        let reward = self.reveal(*action);
        self.step_count += 1;
        let terminated = self.all_removed();
        let truncated = !terminated && self.step_count >= self.max_steps;

        Ok(Snapshot::new(self.observation(), reward, terminated, truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with_symbols(symbols: Vec<usize>) -> MemoryGame {
        let mut game = MemoryGame::new(symbols.len());
        game.reset();
        game.symbols = symbols;
        game.removed.fill(false);
        game.used.fill(false);
        game.used[0] = true;
        game.last_card = 0;
        game
    }

    #[test]
    fn reset_reveals_the_first_card() {
        let mut game = MemoryGame::new(4);
        game.seed(1);
        let (observation, _) = game.reset();
        assert_eq!(observation.card, 0);
        assert!(observation.symbol < 2);
    }

    #[test]
    fn matching_pair_is_rewarded_and_removed() {
        let mut game = game_with_symbols(vec![0, 1, 0, 1]);

        let pair = game.step(&3).unwrap();
        assert_eq!(pair.reward, 2.0);
        assert!(game.removed[0] && game.removed[2]);

        let miss = game.step(&2).unwrap();
        assert_eq!(miss.reward, -1.0);
        let done = game.step(&4).unwrap();
        assert_eq!(done.reward, 2.0);
        assert!(done.terminated);
    }

    #[test]
    fn same_card_twice_is_not_a_pair() {
        let mut game = game_with_symbols(vec![0, 1, 0, 1]);
        assert_eq!(game.step(&1).unwrap().reward, -1.0);
    }

    #[test]
    fn action_zero_reveals_next_unused_card() {
        let mut game = game_with_symbols(vec![0, 1, 1, 0]);
        let snapshot = game.step(&0).unwrap();
        assert_eq!(snapshot.state, MemoryGameObservation { card: 1, symbol: 1 });
        let snapshot = game.step(&0).unwrap();
        assert_eq!(snapshot.state.card, 2);
        assert_eq!(snapshot.reward, 2.0);
    }

    #[test]
    fn rejects_out_of_range_action() {
        let mut game = MemoryGame::new(4);
        game.reset();
        assert!(matches!(game.step(&5), Err(EnvError::InvalidAction { .. })));
    }

    #[test]
    fn expert_solves_every_shuffle() {
        let mut game = MemoryGame::new(8);
        game.seed(11);
        for _ in 0..20 {
            let episode = game.expert_episode();
            assert!(game.all_removed());
            assert!(episode.len() <= 3 * game.cards() / 2);
        }
    }

    #[test]
    fn replaying_expert_actions_reproduces_the_episode() {
        let mut game = MemoryGame::new(6);
        game.seed(5);
        let episode = game.expert_episode();

        game.seed(5);
        let (mut observation, _) = game.reset();
        for (expected, action) in &episode {
            assert_eq!(observation, *expected);
            observation = game.step(action).unwrap().state;
        }
        assert!(game.all_removed());
    }

    #[test]
    fn deal_depends_only_on_the_seed() {
        let mut fresh = MemoryGame::new(8);
        fresh.seed(21);
        fresh.reset();
        let expected = fresh.symbols.clone();

        let mut played = MemoryGame::new(8);
        played.seed(4);
        for _ in 0..3 {
            played.expert_episode();
        }
        played.seed(21);
        played.reset();
        assert_eq!(played.symbols, expected);
    }
}
