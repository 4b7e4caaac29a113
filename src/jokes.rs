//! Random joke notes dropped into the store while the app runs.
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{NoteFields, NoteStore, Result};

/// Category given to injected jokes.
pub const JOKE_CATEGORY: &str = "Amogus";

/// Chance that one joke timer firing creates a note.
pub const DEFAULT_JOKE_PROBABILITY: f64 = 0.2;

/// Built-in jokes as `(title, content)` pairs.
pub const JOKES: [(&str, &str); 10] = [
    ("Sus", "There is 1 impostor among us."),
    ("Emergency Meeting", "I saw someone vent in electrical!"),
    ("Red Sus", "Red was following me and acting sus."),
    ("Tasks", "Just finished my tasks in admin. Anyone want to buddy up?"),
    ("Venting", "How do I go into the vent like blue did?"),
    ("Sabotage", "O2 depleting. Fix sabotage!"),
    ("Crewmate", "I was doing my tasks in medbay, I swear!"),
    ("Scan", "I can prove I'm innocent. Watch me scan in medbay."),
    ("Ejected", "Blue was not The Impostor. 1 Impostor remains."),
    ("Cafeteria", "Meeting in cafeteria. Who's sus?"),
];

/// Source of the random decisions made by [`JokeGenerator`].
pub trait EventDice {
    /// True with probability `p`.
    fn roll(&mut self, p: f64) -> bool;

    /// Index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;

    /// Whole seconds in `min..=max`.
    fn delay_secs(&mut self, min: u64, max: u64) -> u64;
}

/// [`EventDice`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngDice<R>(pub R);

impl<R: Rng> EventDice for RngDice<R> {
    fn roll(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }

    fn delay_secs(&mut self, min: u64, max: u64) -> u64 {
        if min >= max {
            return min;
        }
        self.0.gen_range(min..=max)
    }
}

impl<D: EventDice + ?Sized> EventDice for Box<D> {
    fn roll(&mut self, p: f64) -> bool {
        (**self).roll(p)
    }

    fn pick(&mut self, len: usize) -> usize {
        (**self).pick(len)
    }

    fn delay_secs(&mut self, min: u64, max: u64) -> u64 {
        (**self).delay_secs(min, max)
    }
}

pub struct JokeGenerator<D> {
    dice: D,
    probability: f64,
}

impl JokeGenerator<RngDice<StdRng>> {
    pub fn from_entropy(probability: f64) -> Self {
        Self::new(RngDice(StdRng::from_entropy()), probability)
    }
}

impl<D: EventDice> JokeGenerator<D> {
    pub fn new(dice: D, probability: f64) -> Self {
        Self { dice, probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Rolls once and, on success, inserts a temporary joke note.
    /// Returns the new note id.
    pub fn maybe_inject(&mut self, store: &mut NoteStore, enabled: bool) -> Result<Option<String>> {
        self.maybe_inject_at(store, enabled, Utc::now())
    }

    pub fn maybe_inject_at(
        &mut self,
        store: &mut NoteStore,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if !enabled {
            debug!("Jokes disabled, skipping roll");
            return Ok(None);
        }
        if !self.dice.roll(self.probability) {
            return Ok(None);
        }

        let (title, content) = JOKES[self.dice.pick(JOKES.len())];
        let fields = NoteFields::new(title, content)
            .category(JOKE_CATEGORY)
            .temporary(true);
        let id = store.upsert_at(None, fields, now)?;

        if let Some(id) = &id {
            info!("Emergency Meeting! A new '{}' note was created ({})", title, id);
        }
        Ok(id)
    }

    /// Delay until the next roll, drawn from `min_secs..=max_secs`.
    pub fn next_delay(&mut self, min_secs: u64, max_secs: u64) -> Duration {
        Duration::from_secs(self.dice.delay_secs(min_secs, max_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Replays fixed answers.
    struct ScriptedDice {
        roll: bool,
        pick: usize,
    }

    impl EventDice for ScriptedDice {
        fn roll(&mut self, _p: f64) -> bool {
            self.roll
        }

        fn pick(&mut self, len: usize) -> usize {
            self.pick % len
        }

        fn delay_secs(&mut self, min: u64, _max: u64) -> u64 {
            min
        }
    }

    fn temp_store() -> (TempDir, NoteStore) {
        let dir = TempDir::new().unwrap();
        let store = NoteStore::new(dir.path().join("notes.json"));
        (dir, store)
    }

    #[test]
    fn test_successful_roll_inserts_temporary_joke() {
        let (_dir, mut store) = temp_store();
        let mut generator = JokeGenerator::new(ScriptedDice { roll: true, pick: 1 }, 0.2);

        let id = generator.maybe_inject(&mut store, true).unwrap().unwrap();
        let note = store.get(&id).unwrap();
        assert_eq!(note.title, "Emergency Meeting");
        assert_eq!(note.category, JOKE_CATEGORY);
        assert!(note.temporary);
        assert!(!note.favorite);
        assert_eq!(note.created_at, note.updated_at);

        let (reloaded, _) = NoteStore::open(store.path()).unwrap();
        assert!(reloaded.contains(&id));
    }

    #[test]
    fn test_failed_roll_or_disabled_does_nothing() {
        let (_dir, mut store) = temp_store();

        let mut losing = JokeGenerator::new(ScriptedDice { roll: false, pick: 0 }, 0.2);
        assert_eq!(losing.maybe_inject(&mut store, true).unwrap(), None);

        let mut winning = JokeGenerator::new(ScriptedDice { roll: true, pick: 0 }, 0.2);
        assert_eq!(winning.maybe_inject(&mut store, false).unwrap(), None);

        assert!(store.is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_seeded_rng_respects_probability_bounds() {
        let (_dir, mut store) = temp_store();

        let mut never = JokeGenerator::new(RngDice(StdRng::seed_from_u64(7)), 0.0);
        let mut always = JokeGenerator::new(RngDice(StdRng::seed_from_u64(7)), 1.0);
        for _ in 0..20 {
            assert!(never.maybe_inject(&mut store, true).unwrap().is_none());
        }
        for _ in 0..5 {
            assert!(always.maybe_inject(&mut store, true).unwrap().is_some());
        }
        assert_eq!(store.len(), 5);
        assert!(store
            .notes()
            .all(|note| JOKES.iter().any(|(title, _)| *title == note.title)));
    }

    #[test]
    fn test_out_of_range_probability_is_clamped() {
        let mut dice = RngDice(StdRng::seed_from_u64(1));
        assert!(dice.roll(3.5));
        assert!(!dice.roll(-1.0));
    }

    #[test]
    fn test_next_delay_stays_in_range() {
        let mut generator = JokeGenerator::new(RngDice(StdRng::seed_from_u64(42)), 0.2);
        for _ in 0..50 {
            let delay = generator.next_delay(600, 3600).as_secs();
            assert!((600..=3600).contains(&delay));
        }
        assert_eq!(generator.next_delay(900, 300), Duration::from_secs(900));
    }

    #[test]
    fn test_boxed_dice_delegates() {
        let dice: Box<dyn EventDice + Send> = Box::new(ScriptedDice { roll: true, pick: 9 });
        let (_dir, mut store) = temp_store();
        let mut generator = JokeGenerator::new(dice, 0.5);

        let id = generator.maybe_inject(&mut store, true).unwrap().unwrap();
        assert_eq!(store.get(&id).unwrap().title, "Cafeteria");
    }
}
